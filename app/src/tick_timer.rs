use crate::pac;
use crate::hal::rcc::Rcc;

/// TIM2 configured to interrupt once per touch controller base clock cycle
pub struct TickTimer {
    tim: pac::TIM2,
    clk_freq: u32,
}

impl TickTimer {
    pub fn new(tim: pac::TIM2, rcc: &mut Rcc, tick_freq: u32) -> Self {
        let rccregs = unsafe { pac::Peripherals::steal().RCC };
        rccregs.apb1enr.modify(|_, w| w.tim2en().set_bit());

        // If pclk is prescaled from hclk, the frequency fed into the timers is doubled
        let clk_freq = if rcc.clocks.hclk().0 == rcc.clocks.pclk().0 {
            rcc.clocks.pclk().0
        } else {
            rcc.clocks.pclk().0 * 2
        };

        // Update events only on overflow, so that reloading ARR cannot fire early
        tim.cr1.modify(|_, w| {
            w.urs().set_bit()
            .arpe().set_bit()
        });

        let obj = Self {
            tim,
            clk_freq
        };
        obj.set_tick_freq(tick_freq);
        obj.tim.egr.write(|w| w.ug().set_bit());
        obj.tim.sr.write(|w| unsafe { w.bits(0) });
        obj.tim.cr1.modify(|_, w| w.cen().set_bit());
        obj
    }

    pub fn enable_irq(&mut self) {
        self.tim.dier.write(|w| w.uie().set_bit());
    }

    /// Actual tick rate, after rounding the timer period
    pub fn tick_freq(&self) -> u32 {
        self.clk_freq / (self.tim.arr.read().arr().bits() + 1)
    }

    fn set_tick_freq(&self, tick_freq: u32) {
        let arr = self.clk_freq / tick_freq - 1;
        self.tim.arr.write(|w| w.arr().bits(arr));
    }
}

/// Clear the update flag; called from the TIM2 handler
pub fn clear_irq() {
    let tim2 = unsafe { pac::Peripherals::steal().TIM2 };
    tim2.sr.write(|w| unsafe { w.bits(0) });
}
