#![no_main]
#![no_std]

use core::cell::RefCell;
use core::sync::atomic::{AtomicU32, Ordering};
use cortex_m::interrupt::Mutex;
use cortex_m_rt::{entry, exception};
use panic_halt as _;

use stm32f0xx_hal as hal;

use rc_touch::gpio::PortAPads;
use rc_touch::{Config, Sensitivity, TouchController, DEFAULT_CONFIG};

use crate::hal::pac;
use crate::hal::pac::interrupt;
use crate::hal::prelude::*;

mod status_log;
mod tick_timer;

use status_log::{Status, StatusLog};
use tick_timer::TickTimer;

const NUM_PADS: usize = 4;
/// Pad pins on GPIOA. Each pad needs an external pull-up to VDD.
const PAD_PINS: [u8; NUM_PADS] = [0, 1, 2, 3];

/// Rate of the TIM2 interrupt which clocks the touch controller
///
/// One count of the charge time is 10 us. The pull-up and pad must charge
/// slowly enough to span tens of counts, and well under the 2047 count limit
/// of an 11 bit counter. With 10 MOhm pull-ups and pads of around 20 pF, a pad
/// crosses the input high threshold after about 1.2 RC, or 24 counts; a finger
/// adds 5 to 10 pF, which is several counts more than the 12.5% margin. An
/// RC product much above 10 ms overflows the counter and needs a slower clock.
const BASE_CLOCK_HZ: u32 = 100_000;

static TOUCH_CONFIG: Config = Config {
    base_clock_hz: BASE_CLOCK_HZ,
    sample_rate_hz: BASE_CLOCK_HZ,
    sensitivity: Sensitivity::Medium,
    ..DEFAULT_CONFIG
};

/// SysTick periods between status polls
const STATUS_PERIOD: u32 = 10;

type Controller = TouchController<PortAPads<NUM_PADS>, NUM_PADS>;

static TOUCH: Mutex<RefCell<Option<Controller>>> = Mutex::new(RefCell::new(None));
static TIME: AtomicU32 = AtomicU32::new(0);

#[entry]
fn main() -> ! {
    let dp = pac::Peripherals::take().unwrap();
    let cp = cortex_m::Peripherals::take().unwrap();
    let mut nvic = cp.NVIC;

    let mut flash = dp.FLASH;
    let mut rcc = dp.RCC.configure().sysclk(48.mhz()).freeze(&mut flash);
    let gpiob = dp.GPIOB.split(&mut rcc);

    // A library requiring a critical section to set a gpio AF register is bad and I just won't.
    let fake_cs = unsafe { cortex_m::interrupt::CriticalSection::new() };

    let tx_pin = gpiob.pb6.into_alternate_af0(&fake_cs);
    let rx_pin = gpiob.pb7.into_alternate_af0(&fake_cs);
    let uart = hal::serial::Serial::usart1(dp.USART1, (tx_pin, rx_pin), 115200.bps(), &mut rcc);
    let mut log = StatusLog::new(uart);

    // GPIOA is not split; the pad driver owns the pad pins
    let pads = PortAPads::new(PAD_PINS);
    let controller = match TouchController::new(TOUCH_CONFIG, pads) {
        Ok(controller) => controller,
        Err(e) => {
            log.config_error(&e);
            loop {
                cortex_m::asm::wfi();
            }
        }
    };
    cortex_m::interrupt::free(|cs| {
        TOUCH.borrow(cs).borrow_mut().replace(controller);
    });

    let mut tick_timer = TickTimer::new(dp.TIM2, &mut rcc, BASE_CLOCK_HZ);
    log.startup(NUM_PADS, tick_timer.tick_freq(), &TOUCH_CONFIG);
    tick_timer.enable_irq();

    unsafe {
        nvic.set_priority(pac::Interrupt::TIM2, 3);
        cortex_m::peripheral::NVIC::unmask(pac::Interrupt::TIM2);
    }

    let mut syst = hal::timers::Timer::syst(cp.SYST, 100.hz(), &mut rcc);
    syst.listen(&hal::timers::Event::TimeOut);

    let mut next_time = STATUS_PERIOD;

    loop {
        let time = TIME.load(Ordering::Relaxed);
        if time >= next_time {
            next_time += STATUS_PERIOD;

            let status = cortex_m::interrupt::free(|cs| {
                TOUCH.borrow(cs).borrow().as_ref().map(Status::read)
            });

            if let Some(status) = status {
                log.update(status);
            }
        }

        cortex_m::asm::wfi();
    }
}

#[exception]
fn SysTick() {
    let time = TIME.load(Ordering::Relaxed);
    TIME.store(time + 1, Ordering::Relaxed);
}

#[interrupt]
fn TIM2() {
    tick_timer::clear_irq();

    // The main loop only reads the controller inside a critical section
    let fake_cs = unsafe { cortex_m::interrupt::CriticalSection::new() };

    if let Some(touch) = TOUCH.borrow(&fake_cs).borrow_mut().as_mut() {
        touch.clock();
    };
}
