//! Pad driver for STM32 GPIO ports.
//!
//! Each pad is a GPIO pin wired to a conductive pad with an external pull-up
//! resistor. Discharging switches the pin to a push-pull output driving low;
//! releasing switches it back to a floating input so that it can charge.
//!
//! Like the port drivers of the HAL crates, these access the GPIO and RCC
//! registers directly rather than taking PAC singletons, so there is no need
//! for the `rc-touch` crate to share a PAC version with the application. The
//! application must not reconfigure the pad pins elsewhere.

#[cfg(feature="stm32f0x1")]
use stm32f0::stm32f0x1 as pac;
#[cfg(feature="stm32f303")]
use stm32f3::stm32f303 as pac;

use crate::PadInterface;

/// MODER value for a floating input
const MODE_INPUT: u32 = 0b00;
/// MODER value for a general purpose output
const MODE_OUTPUT: u32 = 0b01;

macro_rules! port_pads {
    ($(#[$meta:meta])* $name:ident, $GPIOX:ident, $enable:ident) => {
        $(#[$meta])*
        pub struct $name<const N: usize> {
            pins: [u8; N],
        }

        impl<const N: usize> $name<N> {
            /// Take control of the pins numbered in `pins`, one per pad
            ///
            /// Enables the port clock and leaves every pad released.
            pub fn new(pins: [u8; N]) -> Self {
                assert!(pins.iter().all(|p| *p < 16));

                let rcc = unsafe { &*pac::RCC::ptr() };
                rcc.ahbenr.modify(|_, w| w.$enable().set_bit());

                let gpio = unsafe { &*pac::$GPIOX::ptr() };
                for pin in pins {
                    let pin = pin as u32;
                    // Push-pull, no pull resistors
                    gpio.otyper.modify(|r, w| unsafe { w.bits(r.bits() & !(1 << pin)) });
                    gpio.pupdr.modify(|r, w| unsafe { w.bits(r.bits() & !(0b11 << (2 * pin))) });
                }

                let mut pads = Self { pins };
                for pad in 0..N {
                    pads.release(pad);
                }
                pads
            }

            pub fn pins(&self) -> &[u8; N] {
                &self.pins
            }

            fn set_mode(&self, pad: usize, mode: u32) {
                let gpio = unsafe { &*pac::$GPIOX::ptr() };
                let shift = 2 * self.pins[pad] as u32;
                gpio.moder.modify(|r, w| unsafe {
                    w.bits((r.bits() & !(0b11 << shift)) | (mode << shift))
                });
            }
        }

        impl<const N: usize> PadInterface for $name<N> {
            fn drive_low(&mut self, pad: usize) {
                let gpio = unsafe { &*pac::$GPIOX::ptr() };
                // Clear the output latch before enabling the driver so the pad
                // never sees a high pulse
                gpio.bsrr.write(|w| unsafe { w.bits(1 << (16 + self.pins[pad] as u32)) });
                self.set_mode(pad, MODE_OUTPUT);
            }

            fn release(&mut self, pad: usize) {
                self.set_mode(pad, MODE_INPUT);
            }

            fn read_level(&mut self, pad: usize) -> bool {
                let gpio = unsafe { &*pac::$GPIOX::ptr() };
                gpio.idr.read().bits() & (1 << self.pins[pad]) != 0
            }
        }
    };
}

port_pads!(
    /// Pads on GPIO port A
    PortAPads, GPIOA, iopaen
);
port_pads!(
    /// Pads on GPIO port B
    PortBPads, GPIOB, iopben
);
port_pads!(
    /// Pads on GPIO port C
    PortCPads, GPIOC, iopcen
);
