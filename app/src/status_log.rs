//! Status lines on USART1
//!
//! Lines are formatted into a fixed buffer and written out blocking. The
//! status only changes on output ticks and is polled from the main loop, so
//! there is no need for a transmit queue.

use core::fmt::Write;

use heapless::String;
use rc_touch::{Config, ConfigError};

use crate::hal::gpio::gpiob::{PB6, PB7};
use crate::hal::gpio::{Alternate, AF0};
use crate::hal::pac::USART1;
use crate::hal::prelude::*;
use crate::hal::serial::Serial;
use crate::Controller;

type Uart = Serial<USART1, PB6<Alternate<AF0>>, PB7<Alternate<AF0>>>;

/// Snapshot of the controller outputs
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Status {
    ready: bool,
    touch: u32,
    calibration: u16,
    threshold: u16,
    failures: u32,
}

impl Status {
    pub fn read(touch: &Controller) -> Self {
        let ready = touch.ready();
        // The calibration count runs continuously until ready
        let (calibration, threshold) = if ready {
            (touch.calibration(), touch.threshold())
        } else {
            (0, 0)
        };
        Self {
            ready,
            touch: touch.touch_mask(),
            calibration,
            threshold,
            failures: touch.calibration_failures(),
        }
    }
}

pub struct StatusLog {
    uart: Uart,
    line: String<96>,
    last: Option<Status>,
}

impl StatusLog {
    pub fn new(uart: Uart) -> Self {
        Self {
            uart,
            line: String::new(),
            last: None,
        }
    }

    pub fn startup(&mut self, num_pads: usize, tick_freq: u32, config: &Config) {
        self.line.clear();
        write!(
            self.line,
            "touch: {} pads, clocked at {} Hz, sensitivity {}\r\n",
            num_pads,
            tick_freq,
            config.sensitivity.level()
        ).ok();
        self.flush();
    }

    pub fn config_error(&mut self, error: &ConfigError) {
        self.line.clear();
        write!(self.line, "touch config rejected: {}\r\n", error).ok();
        self.flush();
    }

    /// Write a status line if it differs from the last one written
    pub fn update(&mut self, status: Status) {
        if self.last == Some(status) {
            return;
        }
        self.last = Some(status);

        self.line.clear();
        write!(
            self.line,
            "ready={} touch={:04b} base={} threshold={} cal_failures={}\r\n",
            status.ready as u8,
            status.touch,
            status.calibration,
            status.threshold,
            status.failures
        ).ok();
        self.flush();
    }

    fn flush(&mut self) {
        for b in self.line.bytes() {
            while self.uart.write(b).is_err() {}
        }
    }
}
