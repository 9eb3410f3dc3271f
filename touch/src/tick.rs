//! Sample and output tick generation by frequency division of the base clock.

use crate::Config;

/// Counter which strobes once every `period` input cycles
#[derive(Clone, Copy, Debug)]
pub struct Divider {
    count: u32,
    period: u32,
}

impl Divider {
    pub const fn new(period: u32) -> Self {
        Self {
            count: 0,
            period: if period == 0 { 1 } else { period },
        }
    }

    /// Advance by one input cycle
    ///
    /// Returns true on the cycle completing a period
    pub fn tick(&mut self) -> bool {
        self.count += 1;
        if self.count >= self.period {
            self.count = 0;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }
}

/// Strobes produced by one base clock cycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Ticks {
    pub sample: bool,
    pub output: bool,
}

/// Produces the sample tick from the base clock, and the output tick by
/// counting sample ticks. An output tick always coincides with a sample tick.
#[derive(Clone, Copy, Debug)]
pub struct TickGenerator {
    sample: Divider,
    output: Divider,
}

impl TickGenerator {
    pub fn new(config: &Config) -> Self {
        Self {
            sample: Divider::new(config.sample_divisor()),
            output: Divider::new(config.output_divisor()),
        }
    }

    pub fn tick(&mut self) -> Ticks {
        let sample = self.sample.tick();
        let output = sample && self.output.tick();
        Ticks { sample, output }
    }

    pub fn reset(&mut self) {
        self.sample.reset();
        self.output.reset();
    }
}
