#![cfg_attr(not(test), no_std)]

#[macro_use]
mod log;

pub mod controller;
pub mod filter;
#[cfg(any(feature = "stm32f0x1", feature = "stm32f303"))]
pub mod gpio;
pub mod sampler;
pub mod sync;
pub mod threshold;
pub mod tick;

pub use controller::TouchController;
pub use sampler::ControllerState;

/// Access to the physical pads, as seen by the controller
///
/// A pad is either driven low (discharging) or released to high impedance so
/// that it charges through its external pull-up. The controller never reads a
/// pad while it is driving it.
pub trait PadInterface {
    /// Drive the pad low to discharge it
    fn drive_low(&mut self, pad: usize);
    /// Stop driving the pad, leaving it to charge through the pull-up
    fn release(&mut self, pad: usize);
    /// Read the digital level of a released pad
    fn read_level(&mut self, pad: usize) -> bool;
}

/// Margin added to the calibrated charge time to form the touch threshold
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Sensitivity {
    /// +6.25%
    Low = 1,
    /// +12.5%
    Medium = 2,
    /// +25%
    High = 3,
}

impl Sensitivity {
    /// Right shift applied to the calibration value to get the margin
    pub const fn shift(self) -> u32 {
        match self {
            Self::Low => 4,
            Self::Medium => 3,
            Self::High => 2,
        }
    }

    pub const fn level(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Sensitivity {
    type Error = ConfigError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            1 => Ok(Self::Low),
            2 => Ok(Self::Medium),
            3 => Ok(Self::High),
            _ => Err(ConfigError::InvalidSensitivity(level)),
        }
    }
}

/// Reasons a configuration is refused at construction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The controller must sense at least one pad
    NoPads,
    /// Sample and output rates must be non-zero
    ZeroRate,
    /// The base clock cannot be divided down to the sample rate
    ClockTooSlow { base_clock_hz: u32, sample_rate_hz: u32 },
    /// The output tick cannot be faster than the sample tick
    OutputRateTooHigh { sample_rate_hz: u32, output_rate_hz: u32 },
    InvalidSensitivity(u8),
    InvalidCounterWidth(u8),
    InvalidFilterDepth(u8),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoPads => write!(f, "at least one pad is required"),
            Self::ZeroRate => write!(f, "sample and output rates must be non-zero"),
            Self::ClockTooSlow { base_clock_hz, sample_rate_hz } => write!(
                f,
                "base clock {} Hz is slower than sample rate {} Hz",
                base_clock_hz, sample_rate_hz
            ),
            Self::OutputRateTooHigh { sample_rate_hz, output_rate_hz } => write!(
                f,
                "output rate {} Hz is faster than sample rate {} Hz",
                output_rate_hz, sample_rate_hz
            ),
            Self::InvalidSensitivity(level) => {
                write!(f, "sensitivity {} is not one of 1, 2, 3", level)
            }
            Self::InvalidCounterWidth(width) => {
                write!(f, "counter width {} is outside 4..=16 bits", width)
            }
            Self::InvalidFilterDepth(depth) => {
                write!(f, "filter depth {} is outside 1..=8 bits", depth)
            }
        }
    }
}

/// Configuration for a touch controller
///
/// Parameters are fixed once a controller is built from them. The number of
/// pads is the const generic of the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Rate at which `TouchController::clock` is called
    pub base_clock_hz: u32,
    pub sensitivity: Sensitivity,
    /// Rate of state machine steps, divided down from the base clock
    pub sample_rate_hz: u32,
    /// Width in bits of the calibration and sample counters. The discharge
    /// counter is a quarter of this width.
    pub counter_width: u8,
    /// Rate at which the debounced touch outputs may change
    pub output_rate_hz: u32,
    /// Number of consecutive agreeing samples required to change an output
    pub filter_depth: u8,
}

impl Config {
    const fn default() -> Self {
        Self {
            base_clock_hz: 48_000_000,
            sensitivity: Sensitivity::Medium,
            sample_rate_hz: 3_300_000,
            counter_width: 11,
            output_rate_hz: 10,
            filter_depth: 3,
        }
    }

    /// Check the configuration for a controller sensing `num_pads` pads
    pub fn validate(&self, num_pads: usize) -> Result<(), ConfigError> {
        if num_pads == 0 {
            return Err(ConfigError::NoPads);
        }
        if self.sample_rate_hz == 0 || self.output_rate_hz == 0 {
            return Err(ConfigError::ZeroRate);
        }
        if self.base_clock_hz < self.sample_rate_hz {
            return Err(ConfigError::ClockTooSlow {
                base_clock_hz: self.base_clock_hz,
                sample_rate_hz: self.sample_rate_hz,
            });
        }
        if self.sample_rate_hz < self.output_rate_hz {
            return Err(ConfigError::OutputRateTooHigh {
                sample_rate_hz: self.sample_rate_hz,
                output_rate_hz: self.output_rate_hz,
            });
        }
        if !(4..=16).contains(&self.counter_width) {
            return Err(ConfigError::InvalidCounterWidth(self.counter_width));
        }
        if !(1..=8).contains(&self.filter_depth) {
            return Err(ConfigError::InvalidFilterDepth(self.filter_depth));
        }
        Ok(())
    }

    /// Largest value the calibration and sample counters can hold
    pub const fn counter_max(&self) -> u16 {
        ((1u32 << self.counter_width) - 1) as u16
    }

    /// Width in bits of the discharge counter
    pub const fn discharge_width(&self) -> u8 {
        self.counter_width / 4
    }

    /// Base clock cycles per sample tick
    pub const fn sample_divisor(&self) -> u32 {
        self.base_clock_hz / self.sample_rate_hz
    }

    /// Sample ticks per output tick
    pub const fn output_divisor(&self) -> u32 {
        self.sample_rate_hz / self.output_rate_hz
    }
}

pub const DEFAULT_CONFIG: Config = Config::default();
