//! Top level touch controller
//!
//! Ties the tick generator, level synchronizer, calibration state machine and
//! debounce filter together behind a single `clock()` call, made once per base
//! clock cycle. All state is owned by the controller, which is the only writer
//! to the pads.

use crate::filter::DebounceFilter;
use crate::sampler::{ControllerState, Sampler, StepEvent};
use crate::sync::Synchronizer;
use crate::tick::{TickGenerator, Ticks};
use crate::{Config, ConfigError, PadInterface};

pub struct TouchController<P, const N: usize> {
    config: Config,
    pads: P,
    ticks: TickGenerator,
    sync: Synchronizer<N>,
    sampler: Sampler<N>,
    filter: DebounceFilter<N>,
    sync_reset: bool,
}

impl<P: PadInterface, const N: usize> TouchController<P, N> {
    /// Create a controller for `N` pads
    ///
    /// The configuration is validated; an invalid one is refused rather than
    /// run.
    pub fn new(config: Config, pads: P) -> Result<Self, ConfigError> {
        config.validate(N)?;

        Ok(Self {
            config,
            pads,
            ticks: TickGenerator::new(&config),
            sync: Synchronizer::new(),
            sampler: Sampler::new(&config),
            filter: DebounceFilter::new(config.filter_depth),
            sync_reset: false,
        })
    }

    /// Advance by one base clock cycle
    ///
    /// While the synchronous reset is asserted the cycle resets the controller
    /// instead, and no ticks are produced.
    pub fn clock(&mut self) -> Ticks {
        if self.sync_reset {
            self.reset();
            return Ticks::default();
        }

        let ticks = self.ticks.tick();
        if ticks.sample {
            self.step_sample();
        }
        if ticks.output {
            self.evaluate_output();
        }
        ticks
    }

    /// Advance by one sample tick, bypassing the base clock divider
    pub fn step_sample(&mut self) -> StepEvent {
        let event = self.sampler.step(&mut self.pads, self.sync.levels());
        self.sync.shift(&mut self.pads, self.sampler.is_driving());

        match event {
            StepEvent::Calibrated => {
                info!(
                    "calibrated: base {} ticks, threshold {}",
                    self.sampler.calibration(),
                    self.sampler.threshold()
                );
            }
            StepEvent::CalibrationOverflow => {
                warn!(
                    "calibration overflow, restarting ({} failures)",
                    self.sampler.calibration_failures()
                );
            }
            StepEvent::Sampled => {
                self.filter.shift_in(self.sampler.raw_samples());
            }
            StepEvent::None => (),
        }

        event
    }

    /// Run one output tick: re-evaluate the debounced touch outputs
    ///
    /// Returns true if any output changed
    pub fn evaluate_output(&mut self) -> bool {
        let changed = self.filter.evaluate();
        if changed {
            debug!("touch outputs changed: {=u32:#x}", self.touch_mask());
        }
        changed
    }

    /// Asynchronous reset, applied immediately
    ///
    /// Any calibration or measurement in progress is discarded. Diagnostic
    /// counters survive.
    pub fn reset(&mut self) {
        self.ticks.reset();
        self.sync.reset();
        self.sampler.reset();
        self.filter.reset();
        debug!("reset");
    }

    /// Set the level of the synchronous reset input, checked on each `clock()`
    pub fn set_sync_reset(&mut self, asserted: bool) {
        self.sync_reset = asserted;
    }

    pub fn ready(&self) -> bool {
        self.sampler.ready()
    }

    pub fn touched(&self, pad: usize) -> bool {
        self.filter.output()[pad]
    }

    pub fn touch(&self) -> [bool; N] {
        *self.filter.output()
    }

    /// Debounced touch outputs of the first 32 pads, pad 0 in bit 0
    pub fn touch_mask(&self) -> u32 {
        self.filter
            .output()
            .iter()
            .take(32)
            .enumerate()
            .fold(0, |mask, (i, t)| mask | ((*t as u32) << i))
    }

    pub fn state(&self) -> ControllerState {
        self.sampler.state()
    }

    pub fn calibration(&self) -> u16 {
        self.sampler.calibration()
    }

    pub fn threshold(&self) -> u16 {
        self.sampler.threshold()
    }

    pub fn raw_samples(&self) -> &[bool; N] {
        self.sampler.raw_samples()
    }

    pub fn calibration_failures(&self) -> u32 {
        self.sampler.calibration_failures()
    }

    pub fn calibration_attempts(&self) -> u32 {
        self.sampler.calibration_attempts()
    }

    pub fn clear_diagnostics(&mut self) {
        self.sampler.clear_diagnostics();
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pads(&self) -> &P {
        &self.pads
    }

    pub fn pads_mut(&mut self) -> &mut P {
        &mut self.pads
    }

    /// Consume the controller, returning the pad interface
    pub fn release(self) -> P {
        self.pads
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use crate::{Sensitivity, DEFAULT_CONFIG};

    /// Pads which charge as soon as they are released
    #[derive(Default)]
    struct InstantPads {
        driven: [bool; 3],
    }

    impl PadInterface for InstantPads {
        fn drive_low(&mut self, pad: usize) {
            self.driven[pad] = true;
        }
        fn release(&mut self, pad: usize) {
            self.driven[pad] = false;
        }
        fn read_level(&mut self, pad: usize) -> bool {
            assert!(!self.driven[pad], "read pad {} while driving it", pad);
            true
        }
    }

    const SLOW_CLOCK: Config = Config {
        base_clock_hz: 400,
        sample_rate_hz: 100,
        output_rate_hz: 10,
        sensitivity: Sensitivity::High,
        ..DEFAULT_CONFIG
    };

    #[test]
    fn test_refuses_invalid_config() {
        let bad = Config { base_clock_hz: 10, ..SLOW_CLOCK };
        assert!(matches!(
            TouchController::<_, 3>::new(bad, InstantPads::default()),
            Err(ConfigError::ClockTooSlow { .. })
        ));
        assert!(matches!(
            TouchController::<_, 0>::new(SLOW_CLOCK, InstantPads::default()),
            Err(ConfigError::NoPads)
        ));
    }

    #[test]
    fn test_clock_divides_to_sample_ticks() {
        let mut c = TouchController::<_, 3>::new(SLOW_CLOCK, InstantPads::default()).unwrap();

        // Three base cycles per sample tick go by without a step
        for _ in 0..3 {
            assert_eq!(c.clock(), Ticks::default());
            assert_eq!(c.state(), ControllerState::InitStart);
        }
        assert!(c.clock().sample);
        assert_eq!(c.state(), ControllerState::InitDischarge);

        let mut outputs = 0;
        for _ in 0..4000 - 4 {
            if c.clock().output {
                outputs += 1;
            }
        }
        assert_eq!(outputs, 100);
        assert!(c.ready());
    }

    #[test]
    fn test_instant_pads_calibrate_quickly() {
        let mut c = TouchController::<_, 3>::new(SLOW_CLOCK, InstantPads::default()).unwrap();
        let mut steps = 0;
        while !c.ready() {
            c.step_sample();
            steps += 1;
            assert!(steps < 20);
        }
        // Released on the third step, then delayed through the synchronizer
        assert_eq!(c.calibration(), 2);
        assert_eq!(c.threshold(), 2);
        assert_eq!(c.touch_mask(), 0);
    }

    #[test]
    fn test_sync_reset_holds_in_init() {
        let mut c = TouchController::<_, 3>::new(SLOW_CLOCK, InstantPads::default()).unwrap();
        for _ in 0..400 {
            c.clock();
        }
        assert!(c.ready());

        c.set_sync_reset(true);
        for _ in 0..400 {
            assert_eq!(c.clock(), Ticks::default());
            assert_eq!(c.state(), ControllerState::InitStart);
            assert!(!c.ready());
        }

        c.set_sync_reset(false);
        for _ in 0..400 {
            c.clock();
        }
        assert!(c.ready());
        assert_eq!(c.calibration_attempts(), 2);
    }

    #[test]
    fn test_async_reset_is_immediate() {
        let mut c = TouchController::<_, 3>::new(SLOW_CLOCK, InstantPads::default()).unwrap();
        for _ in 0..30 {
            c.step_sample();
        }
        assert!(c.ready());
        c.reset();
        assert_eq!(c.state(), ControllerState::InitStart);
        assert_eq!(c.calibration(), 0);

        c.step_sample();
        assert_eq!(c.state(), ControllerState::InitDischarge);
        assert_eq!(c.pads().driven, [true; 3]);
    }
}
