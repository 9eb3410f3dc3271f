//! Calibration and sampling state machine
//!
//! Every measurement starts by discharging all pads for a fixed number of
//! sample ticks, then releases them and counts ticks while they charge through
//! their pull-ups. The first measurement after a reset counts until every pad
//! reads high; that count is the calibrated base charge time of the slowest
//! pad. All later measurements count to the threshold derived from it, and a
//! pad which is still low at that point is sampled as touched.

use crate::threshold::threshold;
use crate::{Config, PadInterface, Sensitivity};

/// Enumeration of controller states
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControllerState {
    InitStart,
    InitDischarge,
    InitSample,
    RunStart,
    RunDischarge,
    RunSample,
}

impl ControllerState {
    /// True while calibrating
    pub fn is_init(self) -> bool {
        matches!(self, Self::InitStart | Self::InitDischarge | Self::InitSample)
    }

    /// True in the states where the pads are held low
    pub fn is_driving(self) -> bool {
        matches!(
            self,
            Self::InitStart | Self::InitDischarge | Self::RunStart | Self::RunDischarge
        )
    }
}

/// Notable outcome of a single step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StepEvent {
    None,
    /// Every pad charged; the controller is now ready
    Calibrated,
    /// The calibration counter ran out before every pad charged. Calibration
    /// restarts on the next step.
    CalibrationOverflow,
    /// A new raw sample was latched for every pad
    Sampled,
}

pub struct Sampler<const N: usize> {
    state: ControllerState,
    /// Calibrated charge time
    thres: u16,
    /// Run mode sample counter
    scnt: u16,
    /// Discharge counter
    dcnt: u16,
    data: [bool; N],
    sensitivity: Sensitivity,
    counter_max: u16,
    discharge_msb: u16,
    failures: u32,
    attempts: u32,
}

impl<const N: usize> Sampler<N> {
    /// Create a sampler from a configuration already checked by
    /// `Config::validate`
    pub(crate) fn new(config: &Config) -> Self {
        debug_assert!((4..=16).contains(&config.counter_width));
        Self {
            state: ControllerState::InitStart,
            thres: 0,
            scnt: 0,
            dcnt: 0,
            data: [false; N],
            sensitivity: config.sensitivity,
            counter_max: config.counter_max(),
            discharge_msb: 1 << (config.discharge_width() - 1),
            failures: 0,
            attempts: 0,
        }
    }

    /// Return to `InitStart`, discarding any calibration or sample in progress
    ///
    /// Diagnostic counters are kept.
    pub fn reset(&mut self) {
        self.state = ControllerState::InitStart;
        self.thres = 0;
        self.scnt = 0;
        self.dcnt = 0;
        self.data = [false; N];
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn ready(&self) -> bool {
        !self.state.is_init()
    }

    pub fn is_driving(&self) -> bool {
        self.state.is_driving()
    }

    /// The calibrated charge time, or the count so far while calibrating
    pub fn calibration(&self) -> u16 {
        self.thres
    }

    pub fn threshold(&self) -> u16 {
        threshold(self.thres, self.sensitivity, self.counter_max)
    }

    /// Raw samples latched by the last completed run mode measurement. True
    /// for a pad that had not charged by the threshold.
    pub fn raw_samples(&self) -> &[bool; N] {
        &self.data
    }

    /// Number of calibration passes abandoned due to counter overflow
    pub fn calibration_failures(&self) -> u32 {
        self.failures
    }

    /// Number of calibration passes started
    pub fn calibration_attempts(&self) -> u32 {
        self.attempts
    }

    pub fn clear_diagnostics(&mut self) {
        self.failures = 0;
        self.attempts = 0;
    }

    /// Advance by one sample tick
    ///
    /// `levels` are the synchronized pad levels, which are only acted on in
    /// the sampling states.
    pub fn step<P: PadInterface>(&mut self, pads: &mut P, levels: &[bool; N]) -> StepEvent {
        let mut event = StepEvent::None;

        self.state = match self.state {
            ControllerState::InitStart => {
                self.thres = 0;
                self.dcnt = 0;
                self.attempts = self.attempts.saturating_add(1);
                Self::drive_all(pads);
                ControllerState::InitDischarge
            }
            ControllerState::InitDischarge => {
                if self.discharged() {
                    Self::release_all(pads);
                    ControllerState::InitSample
                } else {
                    ControllerState::InitDischarge
                }
            }
            ControllerState::InitSample => {
                if self.thres == self.counter_max {
                    self.failures = self.failures.saturating_add(1);
                    event = StepEvent::CalibrationOverflow;
                    ControllerState::InitStart
                } else {
                    self.thres += 1;
                    if levels.iter().all(|level| *level) {
                        event = StepEvent::Calibrated;
                        ControllerState::RunStart
                    } else {
                        ControllerState::InitSample
                    }
                }
            }
            ControllerState::RunStart => {
                self.dcnt = 0;
                self.scnt = 0;
                Self::drive_all(pads);
                ControllerState::RunDischarge
            }
            ControllerState::RunDischarge => {
                if self.discharged() {
                    Self::release_all(pads);
                    ControllerState::RunSample
                } else {
                    ControllerState::RunDischarge
                }
            }
            ControllerState::RunSample => {
                // threshold <= counter_max, so scnt cannot wrap before matching
                self.scnt += 1;
                if self.scnt == self.threshold() {
                    // A pad that has charged is not touched
                    for (sample, level) in self.data.iter_mut().zip(levels.iter()) {
                        *sample = !*level;
                    }
                    event = StepEvent::Sampled;
                    ControllerState::RunStart
                } else {
                    ControllerState::RunSample
                }
            }
        };

        event
    }

    /// Count one discharge tick; done once the counter's top bit is set
    fn discharged(&mut self) -> bool {
        self.dcnt += 1;
        self.dcnt & self.discharge_msb != 0
    }

    fn drive_all<P: PadInterface>(pads: &mut P) {
        for pad in 0..N {
            pads.drive_low(pad);
        }
    }

    fn release_all<P: PadInterface>(pads: &mut P) {
        for pad in 0..N {
            pads.release(pad);
        }
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use crate::DEFAULT_CONFIG;

    #[derive(Default)]
    struct DriveLog {
        driven: [bool; 2],
        drives: usize,
        releases: usize,
    }

    impl PadInterface for DriveLog {
        fn drive_low(&mut self, pad: usize) {
            self.driven[pad] = true;
            self.drives += 1;
        }
        fn release(&mut self, pad: usize) {
            self.driven[pad] = false;
            self.releases += 1;
        }
        fn read_level(&mut self, _pad: usize) -> bool {
            panic!("sampler must not read pads directly");
        }
    }

    const LOW: [bool; 2] = [false, false];
    const HIGH: [bool; 2] = [true, true];

    /// Step from InitStart through the discharge states
    fn discharge(sampler: &mut Sampler<2>, pads: &mut DriveLog) -> usize {
        let mut steps = 0;
        loop {
            sampler.step(pads, &LOW);
            steps += 1;
            if !sampler.is_driving() {
                return steps;
            }
        }
    }

    #[test]
    fn test_discharge_length() {
        let mut pads = DriveLog::default();
        let mut s = Sampler::<2>::new(&DEFAULT_CONFIG);

        assert_eq!(s.state(), ControllerState::InitStart);
        s.step(&mut pads, &LOW);
        assert_eq!(s.state(), ControllerState::InitDischarge);
        assert_eq!(pads.driven, [true, true]);

        // 11 bit counters give a 2 bit discharge counter, done when it reaches 2
        s.step(&mut pads, &HIGH);
        assert_eq!(s.state(), ControllerState::InitDischarge);
        s.step(&mut pads, &HIGH);
        assert_eq!(s.state(), ControllerState::InitSample);
        assert_eq!(pads.driven, [false, false]);
        assert_eq!(pads.releases, 2);

        let wide = Config { counter_width: 16, ..DEFAULT_CONFIG };
        let mut s = Sampler::<2>::new(&wide);
        // Start, then 8 ticks on a 4 bit discharge counter
        assert_eq!(discharge(&mut s, &mut pads), 9);
    }

    #[test]
    fn test_calibration_counts_until_all_pads_high() {
        let mut pads = DriveLog::default();
        let mut s = Sampler::<2>::new(&DEFAULT_CONFIG);
        discharge(&mut s, &mut pads);

        for _ in 0..9 {
            assert_eq!(s.step(&mut pads, &[true, false]), StepEvent::None);
        }
        assert!(!s.ready());
        assert_eq!(s.step(&mut pads, &HIGH), StepEvent::Calibrated);
        assert!(s.ready());
        assert_eq!(s.calibration(), 10);
        assert_eq!(s.state(), ControllerState::RunStart);
        // 10 + 10 >> 3
        assert_eq!(s.threshold(), 11);
    }

    #[test]
    fn test_run_sample_latches_complement() {
        let mut pads = DriveLog::default();
        let mut s = Sampler::<2>::new(&DEFAULT_CONFIG);
        discharge(&mut s, &mut pads);
        for _ in 0..39 {
            s.step(&mut pads, &LOW);
        }
        s.step(&mut pads, &HIGH);
        assert_eq!(s.calibration(), 40);
        assert_eq!(s.threshold(), 45);

        // RunStart and the run discharge
        let before = pads.drives;
        discharge(&mut s, &mut pads);
        assert_eq!(pads.drives, before + 2);
        assert_eq!(s.state(), ControllerState::RunSample);

        for _ in 0..44 {
            assert_eq!(s.step(&mut pads, &[true, false]), StepEvent::None);
        }
        assert_eq!(s.step(&mut pads, &[true, false]), StepEvent::Sampled);
        assert_eq!(s.raw_samples(), &[false, true]);
        assert_eq!(s.state(), ControllerState::RunStart);
        assert!(s.ready());
    }

    #[test]
    fn test_calibration_overflow_restarts() {
        let narrow = Config { counter_width: 4, ..DEFAULT_CONFIG };
        let mut pads = DriveLog::default();
        let mut s = Sampler::<2>::new(&narrow);

        discharge(&mut s, &mut pads);
        for _ in 0..15 {
            assert_eq!(s.step(&mut pads, &LOW), StepEvent::None);
        }
        assert_eq!(s.calibration(), 15);
        assert_eq!(s.step(&mut pads, &LOW), StepEvent::CalibrationOverflow);
        assert_eq!(s.state(), ControllerState::InitStart);
        assert_eq!(s.calibration_failures(), 1);
        assert!(!s.ready());

        // The retry starts from zero
        s.step(&mut pads, &LOW);
        assert_eq!(s.calibration(), 0);
        assert_eq!(s.calibration_attempts(), 2);
    }

    #[test]
    #[should_panic]
    fn test_counter_too_narrow_for_discharge() {
        let narrow = Config { counter_width: 3, ..DEFAULT_CONFIG };
        Sampler::<2>::new(&narrow);
    }

    #[test]
    fn test_reset_from_any_state() {
        let mut pads = DriveLog::default();
        let mut s = Sampler::<2>::new(&DEFAULT_CONFIG);
        let mut seen = [false; 6];

        for i in 0..200 {
            s.reset();
            assert_eq!(s.state(), ControllerState::InitStart);
            assert_eq!(s.calibration(), 0);
            assert_eq!(s.raw_samples(), &LOW);

            // Walk to a different depth each time before resetting again
            for _ in 0..i {
                let levels = if s.calibration() >= 5 { HIGH } else { LOW };
                s.step(&mut pads, &levels);
            }
            seen[s.state() as usize] = true;
        }
        assert!(seen.iter().all(|v| *v), "not every state was reset from");
        // Every pass but the first took at least the InitStart step
        assert_eq!(s.calibration_attempts(), 199);
    }
}
