//! Output debounce filter
//!
//! Each pad keeps a window of its most recent raw samples. The debounced
//! output only changes when the whole window agrees: all ones sets it, all
//! zeros clears it, and anything in between holds the previous value.

/// Shift register of the most recent raw samples of one pad, newest in bit 0
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DebounceWindow {
    bits: u8,
}

impl DebounceWindow {
    fn push(&mut self, sample: bool, mask: u8) {
        self.bits = ((self.bits << 1) | sample as u8) & mask;
    }

    /// The agreed value of the window, if it is unanimous
    fn verdict(&self, mask: u8) -> Option<bool> {
        if self.bits == mask {
            Some(true)
        } else if self.bits == 0 {
            Some(false)
        } else {
            None
        }
    }
}

pub struct DebounceFilter<const N: usize> {
    windows: [DebounceWindow; N],
    output: [bool; N],
    mask: u8,
}

impl<const N: usize> DebounceFilter<N> {
    /// Create a filter with a window of `depth` samples, 1 to 8
    pub(crate) fn new(depth: u8) -> Self {
        debug_assert!((1..=8).contains(&depth));
        Self {
            windows: [DebounceWindow::default(); N],
            output: [false; N],
            mask: ((1u16 << depth) - 1) as u8,
        }
    }

    /// Push one raw sample per pad into the windows
    pub fn shift_in(&mut self, samples: &[bool; N]) {
        for (window, sample) in self.windows.iter_mut().zip(samples.iter()) {
            window.push(*sample, self.mask);
        }
    }

    /// Re-evaluate the outputs from the current windows
    ///
    /// Returns true if any output changed
    pub fn evaluate(&mut self) -> bool {
        let mut changed = false;
        for (output, window) in self.output.iter_mut().zip(self.windows.iter()) {
            if let Some(value) = window.verdict(self.mask) {
                changed |= *output != value;
                *output = value;
            }
        }
        changed
    }

    pub fn output(&self) -> &[bool; N] {
        &self.output
    }

    pub fn reset(&mut self) {
        self.windows = [DebounceWindow::default(); N];
        self.output = [false; N];
    }
}
