use crate::PadInterface;

/// Two stage pipeline between the pad levels and the state machine
///
/// The state machine only ever sees levels which were read two sample ticks
/// earlier. Pads are not read while they are being driven; a driven pad is
/// low, so a low level is shifted in instead.
#[derive(Clone, Copy, Debug)]
pub struct Synchronizer<const N: usize> {
    stage1: [bool; N],
    stage2: [bool; N],
}

impl<const N: usize> Synchronizer<N> {
    pub const fn new() -> Self {
        Self {
            stage1: [false; N],
            stage2: [false; N],
        }
    }

    /// Synchronized levels, as read two shifts ago
    pub fn levels(&self) -> &[bool; N] {
        &self.stage2
    }

    pub fn shift<P: PadInterface>(&mut self, pads: &mut P, driving: bool) {
        self.stage2 = self.stage1;
        for (i, level) in self.stage1.iter_mut().enumerate() {
            *level = !driving && pads.read_level(i);
        }
    }

    pub fn reset(&mut self) {
        self.stage1 = [false; N];
        self.stage2 = [false; N];
    }
}

impl<const N: usize> Default for Synchronizer<N> {
    fn default() -> Self {
        Self::new()
    }
}
