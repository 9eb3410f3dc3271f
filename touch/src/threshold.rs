use crate::Sensitivity;

/// Compute the touch threshold from the calibrated charge time
///
/// The threshold is `thres + (thres >> shift)`, held in the same width as the
/// calibration counter. It saturates at `counter_max` rather than wrapping, so
/// it is never below `thres`.
pub fn threshold(thres: u16, sensitivity: Sensitivity, counter_max: u16) -> u16 {
    let margin = thres >> sensitivity.shift();
    thres.saturating_add(margin).min(counter_max)
}
