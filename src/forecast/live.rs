//! Same-day adjustment of the baseline forecast.

/// Live correction for today's remaining slots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveBlend {
    /// Slot containing the current wall-clock time.
    pub current_slot: u32,
    /// Observed minus predicted at `current_slot`.
    pub delta: f64,
}

impl LiveBlend {
    /// Derive the blend from the live reading and the baseline at the current slot.
    ///
    /// Without either one there is nothing to compare and the delta is zero.
    pub fn new(current_slot: u32, live_value: Option<f64>, baseline: Option<f64>) -> Self {
        let delta = match (live_value, baseline) {
            (Some(live), Some(base)) => live - base,
            _ => 0.0,
        };
        Self { current_slot, delta }
    }

    /// Forecast for `slot`, or `None` for slots that already happened today.
    pub fn adjust(&self, slot: u32, baseline: f64) -> Option<f64> {
        (slot > self.current_slot).then(|| shift(baseline, self.delta))
    }
}

/// Shift a baseline by a constant offset, keeping it a whole percentage in [0, 100].
pub fn shift(baseline: f64, delta: f64) -> f64 {
    (baseline + delta).clamp(0.0, 100.0).round()
}
