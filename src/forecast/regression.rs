//! Per-slot trend fitting.

use super::series::SeriesPoint;

/// Ordinary least squares fit `value = intercept + slope * week_offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub intercept: f64,
    pub slope: f64,
}

impl LinearFit {
    pub fn predict(&self, week_offset: f64) -> f64 {
        self.intercept + self.slope * week_offset
    }
}

/// How a slot's baseline was obtained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SlotEstimate {
    /// Intercept of a trend line over two or more points.
    Regression(f64),
    /// Plain mean, used when a trend is undefined.
    Mean(f64),
    /// No usable training points; the slot gets no prediction.
    NoSignal,
}

impl SlotEstimate {
    pub fn value(&self) -> Option<f64> {
        match self {
            SlotEstimate::Regression(v) | SlotEstimate::Mean(v) => Some(*v),
            SlotEstimate::NoSignal => None,
        }
    }
}

/// Fit a line through the points. `None` with fewer than two points or when
/// every point shares the same week offset.
pub fn fit_least_squares(points: &[SeriesPoint]) -> Option<LinearFit> {
    if points.len() < 2 {
        return None;
    }

    let n = points.len() as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
    for p in points {
        let x = p.week_offset as f64;
        sum_x += x;
        sum_y += p.value;
        sum_xy += x * p.value;
        sum_xx += x * x;
    }

    let denom = n * sum_xx - sum_x * sum_x;
    if denom.abs() < f64::EPSILON {
        return None;
    }

    let slope = (n * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / n;

    Some(LinearFit { intercept, slope })
}

/// Baseline for one (location, slot) from its outlier-filtered series.
///
/// The trend is evaluated at the target week (offset 0) and capped at the
/// highest reading seen for the slot, so an upward slope never forecasts a
/// peak that was never observed.
pub fn estimate_slot(points: &[SeriesPoint]) -> SlotEstimate {
    if points.is_empty() {
        return SlotEstimate::NoSignal;
    }

    if let Some(fit) = fit_least_squares(points) {
        let observed_max = points
            .iter()
            .map(|p| p.value)
            .fold(f64::NEG_INFINITY, f64::max);
        let ceiling = observed_max.clamp(0.0, 100.0);
        return SlotEstimate::Regression(fit.predict(0.0).clamp(0.0, ceiling).round());
    }

    let mean = points.iter().map(|p| p.value).sum::<f64>() / points.len() as f64;
    SlotEstimate::Mean(mean.clamp(0.0, 100.0).round())
}
