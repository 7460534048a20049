//! Per-slot outlier rejection ahead of the regression.

use super::series::SeriesPoint;

/// Series shorter than this are returned untouched.
pub const MIN_POINTS_FOR_FILTERING: usize = 3;

/// Drop points whose value lies more than `z_threshold` standard deviations
/// from the mean of the series.
///
/// The deviation is floored at 1 so a nearly constant series does not reject
/// points that differ by a fraction of a percent.
pub fn filter_outliers(points: &[SeriesPoint], z_threshold: f64) -> Vec<SeriesPoint> {
    if points.len() < MIN_POINTS_FOR_FILTERING {
        return points.to_vec();
    }

    let n = points.len() as f64;
    let mean = points.iter().map(|p| p.value).sum::<f64>() / n;
    let variance = points.iter().map(|p| (p.value - mean).powi(2)).sum::<f64>() / n;
    let sd = variance.sqrt().max(1.0);

    points
        .iter()
        .filter(|p| (p.value - mean).abs() / sd <= z_threshold)
        .copied()
        .collect()
}
