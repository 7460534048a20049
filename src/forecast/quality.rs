//! Day-level admissibility and scrape-outage detection.
//!
//! A location that was closed or unmonitored on a given day produces a day of
//! zeros or near-zeros. Training on such a day drags every slot's baseline
//! down, so whole days are judged per location before any slot is fitted.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::db::Observation;

/// Aggregate of positive readings for one location on one day.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DayQuality {
    pub sum: f64,
    pub count: u32,
}

impl DayQuality {
    pub fn record(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    /// Average of the recorded readings, `None` when nothing was recorded.
    pub fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    /// A day is admissible iff it has readings averaging at least `min_day_avg`.
    pub fn is_admissible(&self, min_day_avg: f64) -> bool {
        self.average().is_some_and(|avg| avg >= min_day_avg)
    }
}

/// Per (location, day) quality, built fresh for each forecast.
#[derive(Debug, Clone, Default)]
pub struct DayQualityIndex {
    days: BTreeMap<String, BTreeMap<NaiveDate, DayQuality>>,
    min_day_avg: f64,
}

impl DayQualityIndex {
    /// Accumulate readings of at least `min_valid_occupancy` per location and day.
    pub fn build(observations: &[Observation], min_valid_occupancy: f64, min_day_avg: f64) -> Self {
        let mut days: BTreeMap<String, BTreeMap<NaiveDate, DayQuality>> = BTreeMap::new();

        for o in observations {
            let quality = days
                .entry(o.location.clone())
                .or_default()
                .entry(o.date)
                .or_default();
            if o.occupancy >= min_valid_occupancy {
                quality.record(o.occupancy);
            }
        }

        Self { days, min_day_avg }
    }

    pub fn quality(&self, location: &str, date: NaiveDate) -> Option<DayQuality> {
        self.days.get(location)?.get(&date).copied()
    }

    pub fn is_allowed(&self, location: &str, date: NaiveDate) -> bool {
        self.quality(location, date)
            .is_some_and(|q| q.is_admissible(self.min_day_avg))
    }

    /// Number of (location, day) pairs that were rejected.
    pub fn rejected_count(&self) -> usize {
        self.days
            .values()
            .flat_map(|inner| inner.values())
            .filter(|q| !q.is_admissible(self.min_day_avg))
            .count()
    }
}

/// Count of positive readings per (location, slot) across the history window,
/// regardless of whether the day was admissible.
///
/// A slot nobody ever reported for is a scrape outage, not a quiet period,
/// and is skipped instead of being extrapolated from zero. In the forecast
/// pipeline this is a diagnostic: the series builder already drops readings
/// below the validity threshold, so it never gates a point on its own.
#[derive(Debug, Clone, Default)]
pub struct SignalCoverage {
    counts: BTreeMap<String, BTreeMap<u32, u32>>,
}

impl SignalCoverage {
    pub fn build<'a>(
        observations: impl IntoIterator<Item = &'a Observation>,
        min_valid_occupancy: f64,
    ) -> Self {
        let mut counts: BTreeMap<String, BTreeMap<u32, u32>> = BTreeMap::new();

        for o in observations {
            let count = counts
                .entry(o.location.clone())
                .or_default()
                .entry(o.slot)
                .or_default();
            if o.occupancy >= min_valid_occupancy {
                *count += 1;
            }
        }

        Self { counts }
    }

    pub fn positive_count(&self, location: &str, slot: u32) -> u32 {
        self.counts
            .get(location)
            .and_then(|inner| inner.get(&slot))
            .copied()
            .unwrap_or(0)
    }

    pub fn has_signal(&self, location: &str, slot: u32) -> bool {
        self.positive_count(location, slot) > 0
    }
}
