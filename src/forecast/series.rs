//! Per (location, slot) training series.

use std::collections::BTreeMap;

use crate::db::Observation;

use super::history::HistoryWindow;
use super::quality::{DayQualityIndex, SignalCoverage};

/// One training sample: a reading and how many weeks before the target it was taken.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub week_offset: i64,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(week_offset: i64, value: f64) -> Self {
        Self { week_offset, value }
    }
}

/// Training series for every (location, slot), built fresh per forecast.
#[derive(Debug, Clone, Default)]
pub struct SlotSeriesIndex {
    series: BTreeMap<String, BTreeMap<u32, Vec<SeriesPoint>>>,
}

impl SlotSeriesIndex {
    /// Collect readings from admissible history days.
    ///
    /// Readings below `min_valid_occupancy`, readings from days rejected for
    /// their location, and slots without any signal are left out.
    pub fn build(
        observations: &[Observation],
        window: &HistoryWindow,
        quality: &DayQualityIndex,
        coverage: &SignalCoverage,
        min_valid_occupancy: f64,
    ) -> Self {
        let mut series: BTreeMap<String, BTreeMap<u32, Vec<SeriesPoint>>> = BTreeMap::new();

        for o in observations {
            if o.occupancy < min_valid_occupancy
                || !window.contains(o.date)
                || !quality.is_allowed(&o.location, o.date)
                || !coverage.has_signal(&o.location, o.slot)
            {
                continue;
            }

            series
                .entry(o.location.clone())
                .or_default()
                .entry(o.slot)
                .or_default()
                .push(SeriesPoint::new(window.week_offset(o.date), o.occupancy));
        }

        Self { series }
    }

    /// Training points for a slot; empty when the slot has no usable data.
    pub fn points(&self, location: &str, slot: u32) -> &[SeriesPoint] {
        self.series
            .get(location)
            .and_then(|inner| inner.get(&slot))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Total number of training points across all locations and slots.
    pub fn point_count(&self) -> usize {
        self.series
            .values()
            .flat_map(|inner| inner.values())
            .map(Vec::len)
            .sum()
    }
}
