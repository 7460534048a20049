//! Output types and the merge of baselines, live blend and observations.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::Observation;
use crate::slot::slot_to_time;

use super::live::LiveBlend;

/// One slot of a location's forecast curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// Slot start as `"HH:MM"`.
    pub time: String,
    /// Observed value, for elapsed slots of today or past days.
    pub occupancy: Option<f64>,
    /// Forecast value, absent wherever a real value is shown or no forecast exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction: Option<f64>,
}

impl ForecastPoint {
    pub fn empty(slot: u32) -> Self {
        Self {
            time: slot_to_time(slot),
            occupancy: None,
            prediction: None,
        }
    }
}

/// Forecast for every location over a slot range of one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: String,
    pub occupancy: BTreeMap<String, Vec<ForecastPoint>>,
    /// Set when the forecast fell back to the all-null shape.
    #[serde(skip)]
    pub degraded: bool,
}

impl DailyForecast {
    /// All-null response: every location, every slot, no prediction.
    pub fn degraded(date: &str, range: RangeInclusive<u32>, locations: &[String]) -> Self {
        let occupancy = locations
            .iter()
            .map(|location| {
                let points = range.clone().map(ForecastPoint::empty).collect();
                (location.clone(), points)
            })
            .collect();

        Self {
            date: date.to_string(),
            occupancy,
            degraded: true,
        }
    }

    pub fn points(&self, location: &str) -> Option<&[ForecastPoint]> {
        self.occupancy.get(location).map(Vec::as_slice)
    }
}

/// Where the target day sits relative to the current civil date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayKind {
    Past,
    Today { current_slot: u32 },
    Future,
}

impl DayKind {
    pub fn classify(target: NaiveDate, today: NaiveDate, current_slot: u32) -> Self {
        if target < today {
            DayKind::Past
        } else if target == today {
            DayKind::Today { current_slot }
        } else {
            DayKind::Future
        }
    }

    /// Whether readings of the target day itself are needed.
    pub fn has_observations(&self) -> bool {
        !matches!(self, DayKind::Future)
    }

    fn shows_observation(&self, slot: u32) -> bool {
        match self {
            DayKind::Past => true,
            DayKind::Today { current_slot } => slot <= *current_slot,
            DayKind::Future => false,
        }
    }
}

/// Readings of a single day by location and slot, ignoring "no signal" values.
///
/// Repeated readings of the same slot keep the last one.
pub fn observed_on(
    observations: &[Observation],
    date: NaiveDate,
    min_valid_occupancy: f64,
) -> BTreeMap<String, BTreeMap<u32, f64>> {
    let mut observed: BTreeMap<String, BTreeMap<u32, f64>> = BTreeMap::new();
    for o in observations
        .iter()
        .filter(|o| o.date == date && o.occupancy >= min_valid_occupancy)
    {
        observed
            .entry(o.location.clone())
            .or_default()
            .insert(o.slot, o.occupancy);
    }
    observed
}

/// Build one location's points over `range`.
///
/// `baselines` holds a value for every slot with a usable estimate; `blend`
/// is only given for today.
pub fn assemble_location(
    range: RangeInclusive<u32>,
    day: DayKind,
    baselines: &BTreeMap<u32, f64>,
    observed: Option<&BTreeMap<u32, f64>>,
    blend: Option<&LiveBlend>,
) -> Vec<ForecastPoint> {
    range
        .map(|slot| {
            let occupancy = day
                .shows_observation(slot)
                .then(|| observed.and_then(|o| o.get(&slot).copied()))
                .flatten();

            let prediction = match (occupancy, baselines.get(&slot)) {
                (None, Some(&baseline)) => match (day, blend) {
                    (_, Some(blend)) => blend.adjust(slot, baseline),
                    (DayKind::Today { current_slot }, None) => {
                        (slot > current_slot).then_some(baseline)
                    }
                    _ => Some(baseline),
                },
                _ => None,
            };

            ForecastPoint {
                time: slot_to_time(slot),
                occupancy,
                prediction,
            }
        })
        .collect()
}
