//! Occupancy forecasting engine
//!
//! Produces a per-slot forecast curve for every location on a target day from
//! the same weekday's readings over the preceding weeks:
//!
//! 1. [`history`] picks the admissible history days
//! 2. [`quality`] drops days on which a location was effectively unmonitored
//! 3. [`series`] gathers (week offset, value) samples per slot
//! 4. [`outlier`] removes single-day anomalies
//! 5. [`regression`] fits a trend and yields a clamped baseline
//! 6. [`live`] shifts today's remaining slots by the live discrepancy
//! 7. [`assemble`] merges everything with the real readings
//!
//! Every request is computed from scratch after one bulk read from the store.

pub mod assemble;
pub mod history;
pub mod live;
pub mod outlier;
pub mod quality;
pub mod regression;
pub mod series;

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use thiserror::Error;

use crate::config::ForecastConfig;
use crate::db::Observation;
use crate::slot::{LAST_SLOT, SLOTS_PER_DAY, slot_of};
use crate::traits::{Clock, SampleStore};

pub use assemble::{DailyForecast, DayKind, ForecastPoint};
pub use history::HistoryWindow;
pub use live::LiveBlend;
pub use quality::{DayQuality, DayQualityIndex, SignalCoverage};
pub use regression::{LinearFit, SlotEstimate};
pub use series::{SeriesPoint, SlotSeriesIndex};

/// Default bound on the single store fetch of a request.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors of the forecasting engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    /// Malformed date, slot range or configuration.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The sample store could not be read.
    #[error("sample store unavailable: {0}")]
    UpstreamUnavailable(String),
    /// No history day survives the epoch cutoff.
    #[error("no admissible history for {0}")]
    InsufficientHistory(NaiveDate),
}

/// Parse a strict `YYYY-MM-DD` date.
pub fn parse_target_date(input: &str) -> Result<NaiveDate, ForecastError> {
    let invalid = || {
        ForecastError::InvalidArgument(format!("invalid date '{}', use YYYY-MM-DD", input))
    };

    let well_formed = input.len() == 10
        && input.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !well_formed {
        return Err(invalid());
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d").map_err(|_| invalid())
}

/// Validate a requested slot range.
pub fn slot_range(start_slot: u32, end_slot: u32) -> Result<RangeInclusive<u32>, ForecastError> {
    if start_slot > end_slot || end_slot >= SLOTS_PER_DAY {
        return Err(ForecastError::InvalidArgument(format!(
            "invalid slot range {}..={}, expected start <= end < {}",
            start_slot, end_slot, SLOTS_PER_DAY
        )));
    }
    Ok(start_slot..=end_slot)
}

/// Compute a forecast from already fetched observations.
///
/// `now` is the current civil time in the forecasting timezone. The result
/// depends on nothing but the arguments.
pub fn compute_forecast(
    date: &str,
    target: NaiveDate,
    range: RangeInclusive<u32>,
    now: NaiveDateTime,
    observations: &[Observation],
    config: &ForecastConfig,
) -> DailyForecast {
    let window = HistoryWindow::new(target, config.lookback_weeks, config.epoch_year);
    if window.is_empty() {
        return DailyForecast::degraded(date, range, &config.locations);
    }

    let day = DayKind::classify(target, now.date(), slot_of(&now));

    let quality = DayQualityIndex::build(
        observations,
        config.min_valid_occupancy,
        config.min_day_avg,
    );
    let coverage = SignalCoverage::build(
        observations.iter().filter(|o| window.contains(o.date)),
        config.min_valid_occupancy,
    );
    let series = SlotSeriesIndex::build(
        observations,
        &window,
        &quality,
        &coverage,
        config.min_valid_occupancy,
    );
    let observed = if day.has_observations() {
        assemble::observed_on(observations, target, config.min_valid_occupancy)
    } else {
        BTreeMap::new()
    };

    let mut occupancy = BTreeMap::new();
    let mut no_signal_slots = 0usize;

    for location in &config.locations {
        let baselines: BTreeMap<u32, f64> = (0..SLOTS_PER_DAY)
            .filter_map(|slot| {
                let filtered =
                    outlier::filter_outliers(series.points(location, slot), config.outlier_z_threshold);
                regression::estimate_slot(&filtered)
                    .value()
                    .map(|baseline| (slot, baseline))
            })
            .collect();
        no_signal_slots += range.clone().filter(|s| !baselines.contains_key(s)).count();

        let observed_here = observed.get(location.as_str());
        let blend = match day {
            DayKind::Today { current_slot } => Some(LiveBlend::new(
                current_slot,
                observed_here.and_then(|o| o.get(&current_slot).copied()),
                baselines.get(&current_slot).copied(),
            )),
            _ => None,
        };
        if let Some(blend) = &blend {
            tracing::debug!(
                "Live delta for {} at slot {}: {:+}",
                location,
                blend.current_slot,
                blend.delta
            );
        }

        let points =
            assemble::assemble_location(range.clone(), day, &baselines, observed_here, blend.as_ref());
        occupancy.insert(location.clone(), points);
    }

    tracing::debug!(
        "Forecast for {}: {} history days, {} training points, {} rejected location-days, {} slots without signal",
        date,
        window.len(),
        series.point_count(),
        quality.rejected_count(),
        no_signal_slots
    );

    DailyForecast {
        date: date.to_string(),
        occupancy,
        degraded: false,
    }
}

/// Forecasting front end bound to a sample store and a clock.
pub struct Forecaster<S, C> {
    store: S,
    clock: C,
    config: ForecastConfig,
    timezone: Tz,
    fetch_timeout: Duration,
}

impl<S: SampleStore, C: Clock> Forecaster<S, C> {
    /// Create a forecaster. Fails if the configured timezone is unknown.
    pub fn new(store: S, clock: C, config: ForecastConfig) -> Result<Self, ForecastError> {
        let timezone: Tz = config.timezone.parse().map_err(|_| {
            ForecastError::InvalidArgument(format!("unknown timezone '{}'", config.timezone))
        })?;

        Ok(Self {
            store,
            clock,
            config,
            timezone,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        })
    }

    /// Bound the store fetch by `timeout`.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Current civil time in the forecasting timezone.
    pub fn now_civil(&self) -> NaiveDateTime {
        self.clock
            .now_utc()
            .with_timezone(&self.timezone)
            .naive_local()
    }

    /// Forecast the whole day.
    pub async fn forecast_day(&self, date: &str) -> Result<DailyForecast, ForecastError> {
        self.forecast(date, 0, LAST_SLOT).await
    }

    /// Forecast `start_slot..=end_slot` of `date`.
    ///
    /// Only malformed arguments are errors. A failing store or an empty
    /// history yields the all-null response, flagged as degraded.
    pub async fn forecast(
        &self,
        date: &str,
        start_slot: u32,
        end_slot: u32,
    ) -> Result<DailyForecast, ForecastError> {
        let target = parse_target_date(date)?;
        let range = slot_range(start_slot, end_slot)?;

        match self.forecast_target(date, target, range.clone()).await {
            Err(e @ ForecastError::InvalidArgument(_)) => Err(e),
            Err(e) => {
                tracing::warn!("Serving empty forecast for {}: {}", date, e);
                Ok(DailyForecast::degraded(date, range, &self.config.locations))
            }
            Ok(forecast) => Ok(forecast),
        }
    }

    /// Like [`Forecaster::forecast`] but reports degradations as errors.
    pub async fn try_forecast(
        &self,
        date: &str,
        start_slot: u32,
        end_slot: u32,
    ) -> Result<DailyForecast, ForecastError> {
        let target = parse_target_date(date)?;
        let range = slot_range(start_slot, end_slot)?;
        self.forecast_target(date, target, range).await
    }

    async fn forecast_target(
        &self,
        date: &str,
        target: NaiveDate,
        range: RangeInclusive<u32>,
    ) -> Result<DailyForecast, ForecastError> {
        let now = self.now_civil();
        let window = HistoryWindow::new(target, self.config.lookback_weeks, self.config.epoch_year);
        if window.is_empty() {
            return Err(ForecastError::InsufficientHistory(target));
        }

        let day = DayKind::classify(target, now.date(), slot_of(&now));
        let mut days = window.days().to_vec();
        if day.has_observations() {
            days.push(target);
        }

        tracing::debug!(
            "Fetching {} days for forecast of {} ({:?})",
            days.len(),
            date,
            day
        );

        let observations =
            match tokio::time::timeout(self.fetch_timeout, self.store.fetch_days(&days)).await {
                Ok(Ok(rows)) => rows,
                Ok(Err(e)) => return Err(ForecastError::UpstreamUnavailable(format!("{:#}", e))),
                Err(_) => {
                    return Err(ForecastError::UpstreamUnavailable(format!(
                        "fetch timed out after {:?}",
                        self.fetch_timeout
                    )));
                }
            };

        tracing::debug!("Fetched {} observations", observations.len());

        Ok(compute_forecast(
            date,
            target,
            range,
            now,
            &observations,
            &self.config,
        ))
    }
}
