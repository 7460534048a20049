//! End-to-end forecasting tests against the in-memory sample store.
//!
//! The mock clock pins "now" so the split between observed and forecast
//! slots is deterministic.

use bib_monitor::{
    ForecastConfig, ForecastError, Forecaster, MockClock, MockSampleStore, Observation,
};
use chrono::{Duration, NaiveDate, TimeZone, Utc};

/// Monday used as the target in most tests.
fn target() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 17).unwrap()
}

fn weeks_before(weeks: i64) -> NaiveDate {
    target() - Duration::weeks(weeks)
}

fn obs(location: &str, date: NaiveDate, slot: u32, occupancy: f64) -> Observation {
    Observation {
        location: location.to_string(),
        date,
        slot,
        occupancy,
    }
}

/// Eight prior Mondays for A3: slot 90 around 40% with one 95% outlier three
/// weeks back, slot 95 steady at 44%.
fn monday_history() -> Vec<Observation> {
    let slot_90 = [40.0, 41.0, 95.0, 39.0, 40.0, 42.0, 38.0, 40.0];
    let mut observations = Vec::new();
    for (i, value) in slot_90.iter().enumerate() {
        let day = weeks_before(i as i64 + 1);
        observations.push(obs("A3", day, 90, *value));
        observations.push(obs("A3", day, 95, 44.0));
    }
    observations
}

/// Clock set to 15:00 Berlin summer time on the given day.
fn clock_at_three_pm(day: NaiveDate) -> MockClock {
    MockClock::new(Utc.from_utc_datetime(&day.and_hms_opt(13, 0, 0).unwrap()))
}

fn forecaster(store: &MockSampleStore, clock: MockClock) -> Forecaster<MockSampleStore, MockClock> {
    Forecaster::new(store.clone(), clock, ForecastConfig::default()).unwrap()
}

#[tokio::test]
async fn test_outlier_is_ignored_for_future_day() {
    let store = MockSampleStore::with_observations(monday_history());
    let forecaster = forecaster(&store, clock_at_three_pm(weeks_before(1)));

    let forecast = forecaster.forecast("2024-06-17", 90, 95).await.unwrap();

    let a3 = forecast.points("A3").unwrap();
    assert_eq!(a3[0].time, "15:00");
    assert_eq!(a3[0].prediction, Some(40.0));
    assert_eq!(a3[5].time, "15:50");
    assert_eq!(a3[5].prediction, Some(44.0));
    assert!(a3[1..5].iter().all(|p| p.prediction.is_none()));
    assert!(a3.iter().all(|p| p.occupancy.is_none()));
}

#[tokio::test]
async fn test_live_delta_shifts_rest_of_today() {
    let store = MockSampleStore::with_observations(monday_history());
    store.push(obs("A3", target(), 88, 48.0));
    store.push(obs("A3", target(), 90, 55.0));
    let forecaster = forecaster(&store, clock_at_three_pm(target()));

    let forecast = forecaster.forecast_day("2024-06-17").await.unwrap();
    let a3 = forecast.points("A3").unwrap();

    assert_eq!(a3.len(), 144);
    // Elapsed slots show readings only
    assert_eq!(a3[88].occupancy, Some(48.0));
    assert_eq!(a3[88].prediction, None);
    assert_eq!(a3[90].occupancy, Some(55.0));
    assert_eq!(a3[90].prediction, None);
    // 55 observed against a baseline of 40 shifts later slots by +15
    assert_eq!(a3[95].occupancy, None);
    assert_eq!(a3[95].prediction, Some(59.0));
}

#[tokio::test]
async fn test_missing_live_reading_means_no_shift() {
    let store = MockSampleStore::with_observations(monday_history());
    let forecaster = forecaster(&store, clock_at_three_pm(target()));

    let forecast = forecaster.forecast("2024-06-17", 90, 95).await.unwrap();
    let a3 = forecast.points("A3").unwrap();

    assert_eq!(a3[0].prediction, None);
    assert_eq!(a3[5].prediction, Some(44.0));
}

#[tokio::test]
async fn test_delta_does_not_depend_on_requested_range() {
    let store = MockSampleStore::with_observations(monday_history());
    store.push(obs("A3", target(), 90, 55.0));
    let forecaster = forecaster(&store, clock_at_three_pm(target()));

    let narrow = forecaster.forecast("2024-06-17", 95, 95).await.unwrap();
    assert_eq!(narrow.points("A3").unwrap()[0].prediction, Some(59.0));
}

#[tokio::test]
async fn test_past_day_never_has_both_values() {
    let mut observations = monday_history();
    observations.push(obs("A3", target(), 90, 61.0));
    let store = MockSampleStore::with_observations(observations);
    let forecaster = forecaster(&store, clock_at_three_pm(target() + Duration::days(3)));

    let forecast = forecaster.forecast_day("2024-06-17").await.unwrap();

    for points in forecast.occupancy.values() {
        assert!(
            points
                .iter()
                .all(|p| p.occupancy.is_none() || p.prediction.is_none())
        );
    }
    let a3 = forecast.points("A3").unwrap();
    assert_eq!(a3[90].occupancy, Some(61.0));
    assert_eq!(a3[95].prediction, Some(44.0));
}

#[tokio::test]
async fn test_quiet_day_is_excluded_for_its_location() {
    let mut observations = monday_history();
    // Last Monday A3 was barely monitored: a low average sinks the whole day
    for slot in 60..90 {
        observations.push(obs("A3", weeks_before(1), slot, 2.0));
    }
    observations.push(obs("A3", weeks_before(2), 60, 30.0));
    let store = MockSampleStore::with_observations(observations);
    let forecaster = forecaster(&store, clock_at_three_pm(weeks_before(1)));

    let forecast = forecaster.forecast("2024-06-17", 60, 60).await.unwrap();
    // Only the reading from two weeks back is left for slot 60
    assert_eq!(forecast.points("A3").unwrap()[0].prediction, Some(30.0));
}

#[tokio::test]
async fn test_every_location_present_without_data() {
    let store = MockSampleStore::with_observations(monday_history());
    let forecaster = forecaster(&store, clock_at_three_pm(weeks_before(1)));

    let forecast = forecaster.forecast("2024-06-17", 48, 138).await.unwrap();

    assert!(!forecast.degraded);
    assert_eq!(forecast.occupancy.len(), 5);
    for location in ["A3", "A5", "Jura", "Schloss", "BWL"] {
        let points = forecast.points(location).unwrap();
        assert_eq!(points.len(), 91);
        assert_eq!(points[0].time, "08:00");
        assert_eq!(points[90].time, "23:00");
    }
    let bwl = forecast.points("BWL").unwrap();
    assert!(bwl.iter().all(|p| p.prediction.is_none() && p.occupancy.is_none()));
}

#[tokio::test]
async fn test_no_history_before_epoch_degrades() {
    let config = ForecastConfig {
        epoch_year: 2024,
        ..Default::default()
    };
    let store = MockSampleStore::new();
    let clock = clock_at_three_pm(target());
    let forecaster = Forecaster::new(store.clone(), clock, config).unwrap();

    let forecast = forecaster.forecast_day("2023-12-02").await.unwrap();

    assert!(forecast.degraded);
    assert_eq!(store.query_count(), 0);
    assert_eq!(forecast.occupancy.len(), 5);
    for points in forecast.occupancy.values() {
        assert_eq!(points.len(), 144);
    }

    let json = serde_json::to_value(&forecast).unwrap();
    let first = &json["occupancy"]["Schloss"][0];
    assert_eq!(first["time"], "00:00");
    assert!(first["occupancy"].is_null());
    assert!(first.get("prediction").is_none());
}

#[tokio::test]
async fn test_store_failure_degrades_to_null_response() {
    let store = MockSampleStore::with_observations(monday_history());
    store.set_failing(true);
    let forecaster = forecaster(&store, clock_at_three_pm(target()));

    let forecast = forecaster.forecast("2024-06-17", 90, 95).await.unwrap();

    assert!(forecast.degraded);
    assert_eq!(forecast.date, "2024-06-17");
    for points in forecast.occupancy.values() {
        assert_eq!(points.len(), 6);
        assert!(points.iter().all(|p| p.occupancy.is_none() && p.prediction.is_none()));
    }

    assert!(matches!(
        forecaster.try_forecast("2024-06-17", 90, 95).await,
        Err(ForecastError::UpstreamUnavailable(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_slow_store_degrades_after_fetch_timeout() {
    let store = MockSampleStore::with_observations(monday_history());
    store.set_delay(Some(std::time::Duration::from_secs(60)));
    let forecaster = forecaster(&store, clock_at_three_pm(weeks_before(1)))
        .with_fetch_timeout(std::time::Duration::from_secs(1));

    let forecast = forecaster.forecast("2024-06-17", 90, 95).await.unwrap();

    assert!(forecast.degraded);
    assert_eq!(forecast.occupancy.len(), 5);
    for points in forecast.occupancy.values() {
        assert_eq!(points.len(), 6);
        assert!(points.iter().all(|p| p.occupancy.is_none() && p.prediction.is_none()));
    }

    match forecaster.try_forecast("2024-06-17", 90, 95).await {
        Err(ForecastError::UpstreamUnavailable(message)) => {
            assert!(message.contains("timed out"), "unexpected message: {}", message)
        }
        other => panic!("expected a timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn test_store_within_fetch_timeout_is_used() {
    let store = MockSampleStore::with_observations(monday_history());
    store.set_delay(Some(std::time::Duration::from_millis(10)));
    let forecaster = forecaster(&store, clock_at_three_pm(weeks_before(1)))
        .with_fetch_timeout(std::time::Duration::from_secs(5));

    let forecast = forecaster.forecast("2024-06-17", 90, 90).await.unwrap();

    assert!(!forecast.degraded);
    assert_eq!(forecast.points("A3").unwrap()[0].prediction, Some(40.0));
}

#[tokio::test]
async fn test_invalid_input_is_rejected() {
    let store = MockSampleStore::new();
    let forecaster = forecaster(&store, clock_at_three_pm(target()));

    for date in ["2024-13-01", "17.06.2024", "yesterday"] {
        assert!(matches!(
            forecaster.forecast(date, 0, 143).await,
            Err(ForecastError::InvalidArgument(_))
        ));
    }
    assert!(matches!(
        forecaster.forecast("2024-06-17", 0, 144).await,
        Err(ForecastError::InvalidArgument(_))
    ));
    assert_eq!(store.query_count(), 0);
}

#[tokio::test]
async fn test_single_bulk_fetch_per_request() {
    let store = MockSampleStore::with_observations(monday_history());
    let forecaster = forecaster(&store, clock_at_three_pm(target()));

    forecaster.forecast_day("2024-06-17").await.unwrap();
    forecaster.forecast_day("2024-06-24").await.unwrap();

    let queries = store.queries();
    assert_eq!(queries.len(), 2);
    // Today: eight history Mondays plus today
    assert_eq!(queries[0].len(), 9);
    // Next week: eight history Mondays, today among them
    assert_eq!(queries[1].len(), 8);
    assert!(queries[1].contains(&target()));
}

#[tokio::test]
async fn test_concurrent_requests_are_independent() {
    let store = MockSampleStore::with_observations(monday_history());
    let forecaster = forecaster(&store, clock_at_three_pm(weeks_before(1)));

    let (first, second) = tokio::join!(
        forecaster.forecast("2024-06-17", 90, 90),
        forecaster.forecast("2024-06-17", 90, 90),
    );

    assert_eq!(first.unwrap(), second.unwrap());
}
