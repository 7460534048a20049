//! Abstractions for time and the sample store to enable testing.
//!
//! This module provides traits for:
//! - `Clock`: Abstracting time access for deterministic testing
//! - `SampleStore`: Abstracting the bulk read of historical observations

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};

use crate::db::Observation;

// ==================== Clock Trait ====================

/// Trait for abstracting time access.
///
/// This allows injecting mock clocks during testing to create
/// deterministic, reproducible tests for time-dependent logic.
pub trait Clock: Send + Sync {
    /// Get the current time in UTC.
    fn now_utc(&self) -> DateTime<Utc>;
}

/// System clock implementation using real time.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Mock clock for testing with controllable time.
#[derive(Debug, Clone)]
pub struct MockClock {
    utc_time: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Create a new mock clock set to the given UTC time.
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            utc_time: Arc::new(Mutex::new(time)),
        }
    }

    /// Set the mock clock to a new time.
    pub fn set_time(&self, time: DateTime<Utc>) {
        *self.utc_time.lock().unwrap() = time;
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: chrono::Duration) {
        let mut time = self.utc_time.lock().unwrap();
        *time += duration;
    }
}

impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.utc_time.lock().unwrap()
    }
}

// ==================== SampleStore Trait ====================

/// Queryable store of raw occupancy observations.
///
/// Implementations must answer a whole set of calendar days in one call,
/// across all locations.
pub trait SampleStore: Send + Sync {
    /// Fetch every observation recorded on any of the given days.
    fn fetch_days(&self, days: &[NaiveDate])
    -> impl Future<Output = Result<Vec<Observation>>> + Send;
}

/// In-memory store for testing that records every query it receives.
#[derive(Debug, Clone, Default)]
pub struct MockSampleStore {
    observations: Arc<Mutex<Vec<Observation>>>,
    queries: Arc<Mutex<Vec<Vec<NaiveDate>>>>,
    failing: Arc<Mutex<bool>>,
    delay: Arc<Mutex<Option<Duration>>>,
}

impl MockSampleStore {
    /// Create an empty mock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock store pre-filled with observations.
    pub fn with_observations(observations: Vec<Observation>) -> Self {
        let store = Self::default();
        store.extend(observations);
        store
    }

    /// Add a single observation.
    pub fn push(&self, observation: Observation) {
        self.observations.lock().unwrap().push(observation);
    }

    /// Add many observations.
    pub fn extend(&self, observations: impl IntoIterator<Item = Observation>) {
        self.observations.lock().unwrap().extend(observations);
    }

    /// Make every subsequent fetch fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    /// Make every subsequent fetch wait this long before answering.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Get the day sets of all fetches received so far.
    pub fn queries(&self) -> Vec<Vec<NaiveDate>> {
        self.queries.lock().unwrap().clone()
    }

    /// Get the number of fetches received so far.
    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

impl SampleStore for MockSampleStore {
    async fn fetch_days(&self, days: &[NaiveDate]) -> Result<Vec<Observation>> {
        self.queries.lock().unwrap().push(days.to_vec());

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if *self.failing.lock().unwrap() {
            anyhow::bail!("mock sample store is unavailable");
        }

        let observations = self.observations.lock().unwrap();
        Ok(observations
            .iter()
            .filter(|o| days.contains(&o.date))
            .cloned()
            .collect())
    }
}
