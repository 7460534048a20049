//! Bib Monitor Library
//!
//! Seat occupancy forecasting for the university library locations. The
//! binary is a thin CLI around these components.

pub mod api;
pub mod config;
pub mod db;
pub mod export;
pub mod forecast;
pub mod slot;
pub mod traits;

// Re-export commonly used types
pub use api::DashboardClient;
pub use crate::config::{AppConfig, ForecastConfig, StoreBackend};
pub use db::{Database, Observation};
pub use forecast::{
    DailyForecast, DayKind, ForecastError, ForecastPoint, Forecaster, compute_forecast,
    parse_target_date, slot_range,
};
pub use slot::{LAST_SLOT, SLOTS_PER_DAY, SlotError, parse_time_label, slot_to_time, time_to_slot};
pub use traits::{Clock, MockClock, MockSampleStore, SampleStore, SystemClock};
