use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub store: StoreConfig,
    pub network: NetworkConfig,
    pub forecast: ForecastConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
}

/// Which sample store backs the forecaster.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Postgres,
    Http,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Upper bound for the single bulk fetch of a forecast request.
    pub fetch_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Postgres,
            fetch_timeout_secs: 15,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    /// Base URL of the dashboard serving `/api/bib/{date}`.
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

/// Tuning knobs of the forecasting engine.
///
/// Passed explicitly into every forecast so a run is a pure function of its
/// inputs.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ForecastConfig {
    /// How many prior occurrences of the target weekday are used.
    pub lookback_weeks: u32,
    /// History days before this year are never used.
    pub epoch_year: i32,
    /// Minimum average of positive readings for a day to count.
    pub min_day_avg: f64,
    /// Max distance from the slot mean, in standard deviations.
    pub outlier_z_threshold: f64,
    /// Readings below this are treated as "no signal".
    pub min_valid_occupancy: f64,
    /// IANA zone defining "today" and the current slot.
    pub timezone: String,
    /// Locations that always appear in the output.
    pub locations: Vec<String>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            lookback_weeks: 8,
            epoch_year: 2000,
            min_day_avg: 10.0,
            outlier_z_threshold: 1.5,
            min_valid_occupancy: 1.0,
            timezone: "Europe/Berlin".to_string(),
            locations: default_locations(),
        }
    }
}

pub fn default_locations() -> Vec<String> {
    ["A3", "A5", "Jura", "Schloss", "BWL"]
        .iter()
        .map(|l| l.to_string())
        .collect()
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        // Load .env file (silently ignore if not present - production uses env vars directly)
        let _ = dotenvy::dotenv();

        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bib-monitor");

        let defaults = ForecastConfig::default();

        let builder = Config::builder()
            // 1. Load default values
            // Database (DATABASE_URL is optional, the HTTP store needs none)
            .set_default("database.url", std::env::var("DATABASE_URL").ok())?
            // Store
            .set_default("store.backend", "postgres")?
            .set_default("store.fetch_timeout_secs", 15)?
            // Network
            .set_default("network.base_url", "http://localhost:3000")?
            .set_default("network.request_timeout_secs", 30)?
            .set_default("network.connect_timeout_secs", 10)?
            // Forecast
            .set_default("forecast.lookback_weeks", defaults.lookback_weeks as i64)?
            .set_default("forecast.epoch_year", defaults.epoch_year as i64)?
            .set_default("forecast.min_day_avg", defaults.min_day_avg)?
            .set_default("forecast.outlier_z_threshold", defaults.outlier_z_threshold)?
            .set_default("forecast.min_valid_occupancy", defaults.min_valid_occupancy)?
            .set_default("forecast.timezone", defaults.timezone)?
            .set_default("forecast.locations", defaults.locations)?

            // 2. Load from local config file (optional, lowest priority)
            .add_source(File::from(PathBuf::from("config.toml")).required(false))

            // 3. Load from user config directory (optional, overrides local)
            .add_source(File::from(config_dir.join("config.toml")).required(false))

            // 4. Load from Environment variables (BIB__FORECAST__LOOKBACK_WEEKS=...)
            .add_source(
                Environment::with_prefix("BIB")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("forecast.locations")
                    .try_parsing(true),
            );

        let s = builder.build().context("Failed to assemble configuration")?;
        Ok(s.try_deserialize()?)
    }
}
