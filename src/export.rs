//! CSV export of forecasts.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::forecast::DailyForecast;

/// One CSV line: a single slot of a single location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastRow<'a> {
    pub date: &'a str,
    pub location: &'a str,
    pub time: &'a str,
    pub occupancy: Option<f64>,
    pub prediction: Option<f64>,
}

/// Flatten a forecast into rows, ordered by location then slot.
pub fn rows(forecast: &DailyForecast) -> impl Iterator<Item = ForecastRow<'_>> {
    forecast.occupancy.iter().flat_map(move |(location, points)| {
        points.iter().map(move |p| ForecastRow {
            date: &forecast.date,
            location,
            time: &p.time,
            occupancy: p.occupancy,
            prediction: p.prediction,
        })
    })
}

pub fn write_csv<W: Write>(forecast: &DailyForecast, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows(forecast) {
        wtr.serialize(row).context("Failed to write CSV row")?;
    }
    wtr.flush().context("Failed to flush CSV output")?;
    Ok(())
}

pub fn write_csv_file(forecast: &DailyForecast, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    write_csv(forecast, file)
}

/// Default export location: the user's download directory.
pub fn default_export_path(date: &str, exported_at: DateTime<Utc>) -> PathBuf {
    let mut path = dirs::download_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(format!(
        "bib_forecast_{}_{}.csv",
        date,
        exported_at.format("%Y%m%d_%H%M%S")
    ));
    path
}
