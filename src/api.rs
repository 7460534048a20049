use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tokio::task::JoinSet;

use crate::config::NetworkConfig;
use crate::db::Observation;
use crate::forecast::DailyForecast;
use crate::slot::{checked_slot, parse_time_label};
use crate::traits::SampleStore;

/// Client for a dashboard serving daily occupancy curves at `/api/bib/{date}`.
///
/// Used as a sample store when there is no direct database access: the
/// observed values of each requested day become observations.
#[derive(Clone, Debug)]
pub struct DashboardClient {
    client: reqwest::Client,
    base_url: String,
}

impl DashboardClient {
    /// Create a new client with configurable timeouts.
    pub fn new(base_url: String, network_config: &NetworkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(network_config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(network_config.connect_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, date: NaiveDate) -> String {
        format!("{}/api/bib/{}", self.base_url, date.format("%Y-%m-%d"))
    }

    /// Fetch the daily curve of every location for one date.
    pub async fn fetch_daily(&self, date: NaiveDate) -> Result<DailyForecast> {
        let response = self
            .client
            .get(self.url_for(date))
            .send()
            .await
            .context("Failed to send request to dashboard")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Dashboard returned error status {} for {}", status, date);
        }

        let data = response
            .json::<DailyForecast>()
            .await
            .context("Failed to parse dashboard response")?;

        Ok(data)
    }

    /// Fetch one date and keep only its observed values.
    pub async fn fetch_observations(&self, date: NaiveDate) -> Result<Vec<Observation>> {
        let daily = self.fetch_daily(date).await?;
        Ok(observations_from(&daily, date))
    }
}

/// Turn the observed values of a daily curve into observations.
///
/// Points without a reading are skipped, as are points whose time label
/// cannot be parsed.
pub fn observations_from(daily: &DailyForecast, date: NaiveDate) -> Vec<Observation> {
    let mut observations = Vec::new();

    for (location, points) in &daily.occupancy {
        for point in points {
            let Some(occupancy) = point.occupancy else {
                continue;
            };
            match parse_time_label(&point.time).and_then(checked_slot) {
                Ok(slot) => observations.push(Observation {
                    location: location.clone(),
                    date,
                    slot,
                    occupancy,
                }),
                Err(e) => tracing::debug!("Skipping point of {} on {}: {}", location, date, e),
            }
        }
    }

    observations
}

impl SampleStore for DashboardClient {
    async fn fetch_days(&self, days: &[NaiveDate]) -> Result<Vec<Observation>> {
        let mut requests = JoinSet::new();
        for &day in days {
            let client = self.clone();
            requests.spawn(async move { client.fetch_observations(day).await });
        }

        let mut observations = Vec::new();
        while let Some(joined) = requests.join_next().await {
            let rows = joined.context("Dashboard fetch task failed")??;
            observations.extend(rows);
        }

        Ok(observations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::ForecastPoint;

    fn point(time: &str, occupancy: Option<f64>, prediction: Option<f64>) -> ForecastPoint {
        ForecastPoint {
            time: time.to_string(),
            occupancy,
            prediction,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 17).unwrap()
    }

    #[test]
    fn test_url_for_trims_trailing_slash() {
        let client =
            DashboardClient::new("http://dash.local/".to_string(), &NetworkConfig::default())
                .unwrap();
        assert_eq!(client.url_for(date()), "http://dash.local/api/bib/2024-06-17");
    }

    #[test]
    fn test_observations_from_keeps_observed_values_only() {
        let mut daily = DailyForecast::degraded("2024-06-17", 0..=0, &[]);
        daily.occupancy.insert(
            "A3".to_string(),
            vec![
                point("15:00", Some(55.0), None),
                point("15:10", None, Some(57.0)),
                point("15:20", Some(0.0), None),
            ],
        );

        let observations = observations_from(&daily, date());

        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].slot, 90);
        assert_eq!(observations[0].occupancy, 55.0);
        assert_eq!(observations[1].slot, 92);
        assert!(observations.iter().all(|o| o.date == date() && o.location == "A3"));
    }

    #[test]
    fn test_observations_from_skips_malformed_labels() {
        let mut daily = DailyForecast::degraded("2024-06-17", 0..=0, &[]);
        daily.occupancy.insert(
            "Jura".to_string(),
            vec![point("25:00", Some(40.0), None), point("08:00", Some(12.0), None)],
        );

        let observations = observations_from(&daily, date());

        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].slot, 48);
    }
}
