use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::slot::checked_slot;
use crate::traits::SampleStore;

/// A single occupancy reading for one location, day and slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub location: String,
    pub date: NaiveDate,
    pub slot: u32,
    pub occupancy: f64,
}

/// Raw row of the `BibData` table. Every column is nullable there.
#[derive(Debug, Clone, FromRow)]
pub struct ObservationRow {
    pub name: Option<String>,
    pub chunk: Option<i32>,
    pub occupancy: Option<i32>,
    pub year: Option<i32>,
    pub month: Option<i32>,
    pub day: Option<i32>,
}

impl ObservationRow {
    /// Convert into an observation, dropping rows that cannot be attributed
    /// to a location, day and slot of the day. A missing occupancy counts as
    /// no signal.
    pub fn into_observation(self) -> Option<Observation> {
        let location = self.name.filter(|n| !n.is_empty())?;
        let slot = checked_slot(u32::try_from(self.chunk?).ok()?).ok()?;
        let date = NaiveDate::from_ymd_opt(
            self.year?,
            u32::try_from(self.month?).ok()?,
            u32::try_from(self.day?).ok()?,
        )?;

        Some(Observation {
            location,
            date,
            slot,
            occupancy: self.occupancy.unwrap_or(0) as f64,
        })
    }
}

#[derive(Clone, Debug)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL database")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run database migrations")?;

        Ok(Self { pool })
    }

    /// Fetch all observations for the given calendar days in one round trip.
    pub async fn get_observations_for_days(&self, days: &[NaiveDate]) -> Result<Vec<Observation>> {
        if days.is_empty() {
            return Ok(Vec::new());
        }

        let years: Vec<i32> = days.iter().map(|d| d.year()).collect();
        let months: Vec<i32> = days.iter().map(|d| d.month() as i32).collect();
        let day_numbers: Vec<i32> = days.iter().map(|d| d.day() as i32).collect();

        let rows = sqlx::query_as::<_, ObservationRow>(
            r#"
            SELECT b.name, b.chunk, b.occupancy, b.year, b.month, b.day
            FROM "BibData" b
            JOIN UNNEST($1::INTEGER[], $2::INTEGER[], $3::INTEGER[]) AS wanted(year, month, day)
              ON b.year = wanted.year AND b.month = wanted.month AND b.day = wanted.day
            "#,
        )
        .bind(years)
        .bind(months)
        .bind(day_numbers)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch observations for history days")?;

        let total = rows.len();
        let observations: Vec<Observation> = rows
            .into_iter()
            .filter_map(ObservationRow::into_observation)
            .collect();

        if observations.len() < total {
            tracing::debug!(
                "Skipped {} incomplete observation rows",
                total - observations.len()
            );
        }

        Ok(observations)
    }

    /// Get all observations for a single calendar day.
    pub async fn get_observations_for_date(&self, date: NaiveDate) -> Result<Vec<Observation>> {
        self.get_observations_for_days(&[date]).await
    }

    /// Insert one observation, stamped with the given issue time.
    pub async fn insert_observation(
        &self,
        observation: &Observation,
        issued_at: DateTime<Utc>,
    ) -> Result<i32> {
        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO "BibData" (occupancy, name, year, month, day, chunk, iat, ttl)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(observation.occupancy.round() as i32)
        .bind(&observation.location)
        .bind(observation.date.year())
        .bind(observation.date.month() as i32)
        .bind(observation.date.day() as i32)
        .bind(observation.slot as i32)
        .bind(issued_at.naive_utc())
        .bind((issued_at + chrono::Duration::days(365)).naive_utc())
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert observation")?;

        Ok(id)
    }

    /// Batch insert multiple observations.
    pub async fn batch_insert(&self, observations: &[Observation], issued_at: DateTime<Utc>) -> Result<()> {
        for observation in observations {
            self.insert_observation(observation, issued_at).await?;
        }
        Ok(())
    }
}

impl SampleStore for Database {
    async fn fetch_days(&self, days: &[NaiveDate]) -> Result<Vec<Observation>> {
        self.get_observations_for_days(days).await
    }
}
