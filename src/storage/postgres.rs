//! PostgreSQL adapter for [`ObservationStore`].

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::debug;

use super::ObservationStore;
use crate::{NewObservation, StoreError, WeatherObservation};

// ---

/// `weather_data` table accessed through a connection pool.
///
/// Each call checks a connection out of the pool and returns it when done;
/// nothing is held across requests.
#[derive(Debug, Clone)]
pub struct PgObservationStore {
    pool: PgPool,
}

impl PgObservationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ObservationStore for PgObservationStore {
    // ---
    async fn create(&self, observation: &NewObservation) -> Result<WeatherObservation, StoreError> {
        // ---
        let stored = sqlx::query_as::<_, WeatherObservation>(
            r#"
            INSERT INTO weather_data (date, location, temperature, humidity, rainfall)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, date, location, temperature, humidity, rainfall
            "#,
        )
        .bind(observation.date)
        .bind(&observation.location)
        .bind(observation.temperature)
        .bind(observation.humidity)
        .bind(observation.rainfall)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn find_by_date_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<WeatherObservation>, StoreError> {
        // ---
        let rows = sqlx::query_as::<_, WeatherObservation>(
            r#"
            SELECT id, date, location, temperature, humidity, rainfall
            FROM weather_data
            WHERE date BETWEEN $1 AND $2
            ORDER BY id
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        debug!("Range {} to {} matched {} rows", start, end, rows.len());
        Ok(rows)
    }
}
