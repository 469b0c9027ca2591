//! In-memory [`ObservationStore`] used by unit and router tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use super::ObservationStore;
use crate::{NewObservation, StoreError, WeatherObservation};

// ---

#[derive(Debug, Default)]
pub struct MemoryObservationStore {
    rows: Mutex<Vec<WeatherObservation>>,
    /// Writes succeed until this many rows are stored, then fail.
    fail_after: Option<usize>,
    fail_reads: bool,
}

impl MemoryObservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose `create` fails once `limit` rows have been written.
    pub fn failing_after(limit: usize) -> Self {
        Self {
            fail_after: Some(limit),
            ..Self::default()
        }
    }

    /// A store whose range query always fails.
    pub fn failing_reads() -> Self {
        Self {
            fail_reads: true,
            ..Self::default()
        }
    }

    pub fn rows(&self) -> Vec<WeatherObservation> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObservationStore for MemoryObservationStore {
    // ---
    async fn create(&self, observation: &NewObservation) -> Result<WeatherObservation, StoreError> {
        // ---
        let mut rows = self.rows.lock().unwrap();
        if self.fail_after.is_some_and(|limit| rows.len() >= limit) {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }

        let stored = observation.clone().with_id(rows.len() as i64 + 1);
        rows.push(stored.clone());
        Ok(stored)
    }

    async fn find_by_date_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<WeatherObservation>, StoreError> {
        // ---
        if self.fail_reads {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }

        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.date >= start && r.date <= end)
            .cloned()
            .collect())
    }
}
