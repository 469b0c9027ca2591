//! Storage collaborator port.
//!
//! Ingestion and aggregation only see [`ObservationStore`]; `main.rs` picks
//! the Postgres adapter and tests use the in-memory one.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{NewObservation, StoreError, WeatherObservation};

#[cfg(test)]
mod memory;
mod postgres;

#[cfg(test)]
pub use memory::MemoryObservationStore;
pub use postgres::PgObservationStore;

/// Shared handle passed to components and routes.
pub type SharedStore = Arc<dyn ObservationStore>;

// ---

/// Persistence for weather observations.
#[async_trait]
pub trait ObservationStore: Send + Sync {
    /// Persist one observation and return it with its assigned id.
    async fn create(&self, observation: &NewObservation) -> Result<WeatherObservation, StoreError>;

    /// All observations with `start <= date <= end`, in insertion order.
    ///
    /// An inverted range yields an empty vector.
    async fn find_by_date_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<WeatherObservation>, StoreError>;
}
