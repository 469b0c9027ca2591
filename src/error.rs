//! Error types for ingestion, aggregation, and the storage collaborator.
//!
//! Every failure is terminal for the current request; nothing here retries.
//! The HTTP layer maps these onto status codes in `routes`.

use chrono::NaiveDate;
use thiserror::Error;

// ---

/// Failure reported by an [`ObservationStore`](crate::storage::ObservationStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Errors raised while ingesting an uploaded CSV file.
#[derive(Debug, Error)]
pub enum IngestError {
    /// No file was provided, or it had zero bytes.
    #[error("File is empty")]
    EmptyInput,

    /// Structural CSV failure or a required column missing from the header.
    ///
    /// `line` is set when the failure belongs to one data row, such as a
    /// row with the wrong number of fields.
    #[error("Malformed CSV: {message}")]
    Parse { message: String, line: Option<u64> },

    /// A data row had a field that could not be converted.
    #[error("Invalid {field} value {value:?} on line {line}: {reason}")]
    RecordParse {
        line: u64,
        field: String,
        value: String,
        reason: String,
        /// Raw row content, for the log.
        row: String,
    },

    /// Storage rejected a converted row.
    #[error("Failed to store row on line {line}: {source}")]
    Persistence {
        line: u64,
        #[source]
        source: StoreError,
    },
}

impl IngestError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            line: None,
        }
    }

    /// True for errors caused by the uploaded content rather than the service.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Persistence { .. })
    }
}

impl From<csv::Error> for IngestError {
    fn from(e: csv::Error) -> Self {
        Self::Parse {
            line: e.position().map(|p| p.line()),
            message: e.to_string(),
        }
    }
}

/// Errors raised while building the average report.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Failed to fetch weather data for {start} to {end}: {source}")]
    Storage {
        start: NaiveDate,
        end: NaiveDate,
        #[source]
        source: StoreError,
    },
}
