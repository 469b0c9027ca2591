//! `POST /weather/uploadFile` – multipart CSV upload.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use tracing::{error, info};

use crate::ingest::{CsvColumns, Ingestor, LogObserver};
use crate::storage::SharedStore;
use crate::{Config, IngestError};

// ---

pub fn router() -> Router<(SharedStore, Config)> {
    // ---
    Router::new().route("/weather/uploadFile", post(handler))
}

async fn handler(
    State((store, _config)): State<(SharedStore, Config)>,
    mut multipart: Multipart,
) -> Response {
    // ---
    info!("POST /weather/uploadFile");

    let content = match read_file_field(&mut multipart).await {
        Ok(content) => content.unwrap_or_default(),
        Err(e) => {
            error!("Failed to read multipart upload: {}", e);
            return (e.status(), e.body_text()).into_response();
        }
    };

    let ingestor = Ingestor::new(store, Arc::new(LogObserver));
    match ingestor.ingest(&content, &CsvColumns::default()).await {
        Ok(stored) => (
            StatusCode::OK,
            format!("File uploaded successfully! Stored {} records.", stored),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

/// Bytes of the `file` form field, if the form has one.
async fn read_file_field(multipart: &mut Multipart) -> Result<Option<Bytes>, MultipartError> {
    // ---
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            return Ok(Some(field.bytes().await?));
        }
    }
    Ok(None)
}

fn error_response(e: &IngestError) -> Response {
    // ---
    match e {
        IngestError::EmptyInput => (StatusCode::BAD_REQUEST, "File is empty!").into_response(),
        e if e.is_client_error() => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        // Detail already logged by the ingestor
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Error processing the CSV file.",
        )
            .into_response(),
    }
}
