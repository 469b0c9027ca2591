use axum::{extract::DefaultBodyLimit, Router};

use crate::storage::SharedStore;
use crate::Config;

mod average;
mod health;
mod upload;

// ---

pub fn router(store: SharedStore, config: Config) -> Router {
    // ---
    let body_limit = DefaultBodyLimit::max(config.max_upload_bytes());

    Router::new()
        .merge(upload::router())
        .merge(average::router())
        .merge(health::router())
        .layer(body_limit)
        .with_state((store, config))
}
