// src/routes/health.rs
//! Liveness endpoint for the weather aggregator.
//!
//! `GET /health` lets container orchestrators and CI check that the service
//! answers HTTP without touching storage. Follows the Explicit Module
//! Boundary Pattern (EMBP): the handler stays private and only a subrouter is
//! exported to the gateway (`mod.rs`).

use axum::{routing::get, Json, Router};
use serde::Serialize;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Handle `GET /health`.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Create a subrouter containing the `/health` route.
///
/// Generic over the application state so it merges with the gateway router
/// whatever its state type (here `(SharedStore, Config)`).
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", get(health))
}
