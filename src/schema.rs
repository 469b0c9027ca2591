//! Database schema management for `weather-aggregator`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `weather_data` table holding one row per ingested CSV line,
/// plus a `date` index backing the range query used by the average report.
/// Safe to call on every startup; no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS weather_data (
            id          BIGSERIAL        PRIMARY KEY,
            date        DATE             NOT NULL,
            location    TEXT             NOT NULL,
            temperature DOUBLE PRECISION NOT NULL,
            humidity    DOUBLE PRECISION NOT NULL,
            rainfall    DOUBLE PRECISION NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Range queries filter on date only
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_weather_data_date
            ON weather_data (date);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
