//! `GET /weather/average` – per-location averages over a date range.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{error, info};

use crate::aggregate::{Aggregator, RangeReport};
use crate::storage::SharedStore;
use crate::Config;

// ---

pub fn router() -> Router<(SharedStore, Config)> {
    // ---
    Router::new().route("/weather/average", get(handler))
}

/// Query parameters, e.g. `?startDate=2024-01-01&endDate=2024-01-31`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AverageQuery {
    start_date: NaiveDate,
    end_date: NaiveDate,
    #[serde(default)]
    format: ReportFormat,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ReportFormat {
    #[default]
    Text,
    Json,
}

async fn handler(
    Query(params): Query<AverageQuery>,
    State((store, _config)): State<(SharedStore, Config)>,
) -> Response {
    // ---
    info!("GET /weather/average {:?}", params);

    let aggregator = Aggregator::new(store);
    let report = match aggregator
        .averages_by_date_range(params.start_date, params.end_date)
        .await
    {
        Ok(report) => report,
        Err(e) => {
            error!("Average query failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Error fetching weather data.")
                .into_response();
        }
    };

    match (report, params.format) {
        (RangeReport::NoData, _) => (StatusCode::NO_CONTENT, "No data found!").into_response(),
        (RangeReport::Locations(groups), ReportFormat::Json) => {
            (StatusCode::OK, Json(groups)).into_response()
        }
        (report @ RangeReport::Locations(_), ReportFormat::Text) => {
            (StatusCode::OK, report.render().unwrap_or_default()).into_response()
        }
    }
}
