//! Date-range aggregation: query → group by location → average → render.

use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::{error, info, warn};

use crate::storage::SharedStore;
use crate::{LocationAverages, QueryError, WeatherObservation};

// ---

/// Outcome of an average query.
///
/// `NoData` is not an error: the range was valid but matched nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum RangeReport {
    NoData,
    Locations(Vec<LocationAverages>),
}

impl RangeReport {
    /// One block per location, separated by a blank line.
    ///
    /// `None` for [`RangeReport::NoData`].
    pub fn render(&self) -> Option<String> {
        match self {
            Self::NoData => None,
            Self::Locations(groups) => Some(
                groups
                    .iter()
                    .map(LocationAverages::render)
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
        }
    }
}

/// Aggregation component, bound to a store.
pub struct Aggregator {
    store: SharedStore,
}

impl Aggregator {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Per-location averages over `[start, end]`, both ends inclusive.
    pub async fn averages_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RangeReport, QueryError> {
        // ---
        info!("Fetching weather data for date range: {} to {}", start, end);

        let records = self
            .store
            .find_by_date_between(start, end)
            .await
            .map_err(|source| {
                error!(
                    "Error fetching weather data for {} to {}: {}",
                    start, end, source
                );
                QueryError::Storage { start, end, source }
            })?;

        if records.is_empty() {
            warn!("No data found for the given date range: {} to {}", start, end);
            return Ok(RangeReport::NoData);
        }

        let groups = group_averages(&records);
        info!(
            "Report generated: {} records across {} locations",
            records.len(),
            groups.len()
        );
        Ok(RangeReport::Locations(groups))
    }
}

#[derive(Default)]
struct Totals {
    count: usize,
    temperature: f64,
    humidity: f64,
    rainfall: f64,
}

/// Average each location over its own records only.
///
/// Grouping is case-sensitive; output follows first-seen order.
pub fn group_averages(records: &[WeatherObservation]) -> Vec<LocationAverages> {
    // ---
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut totals: Vec<(&str, Totals)> = Vec::new();

    for r in records {
        let slot = *slots.entry(r.location.as_str()).or_insert_with(|| {
            totals.push((r.location.as_str(), Totals::default()));
            totals.len() - 1
        });
        let t = &mut totals[slot].1;
        t.count += 1;
        t.temperature += r.temperature;
        t.humidity += r.humidity;
        t.rainfall += r.rainfall;
    }

    // Every group has at least one member, so count > 0
    totals
        .into_iter()
        .map(|(location, t)| {
            let n = t.count as f64;
            LocationAverages {
                location: location.to_string(),
                observations: t.count,
                avg_temperature: t.temperature / n,
                avg_humidity: t.humidity / n,
                avg_rainfall: t.rainfall / n,
            }
        })
        .collect()
}
