//! Simple data models for the weather aggregator.

use chrono::NaiveDate;
use serde::Serialize;

// ---

/// One validated CSV row, not yet persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewObservation {
    // ---
    pub date: NaiveDate,
    pub location: String,
    pub temperature: f64,
    pub humidity: f64,
    pub rainfall: f64,
}

/// A stored weather observation; `id` is assigned by storage.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct WeatherObservation {
    // ---
    pub id: i64,
    pub date: NaiveDate,
    pub location: String,
    pub temperature: f64,
    pub humidity: f64,
    pub rainfall: f64,
}

/// Per-location averages over a date range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationAverages {
    // ---
    pub location: String,
    pub observations: usize,
    pub avg_temperature: f64,
    pub avg_humidity: f64,
    pub avg_rainfall: f64,
}

#[cfg(test)]
impl NewObservation {
    // ---
    /// Attach an identifier the way a store would.
    pub fn with_id(self, id: i64) -> WeatherObservation {
        WeatherObservation {
            id,
            date: self.date,
            location: self.location,
            temperature: self.temperature,
            humidity: self.humidity,
            rainfall: self.rainfall,
        }
    }
}

impl LocationAverages {
    // ---
    /// Render one report block.
    pub fn render(&self) -> String {
        format!(
            "Location: {}\nAvg Temp: {}, Avg Humidity: {}, Avg Rainfall: {}\n",
            self.location,
            decimal(self.avg_temperature),
            decimal(self.avg_humidity),
            decimal(self.avg_rainfall)
        )
    }
}

/// Plain decimal notation, never exponent form; whole numbers keep `.0`.
fn decimal(value: f64) -> String {
    // ---
    let mut s = value.to_string();
    if value.is_finite() && !s.contains('.') {
        s.push_str(".0");
    }
    s
}
