//! CSV ingestion: parse → validate → persist.
//!
//! The whole upload is converted before the first write. A bad row therefore
//! stores nothing. Writes are one row at a time with no enclosing
//! transaction, so a storage failure part-way through leaves the rows
//! written before it in place and drops the rest.

use std::borrow::Cow;
use std::sync::Arc;

use chrono::NaiveDate;
use csv::{ByteRecord, ReaderBuilder};
use tracing::{debug, error, info, warn};

use crate::storage::SharedStore;
use crate::{IngestError, NewObservation, WeatherObservation};

// ---

/// Header names of the five required columns.
///
/// Matching is by name, so column order in the file does not matter. Both
/// these names and the file's header cells go through [`canonical_header`]
/// before comparison.
#[derive(Debug, Clone)]
pub struct CsvColumns {
    pub date: String,
    pub temperature: String,
    pub humidity: String,
    pub rainfall: String,
    pub location: String,
}

impl Default for CsvColumns {
    fn default() -> Self {
        Self {
            date: "Date".to_string(),
            temperature: "Temperature (°C)".to_string(),
            humidity: "Humidity (%)".to_string(),
            rainfall: "Rainfall (mm)".to_string(),
            location: "Location".to_string(),
        }
    }
}

/// Positions of the required columns within a parsed header row.
#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    date: usize,
    temperature: usize,
    humidity: usize,
    rainfall: usize,
    location: usize,
}

/// Receives the outcome of every row.
pub trait IngestObserver: Send + Sync {
    fn row_stored(&self, line: u64, observation: &WeatherObservation);
    fn row_rejected(&self, line: u64, error: &IngestError);
}

/// Default observer: forwards row outcomes to `tracing`.
#[derive(Debug, Default)]
pub struct LogObserver;

impl IngestObserver for LogObserver {
    fn row_stored(&self, line: u64, observation: &WeatherObservation) {
        debug!(
            line,
            id = observation.id,
            "Saved weather data for location: {} on date: {}",
            observation.location,
            observation.date
        );
    }

    fn row_rejected(&self, line: u64, error: &IngestError) {
        match error {
            IngestError::RecordParse { row, .. } => {
                warn!(line, row = %row, "Rejected row: {}", error)
            }
            _ => warn!(line, "Rejected row: {}", error),
        }
    }
}

/// Ingestion component, bound to a store and a row observer.
pub struct Ingestor {
    store: SharedStore,
    observer: Arc<dyn IngestObserver>,
}

impl Ingestor {
    pub fn new(store: SharedStore, observer: Arc<dyn IngestObserver>) -> Self {
        Self { store, observer }
    }

    /// Ingest an uploaded CSV file and return the number of rows stored.
    pub async fn ingest(&self, content: &[u8], columns: &CsvColumns) -> Result<usize, IngestError> {
        // ---
        info!("Starting csv file upload ({} bytes)", content.len());

        match self.run(content, columns).await {
            Ok(stored) => {
                info!("CSV file uploaded, {} rows saved", stored);
                Ok(stored)
            }
            Err(e) => {
                error!("Error processing the CSV file: {}", e);
                Err(e)
            }
        }
    }

    async fn run(&self, content: &[u8], columns: &CsvColumns) -> Result<usize, IngestError> {
        // ---
        if content.is_empty() {
            return Err(IngestError::EmptyInput);
        }

        let rows = match parse_rows(content, columns) {
            Ok(rows) => rows,
            Err(e) => {
                if let IngestError::RecordParse { line, .. }
                | IngestError::Parse {
                    line: Some(line), ..
                } = &e
                {
                    self.observer.row_rejected(*line, &e);
                }
                return Err(e);
            }
        };
        debug!("Parsed {} data rows, writing to storage", rows.len());

        for (line, observation) in &rows {
            match self.store.create(observation).await {
                Ok(saved) => self.observer.row_stored(*line, &saved),
                Err(source) => {
                    let err = IngestError::Persistence {
                        line: *line,
                        source,
                    };
                    self.observer.row_rejected(*line, &err);
                    return Err(err);
                }
            }
        }

        Ok(rows.len())
    }
}

// ---

/// Parse and validate every data row, paired with its line number.
///
/// The header row is consumed, never treated as data. A header-only file
/// yields an empty vector.
pub fn parse_rows(
    content: &[u8],
    columns: &CsvColumns,
) -> Result<Vec<(u64, NewObservation)>, IngestError> {
    // ---
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(content);

    let headers: Vec<String> = reader
        .byte_headers()?
        .iter()
        .map(|h| canonical_header(&decode_field(h)))
        .collect();
    let index = locate_columns(&headers, columns)?;

    let mut rows = Vec::new();
    for result in reader.byte_records() {
        let record = result?;
        let line = record.position().map_or(0, |p| p.line());
        rows.push((line, convert_row(&record, line, &index, columns)?));
    }

    Ok(rows)
}

fn locate_columns(headers: &[String], columns: &CsvColumns) -> Result<ColumnIndex, IngestError> {
    // ---
    let find = |name: &str| {
        let wanted = canonical_header(name);
        headers.iter().position(|h| *h == wanted).ok_or_else(|| {
            IngestError::parse(format!(
                "missing required column {:?} (found: {})",
                wanted,
                headers.join(", ")
            ))
        })
    };

    Ok(ColumnIndex {
        date: find(columns.date.as_str())?,
        temperature: find(columns.temperature.as_str())?,
        humidity: find(columns.humidity.as_str())?,
        rainfall: find(columns.rainfall.as_str())?,
        location: find(columns.location.as_str())?,
    })
}

fn convert_row(
    record: &ByteRecord,
    line: u64,
    index: &ColumnIndex,
    columns: &CsvColumns,
) -> Result<NewObservation, IngestError> {
    // ---
    let reject = |field: &str, value: &str, reason: String| IngestError::RecordParse {
        line,
        field: field.to_string(),
        value: value.to_string(),
        reason,
        row: record
            .iter()
            .map(|f| decode_field(f).into_owned())
            .collect::<Vec<_>>()
            .join(","),
    };
    let cell = |idx: usize| decode_field(record.get(idx).unwrap_or_default());

    let raw = cell(index.date);
    let date = parse_date(raw.trim()).map_err(|r| reject(columns.date.as_str(), &*raw, r))?;

    let raw = cell(index.temperature);
    let temperature =
        parse_number(raw.trim()).map_err(|r| reject(columns.temperature.as_str(), &*raw, r))?;

    let raw = cell(index.humidity);
    let humidity = parse_number(raw.trim()).map_err(|r| reject(columns.humidity.as_str(), &*raw, r))?;

    let raw = cell(index.rainfall);
    let rainfall = parse_number(raw.trim()).map_err(|r| reject(columns.rainfall.as_str(), &*raw, r))?;

    let raw = cell(index.location);
    let location = raw.trim();
    if location.is_empty() {
        return Err(reject(columns.location.as_str(), &*raw, "must not be empty".into()));
    }

    Ok(NewObservation {
        date,
        location: location.to_string(),
        temperature,
        humidity,
        rainfall,
    })
}

/// Strict `YYYY-MM-DD`.
fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    // ---
    let shaped = raw.len() == 10
        && raw.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !shaped {
        return Err("expected a date formatted as YYYY-MM-DD".to_string());
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| e.to_string())
}

/// Locale-independent decimal; rejects NaN and infinities.
fn parse_number(raw: &str) -> Result<f64, String> {
    // ---
    let value = raw.parse::<f64>().map_err(|e| e.to_string())?;
    if !value.is_finite() {
        return Err("must be a finite number".to_string());
    }
    Ok(value)
}

/// Decode a cell as UTF-8, falling back to Latin-1 for legacy exports.
fn decode_field(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect()),
    }
}

/// Canonical form of a header name.
///
/// Drops a byte-order mark and surrounding whitespace, and folds the usual
/// encodings of the degree sign onto `°`: the UTF-8-read-as-Latin-1 pair
/// `Â°` and the masculine ordinal `º`.
pub fn canonical_header(name: &str) -> String {
    name.trim_start_matches('\u{feff}')
        .trim()
        .replace("Â°", "°")
        .replace('º', "°")
}

#[cfg(test)]
mod tests {
    // ---
    use std::sync::Mutex;

    use super::*;
    use crate::storage::{MemoryObservationStore, ObservationStore};

    const HEADER: &str = "Date,Temperature (°C),Humidity (%),Rainfall (mm),Location\n";

    #[derive(Default)]
    struct RecordingObserver {
        stored: Mutex<Vec<u64>>,
        rejected: Mutex<Vec<u64>>,
    }

    impl IngestObserver for RecordingObserver {
        fn row_stored(&self, line: u64, _observation: &WeatherObservation) {
            self.stored.lock().unwrap().push(line);
        }

        fn row_rejected(&self, line: u64, _error: &IngestError) {
            self.rejected.lock().unwrap().push(line);
        }
    }

    fn setup(
        store: MemoryObservationStore,
    ) -> (Arc<MemoryObservationStore>, Arc<RecordingObserver>, Ingestor) {
        // ---
        let store = Arc::new(store);
        let observer = Arc::new(RecordingObserver::default());
        let ingestor = Ingestor::new(store.clone(), observer.clone());
        (store, observer, ingestor)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_valid_rows_are_stored() {
        // ---
        let (store, observer, ingestor) = setup(MemoryObservationStore::new());
        let csv = format!(
            "{HEADER}2024-01-01,10.0,50.0,0.0,CityA\n2024-01-02,20.25,60.5,2.0,CityB\n"
        );

        let stored = ingestor.ingest(csv.as_bytes(), &CsvColumns::default()).await.unwrap();

        assert_eq!(stored, 2);
        let rows = store.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, date(2024, 1, 1));
        assert_eq!(rows[0].location, "CityA");
        assert_eq!(rows[0].temperature, 10.0);
        assert_eq!(rows[1].temperature, 20.25);
        assert_eq!(rows[1].humidity, 60.5);
        assert_eq!(rows[1].rainfall, 2.0);
        assert_eq!(rows[1].location, "CityB");
        assert_eq!(*observer.stored.lock().unwrap(), vec![2, 3]);
        assert!(observer.rejected.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_parsed_values_round_trip_through_storage() {
        // ---
        let (store, _observer, ingestor) = setup(MemoryObservationStore::new());
        let csv = format!("{HEADER}2023-12-31,-3.125,99.9,12.75,Reykjavík\n");

        let parsed = parse_rows(csv.as_bytes(), &CsvColumns::default()).unwrap();
        ingestor.ingest(csv.as_bytes(), &CsvColumns::default()).await.unwrap();

        let reread = store.find_by_date_between(date(2023, 12, 31), date(2023, 12, 31));
        let reread = reread.await.unwrap();
        assert_eq!(reread.len(), 1);
        assert_eq!(reread[0], parsed[0].1.clone().with_id(reread[0].id));
    }

    #[tokio::test]
    async fn test_empty_file_is_rejected() {
        // ---
        let (store, _observer, ingestor) = setup(MemoryObservationStore::new());

        let err = ingestor.ingest(b"", &CsvColumns::default()).await.unwrap_err();

        assert!(matches!(err, IngestError::EmptyInput));
        assert!(store.rows().is_empty());
    }

    #[tokio::test]
    async fn test_header_only_file_stores_nothing() {
        // ---
        let (store, _observer, ingestor) = setup(MemoryObservationStore::new());

        let stored = ingestor.ingest(HEADER.as_bytes(), &CsvColumns::default()).await.unwrap();

        assert_eq!(stored, 0);
        assert!(store.rows().is_empty());
    }

    #[tokio::test]
    async fn test_bad_temperature_aborts_whole_upload() {
        // ---
        let (store, observer, ingestor) = setup(MemoryObservationStore::new());
        let csv = format!(
            "{HEADER}2024-01-01,10.0,50.0,0.0,CityA\n2024-01-02,warm,60.0,2.0,CityA\n2024-01-03,12.0,61.0,0.0,CityA\n"
        );

        let err = ingestor.ingest(csv.as_bytes(), &CsvColumns::default()).await.unwrap_err();

        match err {
            IngestError::RecordParse {
                line,
                field,
                value,
                row,
                ..
            } => {
                assert_eq!(line, 3);
                assert_eq!(field, "Temperature (°C)");
                assert_eq!(value, "warm");
                assert_eq!(row, "2024-01-02,warm,60.0,2.0,CityA");
            }
            other => panic!("expected RecordParse, got {other:?}"),
        }
        // Validation runs before any write, so not even line 2 is kept
        assert!(store.rows().is_empty());
        assert_eq!(*observer.rejected.lock().unwrap(), vec![3]);
    }

    #[tokio::test]
    async fn test_storage_failure_keeps_earlier_rows() {
        // ---
        let (store, observer, ingestor) = setup(MemoryObservationStore::failing_after(1));
        let csv = format!(
            "{HEADER}2024-01-01,10.0,50.0,0.0,CityA\n2024-01-02,11.0,51.0,0.0,CityA\n2024-01-03,12.0,52.0,0.0,CityA\n"
        );

        let err = ingestor.ingest(csv.as_bytes(), &CsvColumns::default()).await.unwrap_err();

        assert!(matches!(err, IngestError::Persistence { line: 3, .. }));
        assert_eq!(store.rows().len(), 1);
        assert_eq!(store.rows()[0].date, date(2024, 1, 1));
        assert_eq!(*observer.stored.lock().unwrap(), vec![2]);
        assert_eq!(*observer.rejected.lock().unwrap(), vec![3]);
    }

    #[test]
    fn test_missing_column_is_parse_error() {
        // ---
        let csv = "Date,Temperature (°C),Humidity (%),Location\n2024-01-01,1,2,CityA\n";

        let err = parse_rows(csv.as_bytes(), &CsvColumns::default()).unwrap_err();

        match err {
            IngestError::Parse { message, line } => {
                assert!(line.is_none());
                assert!(message.contains("Rainfall (mm)"));
            }
            other => panic!("expected Parse, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ragged_row_is_parse_error() {
        // ---
        let (store, observer, ingestor) = setup(MemoryObservationStore::new());
        let csv = format!("{HEADER}2024-01-01,10.0,50.0,0.0,CityA\n2024-01-02,1,2,A\n");

        let err = ingestor.ingest(csv.as_bytes(), &CsvColumns::default()).await.unwrap_err();

        assert!(matches!(err, IngestError::Parse { line: Some(3), .. }));
        assert!(store.rows().is_empty());
        assert_eq!(*observer.rejected.lock().unwrap(), vec![3]);
        assert!(observer.stored.lock().unwrap().is_empty());
    }

    #[test]
    fn test_columns_matched_by_name_in_any_order() {
        // ---
        let csv = "Location, Rainfall (mm) ,Date,Humidity (%),Temperature (°C)\n CityA , 1.5 ,2024-03-04, 40 , -2.5 \n";

        let rows = parse_rows(csv.as_bytes(), &CsvColumns::default()).unwrap();

        assert_eq!(rows.len(), 1);
        let (line, obs) = &rows[0];
        assert_eq!(*line, 2);
        assert_eq!(obs.location, "CityA");
        assert_eq!(obs.date, date(2024, 3, 4));
        assert_eq!(obs.temperature, -2.5);
        assert_eq!(obs.humidity, 40.0);
        assert_eq!(obs.rainfall, 1.5);
    }

    #[test]
    fn test_mojibake_degree_sign_matches() {
        // ---
        let csv = "Date,Temperature (Â°C),Humidity (%),Rainfall (mm),Location\n2024-01-01,5,50,0,CityA\n";

        let rows = parse_rows(csv.as_bytes(), &CsvColumns::default()).unwrap();

        assert_eq!(rows[0].1.temperature, 5.0);
    }

    #[test]
    fn test_latin1_header_matches() {
        // ---
        let mut csv = b"\xef\xbb\xbfDate,Temperature (\xb0C),Humidity (%),Rainfall (mm),Location\n".to_vec();
        csv.extend_from_slice(b"2024-01-01,5,50,0,M\xfcnchen\n");

        let rows = parse_rows(&csv, &CsvColumns::default()).unwrap();

        assert_eq!(rows[0].1.temperature, 5.0);
        assert_eq!(rows[0].1.location, "München");
    }

    #[test]
    fn test_expected_names_are_canonicalised_too() {
        // ---
        let columns = CsvColumns {
            temperature: "Temperature (Â°C)".to_string(),
            ..CsvColumns::default()
        };
        let csv = format!("{HEADER}2024-01-01,5,50,0,CityA\n");

        let rows = parse_rows(csv.as_bytes(), &columns).unwrap();

        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_custom_column_names() {
        // ---
        let columns = CsvColumns {
            date: "day".to_string(),
            temperature: "temp_c".to_string(),
            humidity: "rh".to_string(),
            rainfall: "rain_mm".to_string(),
            location: "station".to_string(),
        };
        let csv = "station,day,temp_c,rh,rain_mm\nOslo,2024-06-01,14,70,3.2\n";

        let rows = parse_rows(csv.as_bytes(), &columns).unwrap();

        assert_eq!(rows[0].1.location, "Oslo");
        assert_eq!(rows[0].1.rainfall, 3.2);
    }

    #[test]
    fn test_date_must_be_strict_iso() {
        // ---
        for bad in ["2024/01/01", "01-02-2024", "2024-1-01", "2024-02-30", "+024-01-01", ""] {
            let csv = format!("{HEADER}{bad},1,2,3,CityA\n");
            let err = parse_rows(csv.as_bytes(), &CsvColumns::default()).unwrap_err();
            assert!(
                matches!(&err, IngestError::RecordParse { field, .. } if field == "Date"),
                "{bad:?} should be rejected, got {err:?}"
            );
        }
    }

    #[test]
    fn test_non_finite_numbers_rejected() {
        // ---
        for bad in ["NaN", "inf", "1,5", "12°"] {
            let csv = format!("{HEADER}2024-01-01,1,2,\"{bad}\",CityA\n");
            let err = parse_rows(csv.as_bytes(), &CsvColumns::default()).unwrap_err();
            assert!(
                matches!(&err, IngestError::RecordParse { field, .. } if field == "Rainfall (mm)"),
                "{bad:?} should be rejected, got {err:?}"
            );
        }
    }

    #[test]
    fn test_empty_location_rejected() {
        // ---
        let csv = format!("{HEADER}2024-01-01,1,2,3,  \n");

        let err = parse_rows(csv.as_bytes(), &CsvColumns::default()).unwrap_err();

        assert!(matches!(&err, IngestError::RecordParse { field, .. } if field == "Location"));
    }

    #[test]
    fn test_canonical_header() {
        // ---
        assert_eq!(canonical_header("\u{feff} Date "), "Date");
        assert_eq!(canonical_header("Temperature (Â°C)"), "Temperature (°C)");
        assert_eq!(canonical_header("Temperature (ºC)"), "Temperature (°C)");
        assert_eq!(canonical_header("Humidity (%)"), "Humidity (%)");
    }
}
