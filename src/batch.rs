//! Batch augmentation over a table of trip records.
//!
//! The input table is any CSV with a header row; three configurable columns
//! supply the pickup zone, dropoff zone and trip distance in miles. Every
//! other column is carried through untouched and the augmentation fields are
//! appended column-wise.
//!
//! A trip's failure never aborts the batch. Each row gets a [`TripOutcome`],
//! and the engine's counters keep accumulating so a statistics report can
//! always be produced afterwards.

use std::fmt;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use csv::StringRecord;
use rayon::prelude::*;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::engine::AugmentationEngine;
use crate::error::AugmentError;
use crate::search::{SearchOptions, TripAugmentationResult};
use crate::stats::StatisticsSnapshot;
use crate::traits::{GeocodingService, RouteService, ZoneLookup};
use crate::zone::ZoneId;

const PROGRESS_EVERY: usize = 100;

/// Columns appended to the input table, in order.
pub const AUGMENTED_COLUMNS: &[&str] = &[
    "pickup_zone_name",
    "pickup_lat",
    "pickup_lon",
    "pickup_address",
    "dropoff_zone_name",
    "dropoff_lat",
    "dropoff_lon",
    "dropoff_address",
    "estimated_distance_km",
    "estimated_distance_miles",
    "estimated_duration_minutes",
    "expected_distance_miles",
    "is_distance_valid",
    "distance_error_pct",
    "num_trials",
    "sampling_method",
    "geocode_degraded",
    "augmentation_status",
    "augmentation_error",
];

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("input table has no column named {0:?}")]
    MissingColumn(String),
}

/// Names of the input columns the engine reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripColumns {
    pub pickup_zone: String,
    pub dropoff_zone: String,
    pub distance_miles: String,
}

impl Default for TripColumns {
    /// NYC TLC trip record naming.
    fn default() -> Self {
        Self {
            pickup_zone: "PULocationID".to_string(),
            dropoff_zone: "DOLocationID".to_string(),
            distance_miles: "trip_distance".to_string(),
        }
    }
}

/// The fields of one row the engine needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TripInput {
    pub pickup_zone: ZoneId,
    pub dropoff_zone: ZoneId,
    pub expected_distance_miles: f64,
}

#[derive(Debug, Clone)]
pub struct TripTable {
    headers: StringRecord,
    rows: Vec<StringRecord>,
    pickup_idx: usize,
    dropoff_idx: usize,
    distance_idx: usize,
}

impl TripTable {
    pub fn from_csv(path: &Path, columns: &TripColumns) -> Result<Self, BatchError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, columns)
    }

    pub fn from_reader<R: Read>(reader: R, columns: &TripColumns) -> Result<Self, BatchError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers = csv_reader.headers()?.clone();

        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| BatchError::MissingColumn(name.to_string()))
        };
        let pickup_idx = find(&columns.pickup_zone)?;
        let dropoff_idx = find(&columns.dropoff_zone)?;
        let distance_idx = find(&columns.distance_miles)?;

        let rows = csv_reader.records().collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            headers,
            rows,
            pickup_idx,
            dropoff_idx,
            distance_idx,
        })
    }

    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }

    pub fn rows(&self) -> &[StringRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Parse the engine inputs out of row `index`.
    pub fn trip(&self, index: usize) -> Result<TripInput, String> {
        let row = self
            .rows
            .get(index)
            .ok_or_else(|| format!("row {} out of range", index))?;
        let field = |idx: usize| row.get(idx).map(str::trim).unwrap_or_default();

        let pickup_zone = field(self.pickup_idx)
            .parse()
            .map_err(|_| format!("invalid pickup zone {:?}", field(self.pickup_idx)))?;
        let dropoff_zone = field(self.dropoff_idx)
            .parse()
            .map_err(|_| format!("invalid dropoff zone {:?}", field(self.dropoff_idx)))?;
        let expected_distance_miles = field(self.distance_idx)
            .parse()
            .map_err(|_| format!("invalid trip distance {:?}", field(self.distance_idx)))?;

        Ok(TripInput {
            pickup_zone,
            dropoff_zone,
            expected_distance_miles,
        })
    }
}

#[derive(Debug)]
pub enum TripOutcome {
    Augmented(Box<TripAugmentationResult>),
    Failed(AugmentError),
    /// The row's zone ids or distance did not parse.
    Malformed(String),
    /// The batch was stopped before this row was reached.
    NotProcessed,
}

impl TripOutcome {
    pub fn result(&self) -> Option<&TripAugmentationResult> {
        match self {
            TripOutcome::Augmented(result) => Some(result),
            _ => None,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            TripOutcome::Augmented(result) => result.status.as_str(),
            TripOutcome::Failed(_) => "failed",
            TripOutcome::Malformed(_) => "malformed",
            TripOutcome::NotProcessed => "not_processed",
        }
    }

    pub fn error_message(&self) -> Option<String> {
        match self {
            TripOutcome::Failed(err) => Some(err.to_string()),
            TripOutcome::Malformed(reason) => Some(reason.clone()),
            _ => None,
        }
    }
}

/// The input table with one outcome per row.
#[derive(Debug)]
pub struct AugmentedTable {
    pub headers: StringRecord,
    pub rows: Vec<StringRecord>,
    pub outcomes: Vec<TripOutcome>,
    pub stats: StatisticsSnapshot,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub augmented: usize,
    pub valid: usize,
    pub failed: usize,
    pub not_processed: usize,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} trips: {} augmented ({} within tolerance), {} failed, {} not processed",
            self.total, self.augmented, self.valid, self.failed, self.not_processed
        )
    }
}

fn opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl AugmentedTable {
    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            total: self.outcomes.len(),
            ..BatchSummary::default()
        };
        for outcome in &self.outcomes {
            match outcome {
                TripOutcome::Augmented(result) => {
                    summary.augmented += 1;
                    if result.is_distance_valid {
                        summary.valid += 1;
                    }
                }
                TripOutcome::Failed(_) | TripOutcome::Malformed(_) => summary.failed += 1,
                TripOutcome::NotProcessed => summary.not_processed += 1,
            }
        }
        summary
    }

    fn augmented_fields(outcome: &TripOutcome) -> Vec<String> {
        let mut fields = match outcome.result() {
            Some(r) => vec![
                r.pickup_location.zone_name.clone(),
                r.pickup_location.latitude.to_string(),
                r.pickup_location.longitude.to_string(),
                r.pickup_location.address.clone(),
                r.dropoff_location.zone_name.clone(),
                r.dropoff_location.latitude.to_string(),
                r.dropoff_location.longitude.to_string(),
                r.dropoff_location.address.clone(),
                opt(r.estimated_distance_km),
                opt(r.estimated_distance_miles),
                opt(r.estimated_duration_minutes),
                r.expected_distance_miles.to_string(),
                r.is_distance_valid.to_string(),
                opt(r.distance_error_pct),
                r.num_trials.to_string(),
                r.sampling_method.as_str().to_string(),
                r.geocode_degraded.to_string(),
            ],
            None => vec![String::new(); AUGMENTED_COLUMNS.len() - 2],
        };
        fields.push(outcome.status().to_string());
        fields.push(outcome.error_message().unwrap_or_default());
        fields
    }

    /// Original columns followed by [`AUGMENTED_COLUMNS`].
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), BatchError> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        let mut headers = self.headers.clone();
        for column in AUGMENTED_COLUMNS {
            headers.push_field(column);
        }
        csv_writer.write_record(&headers)?;

        for (row, outcome) in self.rows.iter().zip(&self.outcomes) {
            let mut record = row.clone();
            for field in Self::augmented_fields(outcome) {
                record.push_field(&field);
            }
            csv_writer.write_record(&record)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// One JSON object per row: original columns plus the nested result.
    pub fn to_json(&self) -> Result<Value, BatchError> {
        let mut records = Vec::with_capacity(self.rows.len());
        for (row, outcome) in self.rows.iter().zip(&self.outcomes) {
            let mut record = Map::new();
            for (header, value) in self.headers.iter().zip(row.iter()) {
                record.insert(header.to_string(), Value::String(value.to_string()));
            }
            if let Some(result) = outcome.result() {
                if let Value::Object(fields) = serde_json::to_value(result)? {
                    record.extend(fields);
                }
            }
            record.insert(
                "augmentation_status".to_string(),
                Value::String(outcome.status().to_string()),
            );
            if let Some(message) = outcome.error_message() {
                record.insert("augmentation_error".to_string(), Value::String(message));
            }
            records.push(Value::Object(record));
        }
        Ok(Value::Array(records))
    }

    pub fn write_json<W: Write>(&self, writer: W) -> Result<(), BatchError> {
        serde_json::to_writer_pretty(writer, &self.to_json()?)?;
        Ok(())
    }
}

fn augment_row<Z, G, R>(
    engine: &AugmentationEngine<Z, G, R>,
    table: &TripTable,
    index: usize,
    options: &SearchOptions,
) -> TripOutcome
where
    Z: ZoneLookup,
    G: GeocodingService,
    R: RouteService,
{
    let trip = match table.trip(index) {
        Ok(trip) => trip,
        Err(reason) => {
            tracing::error!("Skipping row {}: {}", index, reason);
            return TripOutcome::Malformed(reason);
        }
    };

    match engine.augment_with(
        trip.pickup_zone,
        trip.dropoff_zone,
        trip.expected_distance_miles,
        options,
    ) {
        Ok(result) => TripOutcome::Augmented(Box::new(result)),
        Err(err) => {
            tracing::error!("Skipping row {}: {}", index, err);
            TripOutcome::Failed(err)
        }
    }
}

/// Augment every row in order, sampling up to `max_samples` candidates per
/// zone. `stop` is checked between trips.
pub fn augment_table<Z, G, R>(
    engine: &AugmentationEngine<Z, G, R>,
    table: &TripTable,
    max_samples: usize,
    stop: &AtomicBool,
) -> AugmentedTable
where
    Z: ZoneLookup,
    G: GeocodingService,
    R: RouteService,
{
    let options = SearchOptions::with_max_samples(max_samples, engine.config().search.tolerance);
    let mut outcomes = Vec::with_capacity(table.len());

    for index in 0..table.len() {
        if stop.load(Ordering::Relaxed) {
            tracing::warn!("Stop requested; {} trips left unprocessed", table.len() - index);
            outcomes.extend((index..table.len()).map(|_| TripOutcome::NotProcessed));
            break;
        }
        outcomes.push(augment_row(engine, table, index, &options));

        if (index + 1) % PROGRESS_EVERY == 0 {
            tracing::info!("Processed {}/{} trips", index + 1, table.len());
        }
    }

    AugmentedTable {
        headers: table.headers.clone(),
        rows: table.rows.clone(),
        outcomes,
        stats: engine.snapshot(),
    }
}

/// Like [`augment_table`] but spreads trips across the rayon pool.
///
/// Trips are independent; the only shared state is the engine's caches,
/// counters and throttle, which are all internally synchronized. Candidate
/// seeds depend only on zone ids, so results match the sequential run.
pub fn augment_table_parallel<Z, G, R>(
    engine: &AugmentationEngine<Z, G, R>,
    table: &TripTable,
    max_samples: usize,
    stop: &AtomicBool,
) -> AugmentedTable
where
    Z: ZoneLookup + Sync,
    G: GeocodingService + Sync,
    R: RouteService + Sync,
{
    let options = SearchOptions::with_max_samples(max_samples, engine.config().search.tolerance);
    let done = AtomicUsize::new(0);

    let outcomes = (0..table.len())
        .into_par_iter()
        .map(|index| {
            if stop.load(Ordering::Relaxed) {
                return TripOutcome::NotProcessed;
            }
            let outcome = augment_row(engine, table, index, &options);
            let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
            if finished % PROGRESS_EVERY == 0 {
                tracing::info!("Processed {}/{} trips", finished, table.len());
            }
            outcome
        })
        .collect();

    AugmentedTable {
        headers: table.headers.clone(),
        rows: table.rows.clone(),
        outcomes,
        stats: engine.snapshot(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIPS: &str = "\
VendorID,PULocationID,DOLocationID,trip_distance
1,161,132,16.5
2,abc,132,3.0
";

    #[test]
    fn test_table_finds_columns() {
        let table = TripTable::from_reader(TRIPS.as_bytes(), &TripColumns::default()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.trip(0).unwrap(),
            TripInput {
                pickup_zone: 161,
                dropoff_zone: 132,
                expected_distance_miles: 16.5,
            }
        );
    }

    #[test]
    fn test_malformed_row_is_reported_not_fatal() {
        let table = TripTable::from_reader(TRIPS.as_bytes(), &TripColumns::default()).unwrap();
        let err = table.trip(1).unwrap_err();
        assert!(err.contains("pickup zone"));
    }

    #[test]
    fn test_missing_column() {
        let columns = TripColumns {
            distance_miles: "miles".to_string(),
            ..TripColumns::default()
        };
        let err = TripTable::from_reader(TRIPS.as_bytes(), &columns).unwrap_err();
        assert!(matches!(err, BatchError::MissingColumn(name) if name == "miles"));
    }

    #[test]
    fn test_not_processed_row_has_empty_fields() {
        let fields = AugmentedTable::augmented_fields(&TripOutcome::NotProcessed);
        assert_eq!(fields.len(), AUGMENTED_COLUMNS.len());
        assert_eq!(fields[fields.len() - 2], "not_processed");
        assert!(fields[..fields.len() - 2].iter().all(String::is_empty));
    }
}
