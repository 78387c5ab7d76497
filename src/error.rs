//! Error types.
//!
//! `ServiceError` covers failures of the external geocoding/routing
//! collaborators. `AugmentError` covers conditions that are fatal for a single
//! trip; non-fatal conditions (degraded geocodes, failed candidate routes) are
//! recorded on the result instead.

use thiserror::Error;

use crate::zone::ZoneId;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("no results for {0}")]
    NoResults(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Parse(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum AugmentError {
    #[error("expected distance must be a positive number of miles, got {0}")]
    InvalidExpectedDistance(f64),

    #[error("sample count must be at least 1, got {0}")]
    InvalidSampleCount(usize),

    #[error("tolerance must be a non-negative fraction, got {0}")]
    InvalidTolerance(f64),

    #[error("zone {0} is not in the zone lookup")]
    UnknownZone(ZoneId),

    #[error("zone {0} has no valid region to sample candidates from")]
    InvalidZoneBounds(ZoneId),

    #[error("zone {zone_id} could not be geocoded and has no fallback centroid: {reason}")]
    GeocodeUnavailable { zone_id: ZoneId, reason: String },
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
