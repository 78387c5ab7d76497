//! trip-augmenter core
//!
//! Turns zone-level trip records (pickup zone, dropoff zone, expected miles)
//! into concrete coordinate pairs whose routed distance matches the record.

pub mod traits;
pub mod zone;
pub mod error;
pub mod stats;
pub mod cache;
pub mod rate_limit;
pub mod geocoder;
pub mod sampler;
pub mod router;
pub mod search;
pub mod engine;
pub mod batch;
pub mod osrm;
pub mod nominatim;
pub mod haversine;
pub mod config;

pub use engine::{AugmentationEngine, EngineConfig};
pub use error::{AugmentError, CacheError, ServiceError};
pub use search::{SamplingMethod, SearchOptions, SearchStatus, TripAugmentationResult};
pub use zone::{BoundingBox, Coordinate, ZoneDescriptor, ZoneId, ZoneTable};
