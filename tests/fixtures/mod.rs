//! Test fixtures for trip-augmenter.
//!
//! Provides:
//! - Real NYC taxi zones with landmark centroids
//! - Deterministic fake geocoding/routing services that record their calls
//! - An engine builder wired to the fakes with throttling disabled

#![allow(dead_code)]

pub mod nyc_zones;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use trip_augmenter::cache::CachePaths;
use trip_augmenter::error::ServiceError;
use trip_augmenter::search::{KM_PER_MILE, SearchOptions};
use trip_augmenter::traits::{GeocodeMatch, GeocodingService, RouteLeg, RouteService};
use trip_augmenter::{AugmentationEngine, Coordinate, EngineConfig, ZoneTable};

pub use nyc_zones::*;

/// Geocoder answering from a fixed name -> coordinate table.
///
/// A query matches the first entry whose zone name starts the query string.
/// Names listed in `failing` always error.
pub struct ScriptedGeocoder {
    known: HashMap<String, Coordinate>,
    failing: Vec<String>,
    calls: AtomicUsize,
}

impl ScriptedGeocoder {
    pub fn new() -> Self {
        Self {
            known: HashMap::new(),
            failing: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Knows Times Square and JFK.
    pub fn nyc() -> Self {
        Self::new()
            .with("Times Sq/Theatre District", TIMES_SQUARE)
            .with("JFK Airport", JFK)
    }

    pub fn with(mut self, name: &str, coordinate: Coordinate) -> Self {
        self.known.insert(name.to_string(), coordinate);
        self
    }

    pub fn failing_for(mut self, name: &str) -> Self {
        self.failing.push(name.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GeocodingService for ScriptedGeocoder {
    fn geocode(&self, query: &str) -> Result<GeocodeMatch, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.iter().any(|name| query.starts_with(name.as_str())) {
            return Err(ServiceError::Unavailable(format!("scripted failure for {}", query)));
        }
        self.known
            .iter()
            .find(|(name, _)| query.starts_with(name.as_str()))
            .map(|(_, coordinate)| GeocodeMatch {
                coordinate: *coordinate,
                address: query.to_string(),
            })
            .ok_or_else(|| ServiceError::NoResults(query.to_string()))
    }
}

enum Script {
    /// Same distance for every pair.
    Constant(f64),
    /// One entry per call, in call order; `None` is a failure.
    Sequence(Vec<Option<f64>>),
    Failing,
}

/// Router returning scripted distances (in miles) and logging every call.
pub struct ScriptedRouter {
    script: Script,
    calls: Mutex<Vec<(Coordinate, Coordinate)>>,
}

impl ScriptedRouter {
    fn new(script: Script) -> Self {
        Self {
            script,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn constant_miles(miles: f64) -> Self {
        Self::new(Script::Constant(miles))
    }

    /// Distances for successive calls; calls past the end fail.
    pub fn sequence_miles(miles: Vec<Option<f64>>) -> Self {
        Self::new(Script::Sequence(miles))
    }

    pub fn failing() -> Self {
        Self::new(Script::Failing)
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn call_log(&self) -> Vec<(Coordinate, Coordinate)> {
        self.calls.lock().clone()
    }
}

impl RouteService for ScriptedRouter {
    fn route(&self, origin: Coordinate, destination: Coordinate) -> Result<RouteLeg, ServiceError> {
        let mut calls = self.calls.lock();
        let index = calls.len();
        calls.push((origin, destination));

        let miles = match &self.script {
            Script::Constant(miles) => Some(*miles),
            Script::Sequence(miles) => miles.get(index).copied().flatten(),
            Script::Failing => None,
        };

        miles
            .map(|miles| RouteLeg {
                distance_km: miles * KM_PER_MILE,
                duration_min: miles * 3.0,
            })
            .ok_or_else(|| ServiceError::Unavailable(format!("scripted failure on call {}", index)))
    }
}

/// Engine config with no throttling and caches under `cache_dir`.
pub fn test_config(search: SearchOptions) -> EngineConfig {
    EngineConfig {
        search,
        rate_limit_delay: Duration::ZERO,
        ..EngineConfig::default()
    }
}

pub fn test_config_in(search: SearchOptions, cache_dir: &std::path::Path) -> EngineConfig {
    EngineConfig {
        cache_paths: CachePaths::in_dir(cache_dir),
        ..test_config(search)
    }
}

pub type TestEngine<'a> = AugmentationEngine<ZoneTable, &'a ScriptedGeocoder, &'a ScriptedRouter>;

pub fn engine<'a>(
    geocoder: &'a ScriptedGeocoder,
    router: &'a ScriptedRouter,
    config: EngineConfig,
) -> TestEngine<'a> {
    AugmentationEngine::new(zone_table(), geocoder, router, config)
}
