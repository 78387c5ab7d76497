//! Geocode and route caches plus their on-disk persistence.
//!
//! Both caches are flat JSON objects so they can be inspected and edited by
//! hand:
//!
//! ```json
//! // geocode cache
//! { "161": { "lat": 40.758, "lon": -73.9776, "address": "Midtown, Manhattan, ..." } }
//! // route cache
//! { "40.75890,-73.98510|40.64130,-73.77810": { "distance_km": 26.6, "duration_min": 38.2 } }
//! ```
//!
//! Entries are append-only within a run. Loading merges into what is already
//! in memory without overwriting it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::error::CacheError;
use crate::stats::{Statistics, StatisticsSnapshot};
use crate::zone::{Coordinate, ZoneId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeEntry {
    pub lat: f64,
    pub lon: f64,
    pub address: String,
}

impl GeocodeEntry {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lon)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub distance_km: f64,
    pub duration_min: f64,
}

/// Cache key for a directed coordinate pair, `"lat1,lon1|lat2,lon2"`.
///
/// Coordinates are rounded to `precision` decimals first so points that
/// differ only by floating-point noise share an entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteKey(String);

impl RouteKey {
    pub fn new(origin: Coordinate, destination: Coordinate, precision: u32) -> Self {
        let p = precision as usize;
        let origin = origin.rounded(precision);
        let destination = destination.rounded(precision);
        Self(format!(
            "{:.p$},{:.p$}|{:.p$},{:.p$}",
            origin.lat, origin.lon, destination.lat, destination.lon
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The two key-value caches. Each map has its own lock.
#[derive(Debug, Default)]
pub struct CacheStore {
    geocodes: Mutex<BTreeMap<ZoneId, GeocodeEntry>>,
    routes: Mutex<BTreeMap<RouteKey, RouteEntry>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn geocode(&self, zone_id: ZoneId) -> Option<GeocodeEntry> {
        self.geocodes.lock().get(&zone_id).cloned()
    }

    /// Insert unless the zone is already cached; the first entry in a run wins.
    pub fn insert_geocode(&self, zone_id: ZoneId, entry: GeocodeEntry) {
        self.geocodes.lock().entry(zone_id).or_insert(entry);
    }

    pub fn route(&self, key: &RouteKey) -> Option<RouteEntry> {
        self.routes.lock().get(key).copied()
    }

    pub fn insert_route(&self, key: RouteKey, entry: RouteEntry) {
        self.routes.lock().entry(key).or_insert(entry);
    }

    pub fn geocode_len(&self) -> usize {
        self.geocodes.lock().len()
    }

    pub fn route_len(&self) -> usize {
        self.routes.lock().len()
    }

    /// Merge the geocode dump at `path`; returns how many entries were new.
    pub fn load_geocodes(&self, path: &Path) -> Result<usize, CacheError> {
        let Some(on_disk) = read_json::<BTreeMap<ZoneId, GeocodeEntry>>(path)? else {
            return Ok(0);
        };
        Ok(merge(&mut self.geocodes.lock(), on_disk))
    }

    /// Merge the route dump at `path`; returns how many entries were new.
    pub fn load_routes(&self, path: &Path) -> Result<usize, CacheError> {
        let Some(on_disk) = read_json::<BTreeMap<RouteKey, RouteEntry>>(path)? else {
            return Ok(0);
        };
        Ok(merge(&mut self.routes.lock(), on_disk))
    }

    pub fn save_geocodes(&self, path: &Path) -> Result<(), CacheError> {
        let snapshot = self.geocodes.lock().clone();
        write_json(path, &snapshot)
    }

    pub fn save_routes(&self, path: &Path) -> Result<(), CacheError> {
        let snapshot = self.routes.lock().clone();
        write_json(path, &snapshot)
    }
}

fn merge<K: Ord, V>(in_memory: &mut BTreeMap<K, V>, on_disk: BTreeMap<K, V>) -> usize {
    let mut added = 0;
    for (key, value) in on_disk {
        if !in_memory.contains_key(&key) {
            in_memory.insert(key, value);
            added += 1;
        }
    }
    added
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, CacheError> {
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&data)?))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CacheError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_string_pretty(value)?;
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, data)?;
    fs::rename(tmp_path, path)?;
    Ok(())
}

/// Where the two cache dumps live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePaths {
    pub geocode: PathBuf,
    pub route: PathBuf,
}

impl CachePaths {
    pub fn new(geocode: impl Into<PathBuf>, route: impl Into<PathBuf>) -> Self {
        Self {
            geocode: geocode.into(),
            route: route.into(),
        }
    }

    /// `geocode_cache.json` and `route_cache.json` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(dir.join("geocode_cache.json"), dir.join("route_cache.json"))
    }
}

impl Default for CachePaths {
    fn default() -> Self {
        Self::new("geocode_cache.json", "route_cache.json")
    }
}

/// Owns the caches and counters shared by every external-facing call of one
/// engine.
#[derive(Debug, Default)]
pub struct CacheManager {
    store: CacheStore,
    stats: Statistics,
}

impl CacheManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    /// Warm both caches from disk. Missing files are a cold start, not an error.
    pub fn load(&self, paths: &CachePaths) -> Result<(), CacheError> {
        let geocodes = self.store.load_geocodes(&paths.geocode)?;
        let routes = self.store.load_routes(&paths.route)?;
        tracing::info!(
            "Loaded {} geocode and {} route cache entries from {} / {}",
            geocodes,
            routes,
            paths.geocode.display(),
            paths.route.display()
        );
        Ok(())
    }

    /// Full dump of both caches.
    pub fn save(&self, paths: &CachePaths) -> Result<(), CacheError> {
        self.store.save_geocodes(&paths.geocode)?;
        self.store.save_routes(&paths.route)?;
        tracing::info!(
            "Saved {} geocode and {} route cache entries",
            self.store.geocode_len(),
            self.store.route_len()
        );
        Ok(())
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        self.stats.snapshot()
    }
}
