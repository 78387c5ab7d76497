//! Engine-wide counters.
//!
//! Counters are atomics so the cache manager can be shared across rayon
//! workers without a lock. They only ever increase for the lifetime of one
//! engine.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct Statistics {
    geocode_api_calls: AtomicU64,
    route_api_calls: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    geocode_failures: AtomicU64,
    route_failures: AtomicU64,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_geocode_call(&self) {
        self.geocode_api_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_route_call(&self) {
        self.route_api_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_geocode_failure(&self) {
        self.geocode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_route_failure(&self) {
        self.route_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters. Side-effect free.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        let geocode_api_calls = self.geocode_api_calls.load(Ordering::Relaxed);
        let route_api_calls = self.route_api_calls.load(Ordering::Relaxed);
        StatisticsSnapshot {
            api_calls: geocode_api_calls + route_api_calls,
            geocode_api_calls,
            route_api_calls,
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            geocode_failures: self.geocode_failures.load(Ordering::Relaxed),
            route_failures: self.route_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatisticsSnapshot {
    /// Total external calls issued (geocode + route).
    pub api_calls: u64,
    pub geocode_api_calls: u64,
    pub route_api_calls: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub geocode_failures: u64,
    pub route_failures: u64,
}

impl StatisticsSnapshot {
    /// Fraction of cache lookups that hit, or `None` before the first lookup.
    pub fn cache_hit_rate(&self) -> Option<f64> {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            None
        } else {
            Some(self.cache_hits as f64 / lookups as f64)
        }
    }
}

impl fmt::Display for StatisticsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "API calls:        {}", self.api_calls)?;
        writeln!(f, "  geocode:        {}", self.geocode_api_calls)?;
        writeln!(f, "  route:          {}", self.route_api_calls)?;
        writeln!(f, "Cache hits:       {}", self.cache_hits)?;
        writeln!(f, "Cache misses:     {}", self.cache_misses)?;
        match self.cache_hit_rate() {
            Some(rate) => writeln!(f, "Cache hit rate:   {:.1}%", rate * 100.0)?,
            None => writeln!(f, "Cache hit rate:   n/a")?,
        }
        writeln!(f, "Geocode failures: {}", self.geocode_failures)?;
        write!(f, "Route failures:   {}", self.route_failures)
    }
}
