//! Route estimator client: cached, throttled distance/duration lookups.
//!
//! A pair whose rounded endpoints coincide is answered with a zero-length
//! route and no external call. It counts as a cache hit, so every lookup is
//! either a hit or a miss. A same-zone trip in simple mode therefore makes no
//! route call at all.

use std::sync::Arc;

use crate::cache::{CacheManager, RouteEntry, RouteKey};
use crate::rate_limit::Throttle;
use crate::traits::{RouteLeg, RouteService};
use crate::zone::Coordinate;

/// Default rounding applied to coordinates before building cache keys.
pub const DEFAULT_COORDINATE_PRECISION: u32 = 5;

/// Outcome of one route query. `leg` is `None` when the backend failed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteEstimate {
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub leg: Option<RouteLeg>,
}

impl RouteEstimate {
    pub fn success(&self) -> bool {
        self.leg.is_some()
    }

    pub fn distance_km(&self) -> Option<f64> {
        self.leg.map(|leg| leg.distance_km)
    }

    pub fn duration_min(&self) -> Option<f64> {
        self.leg.map(|leg| leg.duration_min)
    }
}

pub struct RouteEstimator<R> {
    service: R,
    precision: u32,
    throttle: Arc<Throttle>,
}

impl<R: RouteService> RouteEstimator<R> {
    pub fn new(service: R, precision: u32, throttle: Arc<Throttle>) -> Self {
        Self {
            service,
            precision,
            throttle,
        }
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// Estimate the route between two points.
    ///
    /// Coordinates are rounded before the cache lookup and the external call
    /// is made with the rounded values, so a cached entry always describes
    /// exactly the pair its key names. Failures are returned flagged and are
    /// not cached.
    pub fn estimate(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        manager: &CacheManager,
    ) -> RouteEstimate {
        let origin = origin.rounded(self.precision);
        let destination = destination.rounded(self.precision);

        let stats = manager.stats();

        if origin == destination {
            stats.record_cache_hit();
            return RouteEstimate {
                origin,
                destination,
                leg: Some(RouteLeg {
                    distance_km: 0.0,
                    duration_min: 0.0,
                }),
            };
        }

        let key = RouteKey::new(origin, destination, self.precision);

        if let Some(entry) = manager.store().route(&key) {
            stats.record_cache_hit();
            tracing::debug!("[CACHE HIT] route {}", key.as_str());
            return RouteEstimate {
                origin,
                destination,
                leg: Some(RouteLeg {
                    distance_km: entry.distance_km,
                    duration_min: entry.duration_min,
                }),
            };
        }
        stats.record_cache_miss();

        self.throttle.wait();
        stats.record_route_call();

        match self.service.route(origin, destination) {
            Ok(leg) => {
                manager.store().insert_route(
                    key,
                    RouteEntry {
                        distance_km: leg.distance_km,
                        duration_min: leg.duration_min,
                    },
                );
                RouteEstimate {
                    origin,
                    destination,
                    leg: Some(leg),
                }
            }
            Err(err) => {
                stats.record_route_failure();
                tracing::warn!("Route query {} failed: {}", key.as_str(), err);
                RouteEstimate {
                    origin,
                    destination,
                    leg: None,
                }
            }
        }
    }
}
