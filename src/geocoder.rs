//! Geocoder client: zone text to centroid, with per-zone caching.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheManager, GeocodeEntry};
use crate::error::AugmentError;
use crate::rate_limit::Throttle;
use crate::traits::GeocodingService;
use crate::zone::{Coordinate, ZoneDescriptor};

/// Where a resolved centroid came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CentroidSource {
    Cache,
    Geocoded,
    /// The zone has no geocodable text; its pre-known centroid was used as-is.
    Lookup,
    /// Geocoding failed and the pre-known centroid was substituted.
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCentroid {
    pub coordinate: Coordinate,
    pub address: String,
    pub source: CentroidSource,
}

impl ResolvedCentroid {
    /// True when positional accuracy was reduced by a geocoding failure.
    pub fn is_degraded(&self) -> bool {
        self.source == CentroidSource::Fallback
    }
}

pub struct GeocoderClient<G> {
    service: G,
    region: String,
    throttle: Arc<Throttle>,
}

impl<G: GeocodingService> GeocoderClient<G> {
    /// `region` is appended to every query to disambiguate zone names.
    pub fn new(service: G, region: impl Into<String>, throttle: Arc<Throttle>) -> Self {
        Self {
            service,
            region: region.into(),
            throttle,
        }
    }

    pub fn query_for(&self, zone: &ZoneDescriptor) -> String {
        if self.region.is_empty() {
            zone.label()
        } else {
            format!("{}, {}", zone.label(), self.region)
        }
    }

    /// Resolve the zone's centroid.
    ///
    /// Cache hit: no external call. Miss: one geocoding call, cached on
    /// success. On failure the zone's pre-known centroid is used if it has one;
    /// otherwise the zone is unusable.
    pub fn resolve(
        &self,
        zone: &ZoneDescriptor,
        manager: &CacheManager,
    ) -> Result<ResolvedCentroid, AugmentError> {
        let stats = manager.stats();

        if let Some(entry) = manager.store().geocode(zone.id) {
            stats.record_cache_hit();
            tracing::debug!("[CACHE HIT] geocode zone {}", zone.id);
            return Ok(ResolvedCentroid {
                coordinate: entry.coordinate(),
                address: entry.address,
                source: CentroidSource::Cache,
            });
        }
        stats.record_cache_miss();

        if !zone.is_geocodable() {
            return match zone.centroid {
                Some(centroid) => Ok(ResolvedCentroid {
                    coordinate: centroid,
                    address: zone.label(),
                    source: CentroidSource::Lookup,
                }),
                None => Err(AugmentError::GeocodeUnavailable {
                    zone_id: zone.id,
                    reason: "zone has neither a name and borough nor a centroid".to_string(),
                }),
            };
        }

        let query = self.query_for(zone);
        self.throttle.wait();
        stats.record_geocode_call();

        match self.service.geocode(&query) {
            Ok(found) => {
                manager.store().insert_geocode(
                    zone.id,
                    GeocodeEntry {
                        lat: found.coordinate.lat,
                        lon: found.coordinate.lon,
                        address: found.address.clone(),
                    },
                );
                Ok(ResolvedCentroid {
                    coordinate: found.coordinate,
                    address: found.address,
                    source: CentroidSource::Geocoded,
                })
            }
            Err(err) => {
                stats.record_geocode_failure();
                match zone.centroid {
                    Some(centroid) => {
                        tracing::warn!(
                            "Geocoding \"{}\" failed ({}); using lookup centroid for zone {}",
                            query,
                            err,
                            zone.id
                        );
                        Ok(ResolvedCentroid {
                            coordinate: centroid,
                            address: zone.label(),
                            source: CentroidSource::Fallback,
                        })
                    }
                    None => Err(AugmentError::GeocodeUnavailable {
                        zone_id: zone.id,
                        reason: err.to_string(),
                    }),
                }
            }
        }
    }
}
