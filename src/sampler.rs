//! Candidate sampler.
//!
//! # Determinism
//!
//! Sampled points come from a `SmallRng` seeded by the caller. The engine
//! derives that seed from its global seed and the zone id:
//!
//!   seed = global_seed XOR (zone_id * MIXING_CONSTANT)
//!
//! so a zone yields the same candidates no matter which trip asks for it or
//! in what order trips are processed. Identical candidates mean identical
//! route cache keys across trips and across runs.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::cache::CacheManager;
use crate::error::AugmentError;
use crate::geocoder::{GeocoderClient, ResolvedCentroid};
use crate::traits::GeocodingService;
use crate::zone::{BoundingBox, Coordinate, ZoneDescriptor, ZoneId};

/// 64-bit fractional golden-ratio constant for seed mixing.
const MIXING_CONSTANT: u64 = 0x9e37_79b9_7f4a_7c15;

/// Seed for the candidates of `zone_id` under a run-wide `global_seed`.
pub fn zone_seed(global_seed: u64, zone_id: ZoneId) -> u64 {
    global_seed ^ (zone_id as u64).wrapping_mul(MIXING_CONSTANT)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    Centroid,
    Sampled,
}

/// A concrete point hypothesized to represent a pickup or dropoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateLocation {
    pub zone_id: ZoneId,
    pub zone_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    pub source: CandidateSource,
}

impl CandidateLocation {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Ordered candidates for one zone. Index 0 is always the centroid.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateSet {
    pub candidates: Vec<CandidateLocation>,
    pub centroid: ResolvedCentroid,
}

/// `count` points drawn uniformly from `bounds`.
pub fn sample_points(bounds: &BoundingBox, count: usize, seed: u64) -> Vec<Coordinate> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            Coordinate::new(
                rng.gen_range(bounds.min_lat..=bounds.max_lat),
                rng.gen_range(bounds.min_lon..=bounds.max_lon),
            )
        })
        .collect()
}

pub struct CandidateSampler<'a, G> {
    geocoder: &'a GeocoderClient<G>,
    manager: &'a CacheManager,
    fallback_half_extent_deg: f64,
}

impl<'a, G: GeocodingService> CandidateSampler<'a, G> {
    /// `fallback_half_extent_deg` sizes the sampling square for zones that
    /// have no bounding box.
    pub fn new(
        geocoder: &'a GeocoderClient<G>,
        manager: &'a CacheManager,
        fallback_half_extent_deg: f64,
    ) -> Self {
        Self {
            geocoder,
            manager,
            fallback_half_extent_deg,
        }
    }

    /// Exactly `count` candidates: the resolved centroid, then `count - 1`
    /// seeded uniform draws from the zone's bounds.
    pub fn sample(
        &self,
        zone: &ZoneDescriptor,
        count: usize,
        seed: u64,
    ) -> Result<CandidateSet, AugmentError> {
        if count == 0 {
            return Err(AugmentError::InvalidSampleCount(count));
        }

        let centroid = self.geocoder.resolve(zone, self.manager)?;

        let mut candidates = Vec::with_capacity(count);
        candidates.push(CandidateLocation {
            zone_id: zone.id,
            zone_name: zone.name.clone(),
            latitude: centroid.coordinate.lat,
            longitude: centroid.coordinate.lon,
            address: centroid.address.clone(),
            source: CandidateSource::Centroid,
        });

        if count > 1 {
            let bounds = zone.bounds.unwrap_or_else(|| {
                BoundingBox::around(centroid.coordinate, self.fallback_half_extent_deg)
            });
            if !bounds.is_valid() {
                return Err(AugmentError::InvalidZoneBounds(zone.id));
            }
            let label = zone.label();
            candidates.extend(sample_points(&bounds, count - 1, seed).into_iter().map(|point| {
                CandidateLocation {
                    zone_id: zone.id,
                    zone_name: zone.name.clone(),
                    latitude: point.lat,
                    longitude: point.lon,
                    address: label.clone(),
                    source: CandidateSource::Sampled,
                }
            }));
        }

        Ok(CandidateSet {
            candidates,
            centroid,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::ServiceError;
    use crate::rate_limit::Throttle;
    use crate::traits::GeocodeMatch;

    struct FixedGeocoder(Coordinate);

    impl GeocodingService for FixedGeocoder {
        fn geocode(&self, query: &str) -> Result<GeocodeMatch, ServiceError> {
            Ok(GeocodeMatch {
                coordinate: self.0,
                address: query.to_string(),
            })
        }
    }

    fn midtown() -> ZoneDescriptor {
        ZoneDescriptor::new(161, "Midtown Center", "Manhattan")
            .with_bounds(BoundingBox::new(40.7514, 40.7620, -73.9880, -73.9726))
    }

    fn geocoder() -> GeocoderClient<FixedGeocoder> {
        GeocoderClient::new(
            FixedGeocoder(Coordinate::new(40.7580, -73.9776)),
            "",
            Arc::new(Throttle::disabled()),
        )
    }

    #[test]
    fn test_sample_points_deterministic() {
        let bounds = midtown().bounds.unwrap();
        assert_eq!(sample_points(&bounds, 5, 7), sample_points(&bounds, 5, 7));
        assert_ne!(sample_points(&bounds, 5, 7), sample_points(&bounds, 5, 8));
    }

    #[test]
    fn test_sample_points_inside_bounds() {
        let bounds = midtown().bounds.unwrap();
        for point in sample_points(&bounds, 200, 42) {
            assert!(bounds.contains(point), "{:?} escaped {:?}", point, bounds);
        }
    }

    #[test]
    fn test_centroid_first_then_sampled() {
        let geocoder = geocoder();
        let manager = CacheManager::new();
        let sampler = CandidateSampler::new(&geocoder, &manager, 0.005);

        let set = sampler.sample(&midtown(), 4, 1).unwrap();
        assert_eq!(set.candidates.len(), 4);
        assert_eq!(set.candidates[0].source, CandidateSource::Centroid);
        assert_eq!(set.candidates[0].coordinate(), Coordinate::new(40.7580, -73.9776));
        assert!(set.candidates[1..]
            .iter()
            .all(|c| c.source == CandidateSource::Sampled));
    }

    #[test]
    fn test_single_candidate_is_centroid_only() {
        let geocoder = geocoder();
        let manager = CacheManager::new();
        let sampler = CandidateSampler::new(&geocoder, &manager, 0.005);

        let set = sampler.sample(&midtown(), 1, 1).unwrap();
        assert_eq!(set.candidates.len(), 1);
        assert_eq!(set.candidates[0].source, CandidateSource::Centroid);
    }

    #[test]
    fn test_zero_count_rejected() {
        let geocoder = geocoder();
        let manager = CacheManager::new();
        let sampler = CandidateSampler::new(&geocoder, &manager, 0.005);

        let err = sampler.sample(&midtown(), 0, 1).unwrap_err();
        assert!(matches!(err, AugmentError::InvalidSampleCount(0)));
        assert_eq!(manager.snapshot().api_calls, 0);
    }

    #[test]
    fn test_zone_without_bounds_samples_around_centroid() {
        let geocoder = geocoder();
        let manager = CacheManager::new();
        let sampler = CandidateSampler::new(&geocoder, &manager, 0.01);
        let zone = ZoneDescriptor::new(161, "Midtown Center", "Manhattan");

        let set = sampler.sample(&zone, 10, 3).unwrap();
        let square = BoundingBox::around(Coordinate::new(40.7580, -73.9776), 0.01);
        assert!(set.candidates.iter().all(|c| square.contains(c.coordinate())));
    }

    #[test]
    fn test_non_finite_bounds_are_an_error() {
        let geocoder = geocoder();
        let manager = CacheManager::new();
        let sampler = CandidateSampler::new(&geocoder, &manager, 0.005);
        let zone = ZoneDescriptor::new(161, "Midtown Center", "Manhattan")
            .with_bounds(BoundingBox::new(40.75, f64::INFINITY, -73.99, -73.98));

        let err = sampler.sample(&zone, 3, 1).unwrap_err();
        assert!(matches!(err, AugmentError::InvalidZoneBounds(161)));

        // Centroid-only sampling never reads the bounds.
        assert_eq!(sampler.sample(&zone, 1, 1).unwrap().candidates.len(), 1);
    }

    #[test]
    fn test_zone_seed_spreads_ids() {
        assert_ne!(zone_seed(42, 1), zone_seed(42, 2));
        assert_eq!(zone_seed(42, 161), zone_seed(42, 161));
    }
}
