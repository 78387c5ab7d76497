//! The augmentation engine.
//!
//! One engine owns the cache manager (caches + counters), the throttle shared
//! by both external clients, and the zone lookup. Everything that touches a
//! cache or counter goes through the engine's `CacheManager`, so there is no
//! process-wide mutable state and two engines never interfere.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheManager, CachePaths};
use crate::error::{AugmentError, CacheError};
use crate::geocoder::GeocoderClient;
use crate::rate_limit::Throttle;
use crate::router::{DEFAULT_COORDINATE_PRECISION, RouteEstimator};
use crate::sampler::CandidateSampler;
use crate::search::{BestPairSearch, SearchOptions, TripAugmentationResult, validate_expected_distance};
use crate::stats::StatisticsSnapshot;
use crate::traits::{GeocodingService, RouteService, ZoneLookup};
use crate::zone::{ZoneDescriptor, ZoneId};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub search: SearchOptions,
    /// Minimum spacing between external calls. Cache hits are never delayed.
    pub rate_limit_delay: Duration,
    /// Decimal places kept when building route cache keys.
    pub coordinate_precision: u32,
    /// Global seed mixed with zone ids for candidate sampling.
    pub seed: u64,
    /// Half side of the sampling square for zones without bounds.
    pub fallback_half_extent_deg: f64,
    /// Appended to zone names when geocoding.
    pub geocode_region: String,
    pub cache_paths: CachePaths,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            search: SearchOptions::default(),
            rate_limit_delay: Duration::from_secs(1),
            coordinate_precision: DEFAULT_COORDINATE_PRECISION,
            seed: 42,
            fallback_half_extent_deg: 0.005,
            geocode_region: "New York City, NY, USA".to_string(),
            cache_paths: CachePaths::default(),
        }
    }
}

pub struct AugmentationEngine<Z, G, R> {
    zones: Z,
    geocoder: GeocoderClient<G>,
    estimator: RouteEstimator<R>,
    manager: CacheManager,
    config: EngineConfig,
}

impl<Z, G, R> AugmentationEngine<Z, G, R>
where
    Z: ZoneLookup,
    G: GeocodingService,
    R: RouteService,
{
    pub fn new(zones: Z, geocoding: G, routing: R, config: EngineConfig) -> Self {
        let throttle = Arc::new(Throttle::new(config.rate_limit_delay));
        Self {
            zones,
            geocoder: GeocoderClient::new(geocoding, config.geocode_region.clone(), Arc::clone(&throttle)),
            estimator: RouteEstimator::new(routing, config.coordinate_precision, throttle),
            manager: CacheManager::new(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn manager(&self) -> &CacheManager {
        &self.manager
    }

    pub fn zones(&self) -> &Z {
        &self.zones
    }

    pub fn geocoder(&self) -> &GeocoderClient<G> {
        &self.geocoder
    }

    pub fn estimator(&self) -> &RouteEstimator<R> {
        &self.estimator
    }

    /// Sampler wired to this engine's geocoder and caches.
    pub fn sampler(&self) -> CandidateSampler<'_, G> {
        CandidateSampler::new(&self.geocoder, &self.manager, self.config.fallback_half_extent_deg)
    }

    /// Augment one trip with the configured search options.
    pub fn augment(
        &self,
        pickup_zone: ZoneId,
        dropoff_zone: ZoneId,
        expected_distance_miles: f64,
    ) -> Result<TripAugmentationResult, AugmentError> {
        self.augment_with(pickup_zone, dropoff_zone, expected_distance_miles, &self.config.search)
    }

    /// Augment one trip with explicit search options.
    pub fn augment_with(
        &self,
        pickup_zone: ZoneId,
        dropoff_zone: ZoneId,
        expected_distance_miles: f64,
        options: &SearchOptions,
    ) -> Result<TripAugmentationResult, AugmentError> {
        validate_expected_distance(expected_distance_miles)?;
        let pickup = self.zone(pickup_zone)?;
        let dropoff = self.zone(dropoff_zone)?;
        self.search(pickup, dropoff, expected_distance_miles, options)
    }

    /// Run the best-pair search for two already-resolved zones.
    pub fn search(
        &self,
        pickup: &ZoneDescriptor,
        dropoff: &ZoneDescriptor,
        expected_distance_miles: f64,
        options: &SearchOptions,
    ) -> Result<TripAugmentationResult, AugmentError> {
        BestPairSearch::new(self.sampler(), &self.estimator, &self.manager, self.config.seed).search(
            pickup,
            dropoff,
            expected_distance_miles,
            options,
        )
    }

    fn zone(&self, id: ZoneId) -> Result<&ZoneDescriptor, AugmentError> {
        self.zones.zone(id).ok_or(AugmentError::UnknownZone(id))
    }

    /// Warm the caches from the configured paths.
    pub fn load_caches(&self) -> Result<(), CacheError> {
        self.manager.load(&self.config.cache_paths)
    }

    /// Persist the caches to the configured paths.
    pub fn save_caches(&self) -> Result<(), CacheError> {
        self.manager.save(&self.config.cache_paths)
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        self.manager.snapshot()
    }
}
