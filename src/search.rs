//! Best-pair search.
//!
//! Candidates for both zones are combined in row-major order (every
//! destination candidate for origin 0, then for origin 1, ...). Because index 0
//! of each candidate list is the zone centroid, the first trial is always
//! centroid x centroid. The search keeps the lowest-error pair seen so far and
//! stops at the first pair whose relative error is within tolerance.

use serde::{Deserialize, Serialize};

use crate::cache::CacheManager;
use crate::error::AugmentError;
use crate::router::RouteEstimator;
use crate::sampler::{CandidateLocation, CandidateSampler, zone_seed};
use crate::traits::{GeocodingService, RouteLeg, RouteService};
use crate::zone::ZoneDescriptor;

pub const KM_PER_MILE: f64 = 1.609_344;

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub num_origin_samples: usize,
    pub num_dest_samples: usize,
    /// Maximum accepted relative error, as a fraction (0.30 = 30%).
    pub tolerance: f64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            num_origin_samples: 3,
            num_dest_samples: 3,
            tolerance: 0.30,
        }
    }
}

impl SearchOptions {
    /// Centroid-only search: at most one route query.
    pub fn simple(tolerance: f64) -> Self {
        Self {
            num_origin_samples: 1,
            num_dest_samples: 1,
            tolerance,
        }
    }

    /// Same sample count on both sides.
    pub fn with_max_samples(max_samples: usize, tolerance: f64) -> Self {
        Self {
            num_origin_samples: max_samples,
            num_dest_samples: max_samples,
            tolerance,
        }
    }

    pub fn sampling_method(&self) -> SamplingMethod {
        if self.num_origin_samples <= 1 && self.num_dest_samples <= 1 {
            SamplingMethod::Simple
        } else {
            SamplingMethod::Smart
        }
    }

    pub fn max_trials(&self) -> usize {
        self.num_origin_samples * self.num_dest_samples
    }

    pub fn validate(&self) -> Result<(), AugmentError> {
        if self.num_origin_samples == 0 {
            return Err(AugmentError::InvalidSampleCount(self.num_origin_samples));
        }
        if self.num_dest_samples == 0 {
            return Err(AugmentError::InvalidSampleCount(self.num_dest_samples));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(AugmentError::InvalidTolerance(self.tolerance));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMethod {
    Smart,
    Simple,
}

impl SamplingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SamplingMethod::Smart => "smart",
            SamplingMethod::Simple => "simple",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    /// Stopped early on a pair within tolerance.
    WithinTolerance,
    /// No pair met tolerance; the lowest-error pair is returned.
    BestEffort,
    /// Every attempted pair failed at the routing step.
    AllRoutesUnavailable,
}

impl SearchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchStatus::WithinTolerance => "within_tolerance",
            SearchStatus::BestEffort => "best_effort",
            SearchStatus::AllRoutesUnavailable => "all_routes_unavailable",
        }
    }
}

/// One evaluated (origin, destination) candidate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub origin_index: usize,
    pub dest_index: usize,
    /// `None` when the route query failed.
    pub error_pct: Option<f64>,
    /// Lowest error observed up to and including this trial.
    pub best_error_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripAugmentationResult {
    pub pickup_location: CandidateLocation,
    pub dropoff_location: CandidateLocation,
    pub estimated_distance_km: Option<f64>,
    pub estimated_distance_miles: Option<f64>,
    pub estimated_duration_minutes: Option<f64>,
    pub expected_distance_miles: f64,
    pub distance_error_pct: Option<f64>,
    pub is_distance_valid: bool,
    pub num_trials: usize,
    pub sampling_method: SamplingMethod,
    pub status: SearchStatus,
    /// A zone centroid came from the lookup table after geocoding failed.
    pub geocode_degraded: bool,
    #[serde(skip)]
    pub trials: Vec<TrialRecord>,
}

/// Row-major enumeration of candidate index pairs.
#[derive(Debug, Clone)]
pub struct TrialPairs {
    origins: usize,
    dests: usize,
    next: usize,
}

impl TrialPairs {
    pub fn new(origins: usize, dests: usize) -> Self {
        Self {
            origins,
            dests,
            next: 0,
        }
    }
}

impl Iterator for TrialPairs {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.dests == 0 || self.next >= self.origins * self.dests {
            return None;
        }
        let pair = (self.next / self.dests, self.next % self.dests);
        self.next += 1;
        Some(pair)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.origins * self.dests).saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TrialPairs {}

/// `|estimated - expected| / expected`, as a fraction.
pub fn relative_error(estimated_miles: f64, expected_miles: f64) -> f64 {
    (estimated_miles - expected_miles).abs() / expected_miles
}

pub fn validate_expected_distance(expected_distance_miles: f64) -> Result<(), AugmentError> {
    if expected_distance_miles.is_finite() && expected_distance_miles > 0.0 {
        Ok(())
    } else {
        Err(AugmentError::InvalidExpectedDistance(expected_distance_miles))
    }
}

struct Best {
    origin_index: usize,
    dest_index: usize,
    leg: RouteLeg,
    error: f64,
}

pub struct BestPairSearch<'a, G, R> {
    sampler: CandidateSampler<'a, G>,
    estimator: &'a RouteEstimator<R>,
    manager: &'a CacheManager,
    seed: u64,
}

impl<'a, G: GeocodingService, R: RouteService> BestPairSearch<'a, G, R> {
    pub fn new(
        sampler: CandidateSampler<'a, G>,
        estimator: &'a RouteEstimator<R>,
        manager: &'a CacheManager,
        seed: u64,
    ) -> Self {
        Self {
            sampler,
            estimator,
            manager,
            seed,
        }
    }

    pub fn search(
        &self,
        pickup_zone: &ZoneDescriptor,
        dropoff_zone: &ZoneDescriptor,
        expected_distance_miles: f64,
        options: &SearchOptions,
    ) -> Result<TripAugmentationResult, AugmentError> {
        validate_expected_distance(expected_distance_miles)?;
        options.validate()?;

        let origins = self.sampler.sample(
            pickup_zone,
            options.num_origin_samples,
            zone_seed(self.seed, pickup_zone.id),
        )?;
        let dests = self.sampler.sample(
            dropoff_zone,
            options.num_dest_samples,
            zone_seed(self.seed, dropoff_zone.id),
        )?;
        let geocode_degraded = origins.centroid.is_degraded() || dests.centroid.is_degraded();

        let mut best: Option<Best> = None;
        let mut trials = Vec::with_capacity(options.max_trials());
        let mut status = SearchStatus::AllRoutesUnavailable;

        for (origin_index, dest_index) in TrialPairs::new(origins.candidates.len(), dests.candidates.len()) {
            let origin = &origins.candidates[origin_index];
            let dest = &dests.candidates[dest_index];
            let estimate = self
                .estimator
                .estimate(origin.coordinate(), dest.coordinate(), self.manager);

            let error = estimate.leg.map(|leg| {
                relative_error(leg.distance_km / KM_PER_MILE, expected_distance_miles)
            });

            if let (Some(leg), Some(error)) = (estimate.leg, error) {
                if best.as_ref().is_none_or(|b| error < b.error) {
                    best = Some(Best {
                        origin_index,
                        dest_index,
                        leg,
                        error,
                    });
                }
            }

            trials.push(TrialRecord {
                origin_index,
                dest_index,
                error_pct: error.map(|e| e * 100.0),
                best_error_pct: best.as_ref().map(|b| b.error * 100.0),
            });

            tracing::debug!(
                "Trial {} ({}, {}) zones {} -> {}: error {:?}",
                trials.len(),
                origin_index,
                dest_index,
                pickup_zone.id,
                dropoff_zone.id,
                error
            );

            if best.is_some() {
                status = SearchStatus::BestEffort;
            }
            if error.is_some_and(|e| e <= options.tolerance) {
                status = SearchStatus::WithinTolerance;
                break;
            }
        }

        let num_trials = trials.len();
        let result = match best {
            Some(best) => {
                let miles = best.leg.distance_km / KM_PER_MILE;
                TripAugmentationResult {
                    pickup_location: origins.candidates[best.origin_index].clone(),
                    dropoff_location: dests.candidates[best.dest_index].clone(),
                    estimated_distance_km: Some(best.leg.distance_km),
                    estimated_distance_miles: Some(miles),
                    estimated_duration_minutes: Some(best.leg.duration_min),
                    expected_distance_miles,
                    distance_error_pct: Some(best.error * 100.0),
                    is_distance_valid: best.error <= options.tolerance,
                    num_trials,
                    sampling_method: options.sampling_method(),
                    status,
                    geocode_degraded,
                    trials,
                }
            }
            None => {
                tracing::warn!(
                    "All {} route queries failed for zones {} -> {}",
                    num_trials,
                    pickup_zone.id,
                    dropoff_zone.id
                );
                TripAugmentationResult {
                    pickup_location: origins.candidates[0].clone(),
                    dropoff_location: dests.candidates[0].clone(),
                    estimated_distance_km: None,
                    estimated_distance_miles: None,
                    estimated_duration_minutes: None,
                    expected_distance_miles,
                    distance_error_pct: None,
                    is_distance_valid: false,
                    num_trials,
                    sampling_method: options.sampling_method(),
                    status,
                    geocode_degraded,
                    trials,
                }
            }
        };

        tracing::info!(
            "Zones {} -> {}: {} after {} trial(s), error {:?}%",
            pickup_zone.id,
            dropoff_zone.id,
            result.status.as_str(),
            result.num_trials,
            result.distance_error_pct
        );

        Ok(result)
    }
}
