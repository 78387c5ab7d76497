//! Haversine route provider (offline stand-in when OSRM is unavailable).
//!
//! Uses great-circle distance scaled by a circuity factor to approximate road
//! distance. Far less accurate than OSRM, but deterministic and always
//! available.

use crate::error::ServiceError;
use crate::traits::{RouteLeg, RouteService};
use crate::zone::Coordinate;

/// Average urban driving speed assumption for time estimation.
const DEFAULT_SPEED_KMH: f64 = 25.0;

/// Typical ratio of street-network distance to straight-line distance in a
/// grid city.
const DEFAULT_CIRCUITY: f64 = 1.3;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Calculate haversine distance between two points in kilometers.
pub fn haversine_km(from: Coordinate, to: Coordinate) -> f64 {
    let lat1_rad = from.lat.to_radians();
    let lat2_rad = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lon = (to.lon - from.lon).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

#[derive(Debug, Clone)]
pub struct HaversineRouter {
    /// Assumed average driving speed in km/h.
    pub speed_kmh: f64,
    /// Multiplier from straight-line to road distance.
    pub circuity: f64,
}

impl Default for HaversineRouter {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
            circuity: DEFAULT_CIRCUITY,
        }
    }
}

impl HaversineRouter {
    pub fn new(speed_kmh: f64, circuity: f64) -> Self {
        Self { speed_kmh, circuity }
    }

    /// Convert distance in km to travel time in minutes.
    fn km_to_minutes(&self, km: f64) -> f64 {
        km / self.speed_kmh * 60.0
    }
}

impl RouteService for HaversineRouter {
    fn route(&self, origin: Coordinate, destination: Coordinate) -> Result<RouteLeg, ServiceError> {
        if self.speed_kmh <= 0.0 {
            return Err(ServiceError::Unavailable(format!(
                "non-positive speed {} km/h",
                self.speed_kmh
            )));
        }
        let distance_km = haversine_km(origin, destination) * self.circuity;
        Ok(RouteLeg {
            distance_km,
            duration_min: self.km_to_minutes(distance_km),
        })
    }
}
