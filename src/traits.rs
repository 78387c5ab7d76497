//! Capability seams for the external collaborators.
//!
//! The engine never talks to a network service directly. Geocoding and
//! routing sit behind these traits so the search can run against the HTTP
//! clients in production and against deterministic fakes in tests.

use crate::error::ServiceError;
use crate::zone::{Coordinate, ZoneDescriptor, ZoneId};

/// Maps a zone identifier to its descriptor.
pub trait ZoneLookup {
    fn zone(&self, id: ZoneId) -> Option<&ZoneDescriptor>;
}

/// A geocoding match: an approximate coordinate and the matched address.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeMatch {
    pub coordinate: Coordinate,
    pub address: String,
}

/// Resolves free text to a coordinate.
pub trait GeocodingService {
    /// Geocode `query`, returning the best match.
    ///
    /// Exactly one external call per invocation; caching and fallback are the
    /// caller's responsibility.
    fn geocode(&self, query: &str) -> Result<GeocodeMatch, ServiceError>;
}

/// Raw route metrics as reported by a routing backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteLeg {
    pub distance_km: f64,
    pub duration_min: f64,
}

/// Computes a travel distance and duration between two coordinates.
pub trait RouteService {
    fn route(&self, origin: Coordinate, destination: Coordinate) -> Result<RouteLeg, ServiceError>;
}

impl<T: ZoneLookup + ?Sized> ZoneLookup for &T {
    fn zone(&self, id: ZoneId) -> Option<&ZoneDescriptor> {
        (**self).zone(id)
    }
}

impl<T: GeocodingService + ?Sized> GeocodingService for &T {
    fn geocode(&self, query: &str) -> Result<GeocodeMatch, ServiceError> {
        (**self).geocode(query)
    }
}

impl<T: RouteService + ?Sized> RouteService for &T {
    fn route(&self, origin: Coordinate, destination: Coordinate) -> Result<RouteLeg, ServiceError> {
        (**self).route(origin, destination)
    }
}

impl<T: GeocodingService + ?Sized> GeocodingService for Box<T> {
    fn geocode(&self, query: &str) -> Result<GeocodeMatch, ServiceError> {
        (**self).geocode(query)
    }
}

impl<T: RouteService + ?Sized> RouteService for Box<T> {
    fn route(&self, origin: Coordinate, destination: Coordinate) -> Result<RouteLeg, ServiceError> {
        (**self).route(origin, destination)
    }
}
