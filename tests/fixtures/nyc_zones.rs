//! A handful of real NYC taxi zones for realistic fixtures.
//!
//! Bounds are the zones' approximate extents; centroids are well-known
//! landmarks inside them.

use trip_augmenter::{BoundingBox, Coordinate, ZoneDescriptor, ZoneTable};

pub const TIMES_SQUARE_ID: u32 = 230;
pub const JFK_ID: u32 = 132;
pub const ASTORIA_ID: u32 = 7;
pub const PARK_SLOPE_ID: u32 = 190;
/// A zone with neither geocodable text nor a centroid.
pub const UNKNOWN_ID: u32 = 264;

pub const TIMES_SQUARE: Coordinate = Coordinate::new(40.7589, -73.9851);
pub const JFK: Coordinate = Coordinate::new(40.6413, -73.7781);
pub const ASTORIA: Coordinate = Coordinate::new(40.7644, -73.9235);
pub const PARK_SLOPE: Coordinate = Coordinate::new(40.6710, -73.9814);

pub fn times_square() -> ZoneDescriptor {
    ZoneDescriptor::new(TIMES_SQUARE_ID, "Times Sq/Theatre District", "Manhattan")
        .with_bounds(BoundingBox::new(40.7540, 40.7640, -73.9920, -73.9800))
}

pub fn jfk() -> ZoneDescriptor {
    ZoneDescriptor::new(JFK_ID, "JFK Airport", "Queens")
        .with_bounds(BoundingBox::new(40.6190, 40.6650, -73.8250, -73.7430))
}

/// Carries a lookup centroid, used when geocoding fails.
pub fn astoria() -> ZoneDescriptor {
    ZoneDescriptor::new(ASTORIA_ID, "Astoria", "Queens")
        .with_bounds(BoundingBox::new(40.7550, 40.7780, -73.9400, -73.9050))
        .with_centroid(ASTORIA)
}

/// No bounds; sampling falls back to a square around the centroid.
pub fn park_slope() -> ZoneDescriptor {
    ZoneDescriptor::new(PARK_SLOPE_ID, "Park Slope", "Brooklyn").with_centroid(PARK_SLOPE)
}

pub fn unknown() -> ZoneDescriptor {
    ZoneDescriptor::new(UNKNOWN_ID, "", "")
}

pub fn zone_table() -> ZoneTable {
    ZoneTable::new([times_square(), jfk(), astoria(), park_slope(), unknown()])
}
