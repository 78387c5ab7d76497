//! Zone geometry and the CSV-backed zone table.
//!
//! Zones are the coarse origin/destination unit of input trip records. The
//! engine only needs a name and borough to geocode, plus a bounding box (or a
//! pre-known centroid) to draw candidate points from.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::traits::ZoneLookup;

/// Zone identifier as used by the upstream trip records.
pub type ZoneId = u32;

/// A WGS84 latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Round both components to `precision` decimal places.
    pub fn rounded(&self, precision: u32) -> Self {
        let factor = 10f64.powi(precision as i32);
        Self {
            lat: (self.lat * factor).round() / factor,
            lon: (self.lon * factor).round() / factor,
        }
    }

    /// Finite, with latitude in [-90, 90] and longitude in [-180, 180].
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Axis-aligned bounding region of a zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Builds a box, swapping bounds that were given in the wrong order.
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self {
            min_lat: min_lat.min(max_lat),
            max_lat: min_lat.max(max_lat),
            min_lon: min_lon.min(max_lon),
            max_lon: min_lon.max(max_lon),
        }
    }

    /// Square box of `half_extent_deg` around `center`.
    pub fn around(center: Coordinate, half_extent_deg: f64) -> Self {
        let half = half_extent_deg.abs();
        Self::new(
            center.lat - half,
            center.lat + half,
            center.lon - half,
            center.lon + half,
        )
    }

    pub fn contains(&self, coord: Coordinate) -> bool {
        coord.lat >= self.min_lat
            && coord.lat <= self.max_lat
            && coord.lon >= self.min_lon
            && coord.lon <= self.max_lon
    }

    /// Both corners are valid coordinates, so the box can be sampled.
    pub fn is_valid(&self) -> bool {
        Coordinate::new(self.min_lat, self.min_lon).is_valid()
            && Coordinate::new(self.max_lat, self.max_lon).is_valid()
    }

    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }
}

/// Read-only description of a zone, supplied by the zone lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneDescriptor {
    pub id: ZoneId,
    pub name: String,
    pub borough: String,
    pub bounds: Option<BoundingBox>,
    pub centroid: Option<Coordinate>,
}

impl ZoneDescriptor {
    pub fn new(id: ZoneId, name: impl Into<String>, borough: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            borough: borough.into(),
            bounds: None,
            centroid: None,
        }
    }

    pub fn with_bounds(mut self, bounds: BoundingBox) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn with_centroid(mut self, centroid: Coordinate) -> Self {
        self.centroid = Some(centroid);
        self
    }

    /// Whether the zone carries enough text to be geocoded.
    pub fn is_geocodable(&self) -> bool {
        !self.name.trim().is_empty() && !self.borough.trim().is_empty()
    }

    /// Human-readable label, also used as the address of sampled points.
    pub fn label(&self) -> String {
        format!("{}, {}", self.name, self.borough)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ZoneTableError {
    #[error("I/O error reading zone table: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed zone table: {0}")]
    Csv(#[from] csv::Error),

    #[error("zone {0}: centroid_lat and centroid_lon must be given together")]
    PartialCentroid(ZoneId),

    #[error("zone {zone_id}: {field} is not a valid WGS84 coordinate")]
    InvalidCoordinate { zone_id: ZoneId, field: &'static str },
}

#[derive(Deserialize)]
struct ZoneRecord {
    location_id: ZoneId,
    zone: String,
    borough: String,
    min_lat: Option<f64>,
    max_lat: Option<f64>,
    min_lon: Option<f64>,
    max_lon: Option<f64>,
    centroid_lat: Option<f64>,
    centroid_lon: Option<f64>,
}

/// In-memory zone lookup.
///
/// # CSV format
///
/// ```csv
/// location_id,zone,borough,min_lat,max_lat,min_lon,max_lon,centroid_lat,centroid_lon
/// 161,Midtown Center,Manhattan,40.7514,40.7620,-73.9880,-73.9726,40.7580,-73.9776
/// 132,JFK Airport,Queens,40.6190,40.6650,-73.8250,-73.7430,,
/// ```
///
/// Bounds are used only when all four are present; the centroid columns are
/// optional as a pair.
#[derive(Debug, Clone, Default)]
pub struct ZoneTable {
    zones: HashMap<ZoneId, ZoneDescriptor>,
}

impl ZoneTable {
    pub fn new(zones: impl IntoIterator<Item = ZoneDescriptor>) -> Self {
        Self {
            zones: zones.into_iter().map(|zone| (zone.id, zone)).collect(),
        }
    }

    pub fn from_csv(path: &Path) -> Result<Self, ZoneTableError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ZoneTableError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut zones = HashMap::new();

        for row in csv_reader.deserialize::<ZoneRecord>() {
            let record = row?;
            let mut zone = ZoneDescriptor::new(record.location_id, record.zone, record.borough);

            let id = record.location_id;
            if let (Some(min_lat), Some(max_lat), Some(min_lon), Some(max_lon)) =
                (record.min_lat, record.max_lat, record.min_lon, record.max_lon)
            {
                // Checked before `BoundingBox::new`, whose min/max would swallow NaN.
                check(id, "min_lat/min_lon", Coordinate::new(min_lat, min_lon))?;
                check(id, "max_lat/max_lon", Coordinate::new(max_lat, max_lon))?;
                zone.bounds = Some(BoundingBox::new(min_lat, max_lat, min_lon, max_lon));
            }

            zone.centroid = match (record.centroid_lat, record.centroid_lon) {
                (Some(lat), Some(lon)) => Some(check(id, "centroid", Coordinate::new(lat, lon))?),
                (None, None) => None,
                _ => return Err(ZoneTableError::PartialCentroid(id)),
            };

            zones.insert(zone.id, zone);
        }

        Ok(Self { zones })
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

fn check(zone_id: ZoneId, field: &'static str, coord: Coordinate) -> Result<Coordinate, ZoneTableError> {
    if coord.is_valid() {
        Ok(coord)
    } else {
        Err(ZoneTableError::InvalidCoordinate { zone_id, field })
    }
}

impl ZoneLookup for ZoneTable {
    fn zone(&self, id: ZoneId) -> Option<&ZoneDescriptor> {
        self.zones.get(&id)
    }
}
