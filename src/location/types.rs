//! Core types for the location subsystem.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Metres per degree of latitude.
const METRES_PER_DEGREE: f64 = 111_320.0;

/// Coarse place description geocoded once and shared by every row in it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocationKey {
    pub suburb: String,
    pub state: String,
    pub country: String,
}

impl LocationKey {
    pub fn new(suburb: impl Into<String>, state: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            suburb: suburb.into(),
            state: state.into(),
            country: country.into(),
        }
    }

    /// Free-text geocoding query, also used as the cache key.
    pub fn query(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.suburb, self.state, self.country)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }

    /// Square box extending `radius_m` metres from this point on every side.
    pub fn bbox_around(&self, radius_m: u32) -> BoundingBox {
        let radius = f64::from(radius_m);
        let d_lat = radius / METRES_PER_DEGREE;
        // longitude degrees shrink with latitude; clamp near the poles
        let cos_lat = self.lat.to_radians().cos().abs().max(1e-6);
        let d_lon = radius / (METRES_PER_DEGREE * cos_lat);
        BoundingBox {
            min_lat: self.lat - d_lat,
            max_lat: self.lat + d_lat,
            min_lon: self.lon - d_lon,
            max_lon: self.lon + d_lon,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Overpass order: `south,west,north,east`.
    pub fn to_overpass(&self) -> String {
        format!("{},{},{},{}", self.min_lat, self.min_lon, self.max_lat, self.max_lon)
    }

    /// `lat,lon` of the north-east corner.
    pub fn north_east(&self) -> String {
        format!("{},{}", self.max_lat, self.max_lon)
    }

    /// `lat,lon` of the south-west corner.
    pub fn south_west(&self) -> String {
        format!("{},{}", self.min_lat, self.min_lon)
    }

    /// Google Places location bias: `rectangle:south,west|north,east`.
    pub fn to_google_rectangle(&self) -> String {
        format!("rectangle:{}|{}", self.south_west(), self.north_east())
    }
}

/// A geocoded [`LocationKey`]: its center and extent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedArea {
    pub center: Coordinate,
    pub bbox: BoundingBox,
}

impl ResolvedArea {
    pub fn new(center: Coordinate, bbox: BoundingBox) -> Self {
        Self { center, bbox }
    }

    /// An area for a bare point, boxed by `radius_m`.
    pub fn around(center: Coordinate, radius_m: u32) -> Self {
        Self {
            center,
            bbox: center.bbox_around(radius_m),
        }
    }
}

/// Geocoding errors.
#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid geocoder response: {0}")]
    InvalidResponse(String),
}
