//! Location subsystem: geocoding sighting areas once and caching the result.
//!
//! `(suburb, state, country)` keys are turned into a center point and a
//! bounding box by a [`Geocoder`], and the outcome (including "not found") is
//! kept in `gps_cache.json` so a key is never geocoded twice.

pub mod providers;
pub mod resolver;
pub mod types;

pub use providers::{Geocoder, NominatimGeocoder};
pub use resolver::{LocationResolver, ResolveSummary};
pub use types::{BoundingBox, Coordinate, LocationError, LocationKey, ResolvedArea};

/// File name of the geocoding cache inside the cache directory.
pub const GEOCODE_CACHE_FILE: &str = "gps_cache.json";
