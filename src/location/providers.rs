//! Geocoding providers: the `Geocoder` seam and OpenStreetMap Nominatim.

use serde::Deserialize;
use std::time::Duration;

use super::types::{BoundingBox, Coordinate, LocationError, ResolvedArea};

const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";

/// Turns free text into an area. `Ok(None)` means the service answered but
/// knows no such place.
pub trait Geocoder: Send {
    fn geocode(&self, query: &str) -> Result<Option<ResolvedArea>, LocationError>;
}

#[derive(Deserialize, Debug, Clone)]
struct NominatimResult {
    lat: String,
    lon: String,
    /// `[min_lat, max_lat, min_lon, max_lon]`, as strings.
    boundingbox: Vec<String>,
}

impl NominatimResult {
    fn into_area(self) -> Result<ResolvedArea, LocationError> {
        let num = |s: &str| {
            s.trim()
                .parse::<f64>()
                .map_err(|e| LocationError::InvalidResponse(format!("bad coordinate '{}': {}", s, e)))
        };
        let [min_lat, max_lat, min_lon, max_lon] = match self.boundingbox.as_slice() {
            [a, b, c, d] => [num(a.as_str())?, num(b.as_str())?, num(c.as_str())?, num(d.as_str())?],
            other => {
                return Err(LocationError::InvalidResponse(format!(
                    "boundingbox has {} values, expected 4",
                    other.len()
                )))
            }
        };
        Ok(ResolvedArea::new(
            Coordinate::new(num(self.lat.as_str())?, num(self.lon.as_str())?),
            BoundingBox { min_lat, max_lat, min_lon, max_lon },
        ))
    }
}

/// Nominatim client. The usage policy requires an identifying User-Agent, so
/// one is built from the operator's email address.
pub struct NominatimGeocoder {
    agent: ureq::Agent,
    user_agent: String,
}

impl NominatimGeocoder {
    pub fn new(email: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(Duration::from_secs(30))
            .build();
        Self {
            agent,
            user_agent: format!("decor-predictor/0.3 ({})", email),
        }
    }
}

impl Geocoder for NominatimGeocoder {
    fn geocode(&self, query: &str) -> Result<Option<ResolvedArea>, LocationError> {
        let response = self
            .agent
            .get(NOMINATIM_URL)
            .set("User-Agent", &self.user_agent)
            .query("q", query)
            .query("format", "json")
            .query("limit", "1")
            .call()
            .map_err(|e| LocationError::Network(e.to_string()))?;

        let results: Vec<NominatimResult> = response
            .into_json()
            .map_err(|e| LocationError::InvalidResponse(e.to_string()))?;

        results.into_iter().next().map(NominatimResult::into_area).transpose()
    }
}
