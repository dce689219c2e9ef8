//! Google Places web service.
//!
//! Name lookups use Find Place with a rectangular location bias; area
//! searches use Nearby Search. Both answer HTTP 200 on quota and key errors
//! and report them in `status`, so that field is checked before the results.

use serde_json::Value;

use super::{http_agent, read_json, take_places, PlaceSource, ProviderError};
use crate::location::{Coordinate, ResolvedArea};
use crate::place::RawPlace;
use crate::provider::Provider;

const FIND_PLACE_URL: &str = "https://maps.googleapis.com/maps/api/place/findplacefromtext/json";
const NEARBY_URL: &str = "https://maps.googleapis.com/maps/api/place/nearbysearch/json";
const FIELDS: &str = "name,rating,types,geometry";

pub struct GooglePlacesSource {
    agent: ureq::Agent,
    api_key: String,
}

impl GooglePlacesSource {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            agent: http_agent(),
            api_key: api_key.into(),
        }
    }

    fn get(&self, url: &str, params: &[(&str, &str)], field: &str) -> Result<Vec<RawPlace>, ProviderError> {
        let mut request = self.agent.get(url);
        for (k, v) in params {
            request = request.query(k, v);
        }
        let body = read_json(request.query("key", &self.api_key).call()?)?;
        check_status(&body)?;
        take_places(body, field)
    }
}

fn check_status(body: &Value) -> Result<(), ProviderError> {
    match body.get("status").and_then(Value::as_str) {
        None | Some("OK") | Some("ZERO_RESULTS") => Ok(()),
        Some(status) => {
            let detail = body.get("error_message").and_then(Value::as_str).unwrap_or("");
            Err(ProviderError::InvalidResponse(format!("{} {}", status, detail).trim_end().to_string()))
        }
    }
}

impl PlaceSource for GooglePlacesSource {
    fn provider(&self) -> Provider {
        Provider::GooglePlaces
    }

    fn search_area(&self, center: Coordinate, radius_m: u32) -> Result<Vec<RawPlace>, ProviderError> {
        let location = format!("{},{}", center.lat, center.lon);
        let radius = radius_m.to_string();
        self.get(
            NEARBY_URL,
            &[("location", location.as_str()), ("radius", radius.as_str()), ("fields", FIELDS)],
            "results",
        )
    }

    fn search_name(&self, area: &ResolvedArea, name: &str) -> Result<Vec<RawPlace>, ProviderError> {
        let bias = area.bbox.to_google_rectangle();
        self.get(
            FIND_PLACE_URL,
            &[("input", name), ("inputtype", "textquery"), ("locationbias", bias.as_str()), ("fields", FIELDS)],
            "candidates",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_ok_and_zero_results() {
        assert!(check_status(&json!({"status": "OK", "candidates": []})).is_ok());
        assert!(check_status(&json!({"status": "ZERO_RESULTS"})).is_ok());
        assert!(check_status(&json!({"results": []})).is_ok());
    }

    #[test]
    fn test_status_denied_is_error() {
        let err = check_status(&json!({"status": "REQUEST_DENIED", "error_message": "bad key"})).unwrap_err();
        assert_eq!(err.to_string(), "Invalid provider response: REQUEST_DENIED bad key");
    }
}
