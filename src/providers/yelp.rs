//! Yelp Fusion business search.
//!
//! Yelp takes no bounding box, so name lookups search a fixed radius around
//! the area's center.

use super::{http_agent, read_json, take_places, PlaceSource, ProviderError};
use crate::location::{Coordinate, ResolvedArea};
use crate::place::RawPlace;
use crate::provider::Provider;

const SEARCH_URL: &str = "https://api.yelp.com/v3/businesses/search";
/// Largest radius Yelp accepts, in metres.
pub const MAX_RADIUS_M: u32 = 40_000;

pub struct YelpSource {
    agent: ureq::Agent,
    bearer: String,
}

impl YelpSource {
    pub fn new(api_key: &str) -> Self {
        Self {
            agent: http_agent(),
            bearer: format!("Bearer {}", api_key),
        }
    }

    fn search(&self, term: Option<&str>, center: Coordinate, radius_m: u32) -> Result<Vec<RawPlace>, ProviderError> {
        let mut request = self.agent.get(SEARCH_URL).set("Authorization", &self.bearer);
        if let Some(term) = term {
            request = request.query("term", term);
        }
        let response = request
            .query("latitude", &center.lat.to_string())
            .query("longitude", &center.lon.to_string())
            .query("radius", &radius_m.min(MAX_RADIUS_M).to_string())
            .call()?;
        take_places(read_json(response)?, "businesses")
    }
}

impl PlaceSource for YelpSource {
    fn provider(&self) -> Provider {
        Provider::Yelp
    }

    fn search_area(&self, center: Coordinate, radius_m: u32) -> Result<Vec<RawPlace>, ProviderError> {
        self.search(None, center, radius_m)
    }

    fn search_name(&self, area: &ResolvedArea, name: &str) -> Result<Vec<RawPlace>, ProviderError> {
        self.search(Some(name), area.center, MAX_RADIUS_M)
    }
}
