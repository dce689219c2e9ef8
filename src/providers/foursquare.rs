//! Foursquare Places v3.

use super::{http_agent, read_json, take_places, PlaceSource, ProviderError};
use crate::location::{Coordinate, ResolvedArea};
use crate::place::RawPlace;
use crate::provider::Provider;

const SEARCH_URL: &str = "https://api.foursquare.com/v3/places/search";
const NAME_LIMIT: &str = "25";
const AREA_LIMIT: &str = "50";

pub struct FoursquareSource {
    agent: ureq::Agent,
    api_key: String,
}

impl FoursquareSource {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            agent: http_agent(),
            api_key: api_key.into(),
        }
    }

    fn search(&self, params: &[(&str, &str)]) -> Result<Vec<RawPlace>, ProviderError> {
        let mut request = self
            .agent
            .get(SEARCH_URL)
            .set("Accept", "application/json")
            .set("Authorization", &self.api_key);
        for (k, v) in params {
            request = request.query(k, v);
        }
        take_places(read_json(request.call()?)?, "results")
    }
}

impl PlaceSource for FoursquareSource {
    fn provider(&self) -> Provider {
        Provider::Foursquare
    }

    fn search_area(&self, center: Coordinate, radius_m: u32) -> Result<Vec<RawPlace>, ProviderError> {
        let ll = format!("{},{}", center.lat, center.lon);
        let radius = radius_m.to_string();
        self.search(&[("ll", ll.as_str()), ("radius", radius.as_str()), ("limit", AREA_LIMIT)])
    }

    /// Bounded by the area's north-east and south-west corners.
    fn search_name(&self, area: &ResolvedArea, name: &str) -> Result<Vec<RawPlace>, ProviderError> {
        let ne = area.bbox.north_east();
        let sw = area.bbox.south_west();
        self.search(&[("query", name), ("ne", ne.as_str()), ("sw", sw.as_str()), ("limit", NAME_LIMIT)])
    }
}
