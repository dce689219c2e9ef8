//! OpenStreetMap through the Overpass API.

use super::{http_agent, read_json, take_places, PlaceSource, ProviderError};
use crate::location::{Coordinate, ResolvedArea};
use crate::place::RawPlace;
use crate::provider::Provider;

const OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

/// Tag keys whose presence makes a node worth classifying in an area search.
const AREA_SELECTORS: [&str; 8] = [
    "amenity", "shop", "aeroway", "tourism", "cuisine", "leisure", "natural", "railway",
];

pub struct OverpassSource {
    agent: ureq::Agent,
    url: String,
}

impl OverpassSource {
    pub fn new() -> Self {
        Self::with_url(OVERPASS_URL)
    }

    /// Point at another Overpass instance.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            agent: http_agent(),
            url: url.into(),
        }
    }

    fn run(&self, query: &str) -> Result<Vec<RawPlace>, ProviderError> {
        tracing::debug!(query, "overpass");
        let response = self.agent.post(&self.url).send_form(&[("data", query)])?;
        take_places(read_json(response)?, "elements")
    }
}

impl Default for OverpassSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Escape `name` for a quoted Overpass regex so it matches literally.
fn escape_regex_literal(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 8);
    for c in name.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' | '.' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '^' | '$' => {
                // one backslash for the string literal, one for the regex
                out.push_str("\\\\");
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

fn name_query(area: &ResolvedArea, name: &str) -> String {
    format!(
        "[out:json][timeout:60];node[\"name\"~\"{}\"]({});out body;",
        escape_regex_literal(name),
        area.bbox.to_overpass()
    )
}

fn area_query(center: Coordinate, radius_m: u32) -> String {
    let bbox = center.bbox_around(radius_m).to_overpass();
    let union: String = AREA_SELECTORS
        .iter()
        .map(|key| format!("node[\"{}\"]({});", key, bbox))
        .collect();
    format!("[out:json][timeout:60];({});out body;", union)
}

impl PlaceSource for OverpassSource {
    fn provider(&self) -> Provider {
        Provider::Osm
    }

    fn search_area(&self, center: Coordinate, radius_m: u32) -> Result<Vec<RawPlace>, ProviderError> {
        self.run(&area_query(center, radius_m))
    }

    fn search_name(&self, area: &ResolvedArea, name: &str) -> Result<Vec<RawPlace>, ProviderError> {
        self.run(&name_query(area, name))
    }

    /// Overpass elements keep their name under `tags`.
    fn place_name<'a>(&self, place: &'a RawPlace) -> Option<&'a str> {
        place.tag("name")
    }
}
