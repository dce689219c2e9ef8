//! Provider identities and the fixed order they are consulted in.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Provider {
    #[serde(rename = "OSM")]
    Osm,
    Foursquare,
    GooglePlaces,
    Yelp,
}

impl Provider {
    /// Enrichment and reconciliation order. First-match-wins selection
    /// depends on it, so it must never change between runs.
    pub const ORDER: [Self; 4] = [Self::Osm, Self::Foursquare, Self::GooglePlaces, Self::Yelp];

    pub fn index(self) -> usize {
        match self {
            Self::Osm => 0,
            Self::Foursquare => 1,
            Self::GooglePlaces => 2,
            Self::Yelp => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Osm => "OSM",
            Self::Foursquare => "Foursquare",
            Self::GooglePlaces => "GooglePlaces",
            Self::Yelp => "Yelp",
        }
    }

    /// File name of this provider's lookup cache.
    pub fn cache_file(self) -> &'static str {
        match self {
            Self::Osm => "osm_cache.json",
            Self::Foursquare => "foursquare_cache.json",
            Self::GooglePlaces => "google_places_cache.json",
            Self::Yelp => "yelp_cache.json",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
