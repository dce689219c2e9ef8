//! Sighting rows and their per-provider evidence slots.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::category::Category;
use crate::location::LocationKey;
use crate::place::RawPlace;
use crate::provider::Provider;

/// Raw provider payloads attached to one row, one independently empty slot
/// per provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    #[serde(default)]
    pub osm: Option<RawPlace>,
    #[serde(default)]
    pub foursquare: Option<RawPlace>,
    #[serde(default)]
    pub google_places: Option<RawPlace>,
    #[serde(default)]
    pub yelp: Option<RawPlace>,
}

impl Evidence {
    pub fn get(&self, provider: Provider) -> Option<&RawPlace> {
        match provider {
            Provider::Osm => self.osm.as_ref(),
            Provider::Foursquare => self.foursquare.as_ref(),
            Provider::GooglePlaces => self.google_places.as_ref(),
            Provider::Yelp => self.yelp.as_ref(),
        }
    }

    pub fn set(&mut self, provider: Provider, place: Option<RawPlace>) {
        let slot = match provider {
            Provider::Osm => &mut self.osm,
            Provider::Foursquare => &mut self.foursquare,
            Provider::GooglePlaces => &mut self.google_places,
            Provider::Yelp => &mut self.yelp,
        };
        *slot = place;
    }

    pub fn is_empty(&self) -> bool {
        Provider::ORDER.iter().all(|p| self.get(*p).is_none())
    }

    /// Providers with a payload, in the fixed order.
    pub fn present(&self) -> impl Iterator<Item = (Provider, &RawPlace)> + '_ {
        Provider::ORDER.into_iter().filter_map(move |p| self.get(p).map(|raw| (p, raw)))
    }
}

/// One sighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Free-text place name as reported, e.g. "Near Central Station".
    pub location: String,
    pub suburb: String,
    pub state: String,
    pub country: String,
    #[serde(with = "observation_date")]
    pub date: NaiveDate,
    /// Ground truth, when known.
    #[serde(default, rename = "decor")]
    pub truth: Option<Category>,
    #[serde(default)]
    pub evidence: Evidence,
}

impl Row {
    pub fn new(
        location: impl Into<String>,
        suburb: impl Into<String>,
        state: impl Into<String>,
        country: impl Into<String>,
        date: NaiveDate,
        truth: Option<Category>,
    ) -> Self {
        Self {
            location: location.into(),
            suburb: suburb.into(),
            state: state.into(),
            country: country.into(),
            date,
            truth,
            evidence: Evidence::default(),
        }
    }

    pub fn location_key(&self) -> LocationKey {
        LocationKey::new(&self.suburb, &self.state, &self.country)
    }

    /// Fine-grained key for place lookups: two rows in one suburb can name
    /// different places.
    pub fn row_key(&self) -> String {
        format!("{}, {}, {}, {}", self.suburb, self.state, self.country, self.location)
    }
}

/// Sighting dates come as `m/d/Y`; ISO `Y-m-d` is accepted too.
pub fn parse_observation_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%m/%d/%Y")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .ok()
}

mod observation_date {
    use super::*;

    pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&date.format("%m/%d/%Y").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(d)?;
        parse_observation_date(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date '{}', expected m/d/Y", raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys() {
        let row = Row::new("Near Flinders Street", "Melbourne", "Victoria", "Australia",
            NaiveDate::from_ymd_opt(2022, 3, 1).unwrap(), None);
        assert_eq!(row.location_key().query(), "Melbourne, Victoria, Australia");
        assert_eq!(row.row_key(), "Melbourne, Victoria, Australia, Near Flinders Street");
    }

    #[test]
    fn test_evidence_slots() {
        let mut ev = Evidence::default();
        assert!(ev.is_empty());
        ev.set(Provider::Yelp, Some(RawPlace::new(json!({"name": "x"}))));
        assert!(!ev.is_empty());
        assert!(ev.get(Provider::Osm).is_none());
        let present: Vec<_> = ev.present().map(|(p, _)| p).collect();
        assert_eq!(present, vec![Provider::Yelp]);
    }

    #[test]
    fn test_row_json() {
        let row: Row = serde_json::from_value(json!({
            "location": "Burger Barn",
            "suburb": "Fitzroy",
            "state": "Victoria",
            "country": "Australia",
            "date": "12/18/2021",
            "decor": "Hamburger Shop"
        }))
        .unwrap();
        assert_eq!(row.date, NaiveDate::from_ymd_opt(2021, 12, 18).unwrap());
        assert_eq!(row.truth, Some(Category::BurgerPlace));
        assert!(row.evidence.is_empty());

        let back = serde_json::to_value(&row).unwrap();
        assert_eq!(back["date"], "12/18/2021");
    }

    #[test]
    fn test_parse_dates() {
        assert!(parse_observation_date("1/2/2022").is_some());
        assert!(parse_observation_date("2022-01-02").is_some());
        assert!(parse_observation_date("yesterday").is_none());
    }
}
