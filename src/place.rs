//! Raw provider place records and the predictions derived from them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::category::Category;
use crate::provider::Provider;

/// A place record exactly as the provider returned it.
///
/// The shape differs per provider (an Overpass element, a Foursquare result, a
/// Google candidate, a Yelp business); accessors here only read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawPlace(pub Value);

impl RawPlace {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Top-level string field, e.g. `name`.
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    /// OSM-style `tags.{key}` lookup.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.0.get("tags").and_then(|t| t.get(key)).and_then(Value::as_str)
    }

    /// Strings of a top-level array, e.g. Google's `types`.
    pub fn strings<'a>(&'a self, field: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .get(field)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
    }

    /// `{field}[].{inner}` strings, e.g. Foursquare `categories[].name`.
    pub fn nested_strings<'a>(&'a self, field: &str, inner: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .get(field)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(move |item| item.get(inner).and_then(Value::as_str))
    }
}

/// One piece of classification evidence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Prediction {
    pub category: Category,
    pub provider: Provider,
    /// The provider-native tag or label that produced the category.
    pub label: String,
}

impl Prediction {
    pub fn new(category: Category, provider: Provider, label: impl Into<String>) -> Self {
        Self {
            category,
            provider,
            label: label.into(),
        }
    }
}
