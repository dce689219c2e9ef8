//! Decor predictor.
//!
//! Geocodes sighting locations, looks the sighted place up in OpenStreetMap,
//! Foursquare, Google Places and Yelp, and classifies it into a decor
//! category with per-provider tag rules. Every lookup is cached on disk.

pub mod cache;
pub mod category;
pub mod config;
pub mod dataset;
pub mod error;
pub mod io;
pub mod location;
pub mod pipeline;
pub mod place;
pub mod provider;
pub mod providers;
pub mod rate_limit;
pub mod reconcile;
pub mod row;
pub mod rules;
pub mod server;

pub use category::Category;
pub use config::{Config, Credentials};
pub use error::{Error, Result};
pub use pipeline::EnrichmentPipeline;
pub use place::{Prediction, RawPlace};
pub use provider::Provider;
pub use row::Row;
