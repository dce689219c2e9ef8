//! Drives the location resolver and every enabled provider over a batch.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::location::{Coordinate, LocationResolver, NominatimGeocoder, ResolveSummary, GEOCODE_CACHE_FILE};
use crate::place::Prediction;
use crate::provider::Provider;
use crate::row::Row;
use crate::providers::{
    FillSummary, FoursquareSource, GooglePlacesSource, OverpassSource, PlaceSource, ProviderClient, YelpSource,
};

/// Per-phase counts for one `enrich` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichSummary {
    pub locations: ResolveSummary,
    pub providers: BTreeMap<Provider, FillSummary>,
}

/// One place from an area search and what it classifies as.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacePredictions {
    pub name: String,
    pub predictions: Vec<Prediction>,
}

pub type PointPrediction = BTreeMap<Provider, Vec<PlacePredictions>>;

pub struct EnrichmentPipeline {
    resolver: LocationResolver,
    clients: Vec<ProviderClient>,
    cutoff: NaiveDate,
    offline: bool,
}

impl EnrichmentPipeline {
    /// Clients are visited in the fixed provider order whatever order they
    /// arrive in.
    pub fn new(resolver: LocationResolver, mut clients: Vec<ProviderClient>, cutoff: NaiveDate) -> Self {
        clients.sort_by_key(|c| c.provider().index());
        Self {
            resolver,
            clients,
            cutoff,
            offline: false,
        }
    }

    /// Wire the HTTP geocoder and a client for every enabled provider.
    pub fn from_config(config: &Config) -> Self {
        let resolver = LocationResolver::open(
            Box::new(NominatimGeocoder::new(config.contact())),
            config.cache_path(GEOCODE_CACHE_FILE),
            config.flush,
        )
        .with_quota(config.geocoder_quota);

        let clients = config
            .enabled_providers()
            .into_iter()
            .filter_map(|provider| source_for(config, provider))
            .map(|source| ProviderClient::open(source, &config.cache_dir, config.flush).with_quota(config.provider_quota))
            .collect();

        let mut pipeline = Self::new(resolver, clients, config.cutoff);
        pipeline.set_offline(config.offline);
        pipeline
    }

    /// Answer from the caches only: no geocoding, no provider queries.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
        self.resolver.set_offline(offline);
        for client in &mut self.clients {
            client.set_offline(offline);
        }
    }

    pub fn providers(&self) -> Vec<Provider> {
        self.clients.iter().map(ProviderClient::provider).collect()
    }

    pub fn cutoff(&self) -> NaiveDate {
        self.cutoff
    }

    /// Resolve every location, then fill each provider's slots, then flush
    /// every cache.
    pub fn enrich(&mut self, rows: &mut [Row]) -> Result<EnrichSummary> {
        let mut summary = EnrichSummary {
            locations: self.resolver.resolve_all(rows),
            ..EnrichSummary::default()
        };
        for client in &mut self.clients {
            let fill = client.fill_in_data(rows, &self.resolver);
            summary.providers.insert(client.provider(), fill);
        }
        self.save()?;
        Ok(summary)
    }

    /// Classify everything around a point, per provider. Places with no
    /// prediction are left out; a failing provider is logged and skipped.
    pub fn predict_point(&self, center: Coordinate, radius_m: u32, observed_at: NaiveDate) -> PointPrediction {
        let mut out = PointPrediction::new();
        if self.offline {
            tracing::info!("offline, point predictions need live area searches");
            return out;
        }
        for client in &self.clients {
            let provider = client.provider();
            let places = match client.query_area(center, radius_m) {
                Ok(places) => places,
                Err(e) => {
                    tracing::warn!(%provider, error = %e, "area search failed");
                    continue;
                }
            };
            let found: Vec<PlacePredictions> = places
                .iter()
                .filter_map(|place| {
                    let predictions = client.classify(place, observed_at, self.cutoff);
                    if predictions.is_empty() {
                        return None;
                    }
                    let name = client.place_name(place).unwrap_or("(unnamed)").to_string();
                    Some(PlacePredictions { name, predictions })
                })
                .collect();
            tracing::debug!(%provider, places = places.len(), classified = found.len(), "area search");
            out.insert(provider, found);
        }
        out
    }

    /// Remove `key` from the named cache (`gps` or a provider name).
    pub fn purge(&mut self, cache: &str, key: &str) -> Result<bool> {
        let removed = if cache.eq_ignore_ascii_case("gps") || cache.eq_ignore_ascii_case("location") {
            self.resolver.purge(key)
        } else {
            let client = self
                .clients
                .iter_mut()
                .find(|c| names_cache(c.provider(), cache))
                .ok_or_else(|| Error::Config(format!("unknown or disabled cache '{}'", cache)))?;
            client.purge(key)
        };
        self.save()?;
        Ok(removed)
    }

    pub fn save(&mut self) -> Result<()> {
        self.resolver.save()?;
        for client in &mut self.clients {
            client.save()?;
        }
        Ok(())
    }
}

/// `cache` is a provider's display name or its cache file stem.
fn names_cache(provider: Provider, cache: &str) -> bool {
    let stem = provider.cache_file().trim_end_matches("_cache.json");
    provider.name().eq_ignore_ascii_case(cache) || stem.eq_ignore_ascii_case(cache)
}

fn source_for(config: &Config, provider: Provider) -> Option<Box<dyn PlaceSource>> {
    let key = config.credentials.key_for(provider);
    match provider {
        Provider::Osm => Some(Box::new(OverpassSource::new()) as Box<dyn PlaceSource>),
        Provider::Foursquare => key.map(|k| Box::new(FoursquareSource::new(k)) as Box<dyn PlaceSource>),
        Provider::GooglePlaces => key.map(|k| Box::new(GooglePlacesSource::new(k)) as Box<dyn PlaceSource>),
        Provider::Yelp => key.map(|k| Box::new(YelpSource::new(k)) as Box<dyn PlaceSource>),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use tempfile::TempDir;

    #[test]
    fn test_from_config_enables_keyed_providers_in_order() {
        let dir = TempDir::new().unwrap();
        let config = Config::new(dir.path()).with_credentials(Credentials {
            yelp: Some("y".into()),
            google_places: Some("g".into()),
            ..Credentials::default()
        });
        let pipeline = EnrichmentPipeline::from_config(&config);
        assert_eq!(pipeline.providers(), vec![Provider::Osm, Provider::GooglePlaces, Provider::Yelp]);
    }

    #[test]
    fn test_purge_unknown_cache_is_config_error() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = EnrichmentPipeline::from_config(&Config::new(dir.path()));
        assert!(matches!(pipeline.purge("yelp", "k"), Err(Error::Config(_))));
        assert!(!pipeline.purge("osm", "k").unwrap());
        assert!(!pipeline.purge("gps", "k").unwrap());
        assert!(names_cache(Provider::GooglePlaces, "google_places"));
        assert!(names_cache(Provider::GooglePlaces, "GooglePlaces"));
    }
}
