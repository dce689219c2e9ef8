//! Run configuration: credentials, cache location and classification knobs.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::cache::FlushPolicy;
use crate::category::Category;
use crate::error::{Error, Result};
use crate::location::GEOCODE_CACHE_FILE;
use crate::provider::Provider;
use crate::rate_limit::RateQuota;
use crate::rules::default_cutoff;

/// API keys. A missing (or blank) key disables its provider for the run.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// Contact address sent to Nominatim.
    pub email: Option<String>,
    pub foursquare: Option<String>,
    pub google_places: Option<String>,
    pub yelp: Option<String>,
}

impl Credentials {
    pub fn key_for(&self, provider: Provider) -> Option<&str> {
        let key = match provider {
            Provider::Osm => return None,
            Provider::Foursquare => &self.foursquare,
            Provider::GooglePlaces => &self.google_places,
            Provider::Yelp => &self.yelp,
        };
        key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub cache_dir: PathBuf,
    /// Sightings on or after this date read `amenity=fast_food` as Hamburger Shop.
    pub cutoff: NaiveDate,
    /// Ground-truth categories dropped before classification.
    pub excluded: Vec<Category>,
    pub flush: FlushPolicy,
    pub provider_quota: RateQuota,
    pub geocoder_quota: RateQuota,
    /// Answer from caches only.
    pub offline: bool,
}

impl Config {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            credentials: Credentials::default(),
            cache_dir: cache_dir.into(),
            cutoff: default_cutoff(),
            excluded: Category::UNRELIABLE.to_vec(),
            flush: FlushPolicy::default(),
            provider_quota: RateQuota::provider_default(),
            geocoder_quota: RateQuota::geocoder_default(),
            offline: false,
        }
    }

    /// `~/.decor/caches`.
    pub fn default_cache_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".decor").join("caches"))
            .ok_or_else(|| Error::Config("cannot determine home directory; pass --cache-dir".into()))
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// OSM always, the rest when keyed, in the fixed order.
    pub fn enabled_providers(&self) -> Vec<Provider> {
        Provider::ORDER
            .into_iter()
            .filter(|p| *p == Provider::Osm || self.credentials.key_for(*p).is_some())
            .collect()
    }

    /// Nominatim contact; falls back to a generic agent name.
    pub fn contact(&self) -> &str {
        self.credentials
            .email
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or("decor-predictor")
    }

    pub fn cache_path(&self, file: &str) -> PathBuf {
        self.cache_dir.join(file)
    }

    /// Every cache file this tool owns, geocoder first.
    pub fn cache_files(&self) -> Vec<PathBuf> {
        std::iter::once(GEOCODE_CACHE_FILE)
            .chain(Provider::ORDER.iter().map(|p| p.cache_file()))
            .map(|f| self.cache_path(f))
            .collect()
    }

    /// Delete every cache file. Returns how many existed.
    pub fn invalidate_caches(&self) -> Result<usize> {
        let mut removed = 0;
        for path in self.cache_files() {
            if remove_if_exists(&path)? {
                tracing::warn!(path = %path.display(), "cache removed");
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn remove_if_exists(path: &Path) -> Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_only_osm_without_keys() {
        let config = Config::new("/tmp/x");
        assert_eq!(config.enabled_providers(), vec![Provider::Osm]);
    }

    #[test]
    fn test_enabled_providers_keep_fixed_order() {
        let config = Config::new("/tmp/x").with_credentials(Credentials {
            yelp: Some("y".into()),
            foursquare: Some("f".into()),
            google_places: Some("  ".into()),
            ..Credentials::default()
        });
        assert_eq!(config.enabled_providers(), vec![Provider::Osm, Provider::Foursquare, Provider::Yelp]);
    }

    #[test]
    fn test_defaults() {
        let config = Config::new("/tmp/x");
        assert_eq!(config.cutoff, NaiveDate::from_ymd_opt(2021, 12, 18).unwrap());
        assert_eq!(config.excluded, vec![Category::Forest, Category::Park, Category::Waterside]);
        assert_eq!(config.flush, FlushPolicy::EveryInserts(25));
        assert_eq!(config.contact(), "decor-predictor");
    }

    #[test]
    fn test_invalidate_caches() {
        let dir = TempDir::new().unwrap();
        let config = Config::new(dir.path());
        std::fs::write(config.cache_path("gps_cache.json"), "{}").unwrap();
        std::fs::write(config.cache_path("yelp_cache.json"), "{}").unwrap();
        std::fs::write(dir.path().join("unrelated.txt"), "keep").unwrap();

        assert_eq!(config.invalidate_caches().unwrap(), 2);
        assert!(!config.cache_path("gps_cache.json").exists());
        assert!(dir.path().join("unrelated.txt").exists());
        assert_eq!(config.invalidate_caches().unwrap(), 0);
    }

    #[test]
    fn test_cache_files_listed() {
        let config = Config::new("/c");
        let files = config.cache_files();
        assert_eq!(files.len(), 5);
        assert_eq!(files[0], PathBuf::from("/c/gps_cache.json"));
    }
}
