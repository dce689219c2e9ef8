//! Location resolver: LocationKey → ResolvedArea, geocoding each key at most once.
//!
//! Resolution is a separate upfront pass (`resolve_all`) so that every
//! geocoding call happens before any provider querying begins; providers then
//! read areas with the pure `lookup`.

use std::collections::BTreeSet;
use std::path::PathBuf;

use super::providers::Geocoder;
use super::types::{LocationKey, ResolvedArea};
use crate::cache::{CacheEntry, DiskBackedCache, FlushPolicy};
use crate::error::Result;
use crate::rate_limit::{RateLimiter, RateQuota};
use crate::row::Row;

/// Counts from one `resolve_all` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveSummary {
    pub distinct: usize,
    pub resolved: usize,
    pub not_found: usize,
    /// Keys that required a geocoder call (cache misses).
    pub queried: usize,
}

pub struct LocationResolver {
    cache: DiskBackedCache<ResolvedArea>,
    geocoder: Box<dyn Geocoder>,
    limiter: RateLimiter,
    offline: bool,
}

impl LocationResolver {
    pub fn new(geocoder: Box<dyn Geocoder>, cache: DiskBackedCache<ResolvedArea>) -> Self {
        Self {
            cache,
            geocoder,
            limiter: RateLimiter::new(RateQuota::geocoder_default()),
            offline: false,
        }
    }

    /// Open the cache at `path` with the given policy.
    pub fn open(geocoder: Box<dyn Geocoder>, path: impl Into<PathBuf>, policy: FlushPolicy) -> Self {
        Self::new(geocoder, DiskBackedCache::load(path, policy))
    }

    pub fn with_quota(mut self, quota: RateQuota) -> Self {
        self.limiter = RateLimiter::new(quota);
        self
    }

    /// Offline mode: answer from the cache only, never geocode, never cache misses.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    /// Resolve one key. A geocoder failure is logged and cached as not found,
    /// so the key is not queried again until its entry is purged.
    pub fn resolve(&mut self, key: &LocationKey) -> Option<ResolvedArea> {
        let query = key.query();
        if let Some(entry) = self.cache.get(&query) {
            return entry.as_found().copied();
        }
        if self.offline {
            tracing::debug!(location = %query, "offline, skipping geocode");
            return None;
        }

        let outcome = match self.limiter.call(|| self.geocoder.geocode(&query)) {
            Ok(Some(area)) => Some(area),
            Ok(None) => {
                tracing::info!(location = %query, "location not found");
                None
            }
            Err(e) => {
                tracing::warn!(location = %query, error = %e, "geocoding failed, caching as not found");
                None
            }
        };
        self.cache.insert(query, CacheEntry::from(outcome));
        outcome
    }

    /// Upfront pass over every distinct LocationKey in `rows`.
    pub fn resolve_all(&mut self, rows: &[Row]) -> ResolveSummary {
        let keys: BTreeSet<LocationKey> = rows.iter().map(Row::location_key).collect();
        let mut summary = ResolveSummary {
            distinct: keys.len(),
            ..ResolveSummary::default()
        };
        for key in &keys {
            if !self.cache.contains(&key.query()) && !self.offline {
                summary.queried += 1;
            }
            match self.resolve(key) {
                Some(_) => summary.resolved += 1,
                None => summary.not_found += 1,
            }
        }
        tracing::info!(
            distinct = summary.distinct,
            resolved = summary.resolved,
            not_found = summary.not_found,
            queried = summary.queried,
            "location pass complete"
        );
        summary
    }

    /// Pure cache read; never geocodes.
    pub fn lookup(&self, key: &LocationKey) -> Option<ResolvedArea> {
        self.cache.get(&key.query()).and_then(CacheEntry::as_found).copied()
    }

    /// Forget one key so the next pass geocodes it again.
    pub fn purge(&mut self, key: &str) -> bool {
        self.cache.remove(key)
    }

    pub fn save(&mut self) -> Result<()> {
        self.cache.save()
    }

    pub fn cache(&self) -> &DiskBackedCache<ResolvedArea> {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::types::{BoundingBox, Coordinate, LocationError};
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    struct CountingGeocoder {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl Geocoder for CountingGeocoder {
        fn geocode(&self, query: &str) -> std::result::Result<Option<ResolvedArea>, LocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LocationError::Network("offline".into()));
            }
            if query.starts_with("Nowhere") {
                return Ok(None);
            }
            Ok(Some(ResolvedArea::new(
                Coordinate::new(1.0, 2.0),
                BoundingBox { min_lat: 0.5, max_lat: 1.5, min_lon: 1.5, max_lon: 2.5 },
            )))
        }
    }

    fn fast() -> RateQuota {
        RateQuota::new(std::num::NonZeroU32::new(1000).unwrap(), Duration::from_millis(1))
    }

    fn resolver(dir: &TempDir, fail: bool) -> (LocationResolver, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let geocoder = CountingGeocoder { calls: calls.clone(), fail };
        let r = LocationResolver::open(Box::new(geocoder), dir.path().join("gps_cache.json"), FlushPolicy::EndOfBatch)
            .with_quota(fast());
        (r, calls)
    }

    fn row(suburb: &str, location: &str) -> Row {
        Row::new(location, suburb, "Victoria", "Australia", NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(), None)
    }

    #[test]
    fn test_resolve_twice_geocodes_once() {
        let dir = TempDir::new().unwrap();
        let (mut r, calls) = resolver(&dir, false);
        let key = LocationKey::new("Fitzroy", "Victoria", "Australia");
        assert!(r.resolve(&key).is_some());
        assert!(r.resolve(&key).is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_not_found_is_cached() {
        let dir = TempDir::new().unwrap();
        let (mut r, calls) = resolver(&dir, false);
        let key = LocationKey::new("Nowhere", "X", "Y");
        assert!(r.resolve(&key).is_none());
        assert!(r.resolve(&key).is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(r.cache().get(&key.query()), Some(&CacheEntry::NotFound));
    }

    #[test]
    fn test_failure_is_cached_as_not_found() {
        let dir = TempDir::new().unwrap();
        let (mut r, calls) = resolver(&dir, true);
        let key = LocationKey::new("Fitzroy", "Victoria", "Australia");
        assert!(r.resolve(&key).is_none());
        assert!(r.resolve(&key).is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(r.purge(&key.query()));
        r.resolve(&key);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_resolve_all_dedupes_keys() {
        let dir = TempDir::new().unwrap();
        let (mut r, calls) = resolver(&dir, false);
        let rows = vec![row("Fitzroy", "A"), row("Fitzroy", "B"), row("Nowhere", "C")];
        let summary = r.resolve_all(&rows);
        assert_eq!(summary, ResolveSummary { distinct: 2, resolved: 1, not_found: 1, queried: 2 });
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(r.lookup(&rows[0].location_key()).is_some());
        assert!(r.lookup(&rows[2].location_key()).is_none());
    }

    #[test]
    fn test_lookup_never_geocodes() {
        let dir = TempDir::new().unwrap();
        let (r, calls) = resolver(&dir, false);
        assert!(r.lookup(&LocationKey::new("Fitzroy", "Victoria", "Australia")).is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_saved_cache_survives_restart() {
        let dir = TempDir::new().unwrap();
        let key = LocationKey::new("Fitzroy", "Victoria", "Australia");
        {
            let (mut r, _) = resolver(&dir, false);
            r.resolve(&key);
            r.save().unwrap();
        }
        let (mut r, calls) = resolver(&dir, false);
        assert!(r.resolve(&key).is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_offline_reads_cache_only() {
        let dir = TempDir::new().unwrap();
        let (mut r, calls) = resolver(&dir, false);
        r.set_offline(true);
        let key = LocationKey::new("Fitzroy", "Victoria", "Australia");
        assert!(r.resolve(&key).is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!r.cache().contains(&key.query()));
    }
}
