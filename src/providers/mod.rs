//! Place providers: the `PlaceSource` seam, its four HTTP implementations and
//! the caching, rate-limited `ProviderClient` wrapped around each of them.

pub mod foursquare;
pub mod google_places;
pub mod osm;
pub mod yelp;

use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use serde_json::Value;

use crate::cache::{CacheEntry, DiskBackedCache, FlushPolicy};
use crate::error::Result;
use crate::location::{Coordinate, LocationResolver, ResolvedArea};
use crate::place::{Prediction, RawPlace};
use crate::provider::Provider;
use crate::rate_limit::{RateLimiter, RateQuota};
use crate::row::Row;
use crate::rules;

pub use foursquare::FoursquareSource;
pub use google_places::GooglePlacesSource;
pub use osm::OverpassSource;
pub use yelp::YelpSource;

/// Provider query errors. A failed query leaves the row's slot empty.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Provider returned HTTP {0}")]
    Status(u16),
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

impl From<ureq::Error> for ProviderError {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::Status(code, _) => Self::Status(code),
            other => Self::Network(other.to_string()),
        }
    }
}

/// A remote place search. Implementations return raw candidates; matching
/// and caching happen in [`ProviderClient`].
pub trait PlaceSource: Send {
    fn provider(&self) -> Provider;

    /// Every place within `radius_m` metres of `center`.
    fn search_area(&self, center: Coordinate, radius_m: u32) -> std::result::Result<Vec<RawPlace>, ProviderError>;

    /// Candidates for `name` inside `area`, in the provider's ranking order.
    fn search_name(&self, area: &ResolvedArea, name: &str) -> std::result::Result<Vec<RawPlace>, ProviderError>;

    /// The place's display name.
    fn place_name<'a>(&self, place: &'a RawPlace) -> Option<&'a str> {
        place.str_field("name")
    }
}

pub(crate) fn http_agent() -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(10))
        .timeout_read(Duration::from_secs(60))
        .build()
}

/// Read a JSON body.
pub(crate) fn read_json(response: ureq::Response) -> std::result::Result<Value, ProviderError> {
    response
        .into_json()
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

/// Take the array under `field` as raw places. A missing field is a malformed
/// payload.
pub(crate) fn take_places(mut body: Value, field: &str) -> std::result::Result<Vec<RawPlace>, ProviderError> {
    match body.get_mut(field).map(Value::take) {
        Some(Value::Array(items)) => Ok(items.into_iter().map(RawPlace::new).collect()),
        Some(other) => Err(ProviderError::InvalidResponse(format!(
            "'{}' is not an array: {}",
            field, other
        ))),
        None => Err(ProviderError::InvalidResponse(format!("missing '{}'", field))),
    }
}

/// Strip the literal "Near " / "near " prefix sightings often carry.
pub fn clean_place_name(name: &str) -> &str {
    name.strip_prefix("Near ")
        .or_else(|| name.strip_prefix("near "))
        .unwrap_or(name)
}

/// Counts from one `fill_in_data` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillSummary {
    pub rows: usize,
    /// Answered from the cache.
    pub cached: usize,
    /// Queried because the row key was new.
    pub queried: usize,
    /// Rows whose slot ended up filled.
    pub found: usize,
    /// Queries that failed and were recorded as no match.
    pub failed: usize,
    /// Rows skipped because their area never resolved.
    pub unresolved: usize,
    /// Cache misses left empty because the client is offline.
    pub offline: usize,
}

/// One provider behind its own cache and rate limiters.
pub struct ProviderClient {
    source: Box<dyn PlaceSource>,
    cache: DiskBackedCache<RawPlace>,
    area_limiter: RateLimiter,
    name_limiter: RateLimiter,
    offline: bool,
}

impl ProviderClient {
    pub fn new(source: Box<dyn PlaceSource>, cache: DiskBackedCache<RawPlace>) -> Self {
        Self {
            source,
            cache,
            area_limiter: RateLimiter::new(RateQuota::provider_default()),
            name_limiter: RateLimiter::new(RateQuota::provider_default()),
            offline: false,
        }
    }

    /// Open `source`'s cache file under `cache_dir`.
    pub fn open(source: Box<dyn PlaceSource>, cache_dir: &Path, policy: FlushPolicy) -> Self {
        let path = cache_dir.join(source.provider().cache_file());
        Self::new(source, DiskBackedCache::load(path, policy))
    }

    pub fn with_quota(mut self, quota: RateQuota) -> Self {
        self.area_limiter = RateLimiter::new(quota);
        self.name_limiter = RateLimiter::new(quota);
        self
    }

    /// Offline, nothing goes over the network and misses are never cached.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    pub fn provider(&self) -> Provider {
        self.source.provider()
    }

    pub fn place_name<'a>(&self, place: &'a RawPlace) -> Option<&'a str> {
        self.source.place_name(place)
    }

    /// All places around a point. Uncached; used for ad-hoc prediction.
    /// Empty when offline.
    pub fn query_area(&self, center: Coordinate, radius_m: u32) -> std::result::Result<Vec<RawPlace>, ProviderError> {
        if self.offline {
            tracing::debug!(provider = %self.provider(), "offline, skipping area search");
            return Ok(Vec::new());
        }
        self.area_limiter.call(|| self.source.search_area(center, radius_m))
    }

    /// The first candidate whose name contains the cleaned `name`
    /// (case-sensitive). Other candidates never stand in for a match.
    /// A name that cleans to nothing matches nothing and is never sent.
    pub fn query_by_name(
        &self,
        area: &ResolvedArea,
        name: &str,
    ) -> std::result::Result<Option<RawPlace>, ProviderError> {
        let wanted = clean_place_name(name);
        if wanted.trim().is_empty() {
            tracing::debug!(provider = %self.provider(), name, "blank place name, not searching");
            return Ok(None);
        }
        if self.offline {
            return Ok(None);
        }
        let candidates = self.name_limiter.call(|| self.source.search_name(area, wanted))?;
        let hit = candidates
            .iter()
            .position(|c| self.source.place_name(c).is_some_and(|n| n.contains(wanted)));
        match hit {
            Some(i) => Ok(candidates.into_iter().nth(i)),
            None => {
                if let Some(first) = candidates.first() {
                    tracing::debug!(
                        provider = %self.provider(),
                        wanted,
                        closest = self.source.place_name(first).unwrap_or("?"),
                        "no candidate matched by name"
                    );
                }
                Ok(None)
            }
        }
    }

    /// Fill this provider's evidence slot on every row.
    ///
    /// Known row keys come from the cache. New ones are queried by name within
    /// the row's resolved area and the outcome is cached, failures included.
    /// Rows whose area never resolved are left empty and not cached, as are
    /// misses while offline. The cache is flushed once the pass is over.
    pub fn fill_in_data(&mut self, rows: &mut [Row], resolver: &LocationResolver) -> FillSummary {
        let provider = self.provider();
        let mut summary = FillSummary {
            rows: rows.len(),
            ..FillSummary::default()
        };

        for row in rows.iter_mut() {
            let key = row.row_key();
            let place = if let Some(entry) = self.cache.get(&key) {
                summary.cached += 1;
                entry.as_found().cloned()
            } else {
                let Some(area) = resolver.lookup(&row.location_key()) else {
                    summary.unresolved += 1;
                    row.evidence.set(provider, None);
                    continue;
                };
                if self.offline {
                    summary.offline += 1;
                    row.evidence.set(provider, None);
                    continue;
                }
                summary.queried += 1;
                let outcome = match self.query_by_name(&area, &row.location) {
                    Ok(place) => place,
                    Err(e) => {
                        tracing::warn!(%provider, row = %key, error = %e, "query failed, recording no match");
                        summary.failed += 1;
                        None
                    }
                };
                self.cache.insert(key, CacheEntry::from(outcome.clone()));
                outcome
            };
            if place.is_some() {
                summary.found += 1;
            }
            row.evidence.set(provider, place);
        }

        tracing::info!(
            %provider,
            rows = summary.rows,
            cached = summary.cached,
            queried = summary.queried,
            found = summary.found,
            failed = summary.failed,
            unresolved = summary.unresolved,
            offline = summary.offline,
            "provider pass complete"
        );
        if let Err(e) = self.cache.save() {
            tracing::warn!(%provider, error = %e, "failed to save provider cache");
        }
        summary
    }

    pub fn classify(&self, raw: &RawPlace, observed_at: NaiveDate, cutoff: NaiveDate) -> Vec<Prediction> {
        rules::classify(self.provider(), raw, observed_at, cutoff)
    }

    pub fn purge(&mut self, key: &str) -> bool {
        self.cache.remove(key)
    }

    pub fn save(&mut self) -> Result<()> {
        self.cache.save()
    }

    pub fn cache(&self) -> &DiskBackedCache<RawPlace> {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{BoundingBox, Geocoder, LocationError};
    use serde_json::json;
    use std::num::NonZeroU32;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct FakeSource {
        calls: Arc<AtomicUsize>,
        candidates: Vec<Value>,
        fail: bool,
    }

    impl PlaceSource for FakeSource {
        fn provider(&self) -> Provider {
            Provider::Yelp
        }

        fn search_area(&self, _: Coordinate, _: u32) -> std::result::Result<Vec<RawPlace>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.candidates.iter().cloned().map(RawPlace::new).collect())
        }

        fn search_name(&self, _: &ResolvedArea, _: &str) -> std::result::Result<Vec<RawPlace>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ProviderError::Status(500));
            }
            Ok(self.candidates.iter().cloned().map(RawPlace::new).collect())
        }
    }

    struct FixedGeocoder;

    impl Geocoder for FixedGeocoder {
        fn geocode(&self, query: &str) -> std::result::Result<Option<ResolvedArea>, LocationError> {
            if query.starts_with("Nowhere") {
                return Ok(None);
            }
            Ok(Some(ResolvedArea::around(Coordinate::new(-37.8, 144.96), 2000)))
        }
    }

    fn fast() -> RateQuota {
        RateQuota::new(NonZeroU32::new(1000).unwrap(), Duration::from_millis(1))
    }

    fn client(dir: &TempDir, candidates: Vec<Value>, fail: bool) -> (ProviderClient, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = FakeSource { calls: calls.clone(), candidates, fail };
        let c = ProviderClient::open(Box::new(source), dir.path(), FlushPolicy::EndOfBatch).with_quota(fast());
        (c, calls)
    }

    fn resolver(dir: &TempDir, rows: &[Row]) -> LocationResolver {
        let mut r = LocationResolver::open(Box::new(FixedGeocoder), dir.path().join("gps_cache.json"), FlushPolicy::EndOfBatch)
            .with_quota(fast());
        r.resolve_all(rows);
        r
    }

    fn row(suburb: &str, location: &str) -> Row {
        Row::new(location, suburb, "Victoria", "Australia", NaiveDate::from_ymd_opt(2022, 2, 2).unwrap(), None)
    }

    fn area() -> ResolvedArea {
        ResolvedArea::new(
            Coordinate::new(0.0, 0.0),
            BoundingBox { min_lat: -1.0, max_lat: 1.0, min_lon: -1.0, max_lon: 1.0 },
        )
    }

    #[test]
    fn test_clean_place_name() {
        assert_eq!(clean_place_name("Near Central Station"), "Central Station");
        assert_eq!(clean_place_name("near the pier"), "the pier");
        assert_eq!(clean_place_name("Nearby Cafe"), "Nearby Cafe");
        assert_eq!(clean_place_name("NEAR X"), "NEAR X");
    }

    #[test]
    fn test_query_by_name_substring_match() {
        let dir = TempDir::new().unwrap();
        let (c, _) = client(&dir, vec![json!({"name": "Other"}), json!({"name": "Big Burger Barn"})], false);
        let hit = c.query_by_name(&area(), "Near Burger Barn").unwrap().unwrap();
        assert_eq!(hit.str_field("name"), Some("Big Burger Barn"));
    }

    #[test]
    fn test_query_by_name_is_case_sensitive() {
        let dir = TempDir::new().unwrap();
        let (c, _) = client(&dir, vec![json!({"name": "burger barn"})], false);
        assert!(c.query_by_name(&area(), "Burger Barn").unwrap().is_none());
    }

    #[test]
    fn test_query_by_name_no_fallback_to_other_candidates() {
        let dir = TempDir::new().unwrap();
        let (c, _) = client(&dir, vec![json!({"name": "A"}), json!({"title": "Burger Barn"})], false);
        assert!(c.query_by_name(&area(), "Burger Barn").unwrap().is_none());
    }

    #[test]
    fn test_fill_in_data_caches_hits_and_misses() {
        let dir = TempDir::new().unwrap();
        let (mut c, calls) = client(&dir, vec![json!({"name": "Burger Barn"})], false);
        let mut rows = vec![row("Fitzroy", "Burger Barn"), row("Fitzroy", "Pizza Place"), row("Fitzroy", "Burger Barn")];
        let r = resolver(&dir, &rows);

        let summary = c.fill_in_data(&mut rows, &r);
        assert_eq!(summary.queried, 2);
        assert_eq!(summary.cached, 1);
        assert_eq!(summary.found, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(rows[0].evidence.yelp.is_some());
        assert!(rows[1].evidence.yelp.is_none());
        assert_eq!(c.cache().get(&rows[1].row_key()), Some(&CacheEntry::NotFound));

        c.fill_in_data(&mut rows, &r);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_fill_in_data_failure_degrades_to_empty_slot() {
        let dir = TempDir::new().unwrap();
        let (mut c, calls) = client(&dir, vec![], true);
        let mut rows = vec![row("Fitzroy", "Burger Barn")];
        let r = resolver(&dir, &rows);

        let summary = c.fill_in_data(&mut rows, &r);
        assert_eq!(summary.failed, 1);
        assert!(rows[0].evidence.yelp.is_none());
        c.fill_in_data(&mut rows, &r);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fill_in_data_skips_unresolved_area() {
        let dir = TempDir::new().unwrap();
        let (mut c, calls) = client(&dir, vec![json!({"name": "Burger Barn"})], false);
        let mut rows = vec![row("Nowhere", "Burger Barn")];
        let r = resolver(&dir, &rows);

        let summary = c.fill_in_data(&mut rows, &r);
        assert_eq!(summary.unresolved, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!c.cache().contains(&rows[0].row_key()));
    }

    #[test]
    fn test_fill_in_data_persists_after_pass() {
        let dir = TempDir::new().unwrap();
        let (mut c, _) = client(&dir, vec![json!({"name": "Burger Barn"})], false);
        let mut rows = vec![row("Fitzroy", "Burger Barn")];
        let r = resolver(&dir, &rows);
        c.fill_in_data(&mut rows, &r);

        let on_disk: DiskBackedCache<RawPlace> =
            DiskBackedCache::load(dir.path().join(Provider::Yelp.cache_file()), FlushPolicy::EndOfBatch);
        assert!(on_disk.get(&rows[0].row_key()).is_some_and(|e| e.as_found().is_some()));
    }

    #[test]
    fn test_offline_never_queries_or_caches_misses() {
        let dir = TempDir::new().unwrap();
        let (mut c, calls) = client(&dir, vec![json!({"name": "Burger Barn"})], false);
        c.set_offline(true);
        let mut rows = vec![row("Fitzroy", "Burger Barn")];
        let r = resolver(&dir, &rows);

        let summary = c.fill_in_data(&mut rows, &r);
        assert_eq!(summary.offline, 1);
        assert_eq!(summary.queried, 0);
        assert!(rows[0].evidence.yelp.is_none());
        assert!(!c.cache().contains(&rows[0].row_key()));
        assert!(c.query_area(Coordinate::new(-37.8, 144.96), 150).unwrap().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        c.set_offline(false);
        c.fill_in_data(&mut rows, &r);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(rows[0].evidence.yelp.is_some());
    }

    #[test]
    fn test_blank_name_is_never_searched() {
        let dir = TempDir::new().unwrap();
        let (mut c, calls) = client(&dir, vec![json!({"name": "Anything"})], false);
        assert!(c.query_by_name(&area(), "Near ").unwrap().is_none());

        let mut rows = vec![row("Fitzroy", "Near ")];
        let r = resolver(&dir, &rows);
        let summary = c.fill_in_data(&mut rows, &r);
        assert_eq!(summary.found, 0);
        assert!(rows[0].evidence.yelp.is_none());
        assert_eq!(c.cache().get(&rows[0].row_key()), Some(&CacheEntry::NotFound));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_take_places_requires_field() {
        assert_eq!(take_places(json!({"results": [{"name": "a"}]}), "results").unwrap().len(), 1);
        assert!(matches!(take_places(json!({}), "results"), Err(ProviderError::InvalidResponse(_))));
        assert!(take_places(json!({"results": "x"}), "results").is_err());
    }
}
