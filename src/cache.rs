//! File-backed lookup cache shared by the geocoder and every place provider.
//!
//! The whole map is read at batch start, mutated in memory and written back as
//! pretty JSON. Both outcomes of a lookup are stored: a hit as `Found`, a miss
//! (or a failed call) as `NotFound`, so a key is never queried twice.
//!
//! Only one process may write a given cache file at a time; two concurrent
//! batches against the same file race and the last writer wins.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Two-outcome cache value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheEntry<V> {
    Found(V),
    NotFound,
}

impl<V> CacheEntry<V> {
    pub fn as_found(&self) -> Option<&V> {
        match self {
            Self::Found(v) => Some(v),
            Self::NotFound => None,
        }
    }

    pub fn into_found(self) -> Option<V> {
        match self {
            Self::Found(v) => Some(v),
            Self::NotFound => None,
        }
    }
}

impl<V> From<Option<V>> for CacheEntry<V> {
    fn from(value: Option<V>) -> Self {
        match value {
            Some(v) => Self::Found(v),
            None => Self::NotFound,
        }
    }
}

/// When the in-memory map is written back to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushPolicy {
    /// Only on an explicit [`DiskBackedCache::save`].
    EndOfBatch,
    /// Additionally after every `n` inserts, bounding what a crash can lose.
    EveryInserts(usize),
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self::EveryInserts(25)
    }
}

pub struct DiskBackedCache<V> {
    path: PathBuf,
    entries: BTreeMap<String, CacheEntry<V>>,
    policy: FlushPolicy,
    unsaved: usize,
}

impl<V> DiskBackedCache<V>
where
    V: Serialize + DeserializeOwned,
{
    /// Load the cache at `path`. A missing file starts empty; an unreadable
    /// one is logged and also starts empty.
    pub fn load(path: impl Into<PathBuf>, policy: FlushPolicy) -> Self {
        let path = path.into();
        let entries = Self::read_file(&path).unwrap_or_default();
        tracing::debug!(path = %path.display(), entries = entries.len(), "loaded cache");
        Self {
            path,
            entries,
            policy,
            unsaved: 0,
        }
    }

    fn read_file(path: &Path) -> Option<BTreeMap<String, CacheEntry<V>>> {
        let data = match fs::read_to_string(path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no cache found, starting a new one");
                return None;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read cache");
                return None;
            }
        };
        match serde_json::from_str(&data) {
            Ok(entries) => Some(entries),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "corrupt cache ignored");
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry<V>> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Record an outcome. May flush, depending on the policy; a failed
    /// intermediate flush is logged and retried at the next boundary.
    pub fn insert(&mut self, key: impl Into<String>, entry: CacheEntry<V>) {
        self.entries.insert(key.into(), entry);
        self.unsaved += 1;
        if let FlushPolicy::EveryInserts(n) = self.policy {
            if n > 0 && self.unsaved >= n {
                if let Err(e) = self.save() {
                    tracing::warn!(path = %self.path.display(), error = %e, "intermediate cache flush failed");
                }
            }
        }
    }

    /// Drop one key so the next batch queries it again.
    pub fn remove(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.unsaved += 1;
        }
        removed
    }

    /// Write the whole map to disk.
    pub fn save(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        self.unsaved = 0;
        Ok(())
    }

    pub fn unsaved(&self) -> usize {
        self.unsaved
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}
