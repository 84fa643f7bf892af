//! Rendition cache: (asset id, rendition kind) → resident file + revision tag.
//!
//! Entries go stale when they carry no revision tag or when a newer revision
//! has been observed for their asset. With a capacity set, the least recently
//! used entry is evicted on insert. Files of evicted or invalidated entries are
//! deleted best-effort.

mod path;

pub use path::entry_path;

use std::collections::HashMap;
use std::path::PathBuf;

use crate::model::{AssetId, RenditionKind};
use crate::storage::remove_quietly;

/// Result of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLookup {
    pub location: PathBuf,
    pub stale: bool,
}

#[derive(Debug)]
struct CacheEntry {
    location: PathBuf,
    revision: Option<String>,
    last_access: u64,
}

type CacheKey = (AssetId, RenditionKind);

#[derive(Debug, Default)]
pub struct RenditionCache {
    entries: HashMap<CacheKey, CacheEntry>,
    observed: HashMap<AssetId, String>,
    capacity: Option<usize>,
    tick: u64,
}

impl RenditionCache {
    /// `capacity` bounds the number of entries; `None` means unbounded.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            capacity: capacity.map(|c| c.max(1)),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn is_stale(&self, id: &AssetId, entry: &CacheEntry) -> bool {
        match (&entry.revision, self.observed.get(id)) {
            (None, _) => true,
            (Some(rev), Some(latest)) => rev != latest,
            (Some(_), None) => false,
        }
    }

    /// Look up an entry and mark it as recently used.
    pub fn lookup(&mut self, id: &AssetId, kind: RenditionKind) -> Option<CacheLookup> {
        let tick = self.next_tick();
        let key = (id.clone(), kind);
        let entry = self.entries.get_mut(&key)?;
        entry.last_access = tick;
        let entry = &self.entries[&key];
        Some(CacheLookup {
            location: entry.location.clone(),
            stale: self.is_stale(id, entry),
        })
    }

    /// Whether bytes fetched at `revision` match the latest observed revision
    /// of `id`. Anything goes while nothing has been observed.
    pub fn is_current(&self, id: &AssetId, revision: Option<&str>) -> bool {
        match self.observed.get(id) {
            Some(latest) => revision == Some(latest.as_str()),
            None => true,
        }
    }

    /// Insert or replace an entry. A revision tag becomes the observed
    /// revision only for an asset with none observed yet. Returns the keys
    /// evicted to stay within capacity.
    pub fn store(
        &mut self,
        id: &AssetId,
        kind: RenditionKind,
        location: PathBuf,
        revision: Option<String>,
    ) -> Vec<(AssetId, RenditionKind)> {
        let tick = self.next_tick();
        if let Some(rev) = &revision {
            self.observed.entry(id.clone()).or_insert_with(|| rev.clone());
        }
        let previous = self.entries.insert(
            (id.clone(), kind),
            CacheEntry {
                location: location.clone(),
                revision,
                last_access: tick,
            },
        );
        if let Some(previous) = previous {
            if previous.location != location {
                remove_quietly(&previous.location);
            }
        }
        self.evict_to_capacity()
    }

    fn evict_to_capacity(&mut self) -> Vec<(AssetId, RenditionKind)> {
        let Some(capacity) = self.capacity else {
            return Vec::new();
        };
        let mut evicted = Vec::new();
        while self.entries.len() > capacity {
            let Some(key) = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_access)
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            if let Some(entry) = self.entries.remove(&key) {
                tracing::debug!(asset = %key.0, kind = %key.1, "evicting cached rendition");
                remove_quietly(&entry.location);
            }
            evicted.push(key);
        }
        evicted
    }

    /// Drop one entry and its file. Returns true if it existed.
    pub fn remove(&mut self, id: &AssetId, kind: RenditionKind) -> bool {
        match self.entries.remove(&(id.clone(), kind)) {
            Some(entry) => {
                remove_quietly(&entry.location);
                true
            }
            None => false,
        }
    }

    /// Drop every entry for `id`. Returns how many were removed.
    pub fn invalidate(&mut self, id: &AssetId) -> usize {
        let keys: Vec<CacheKey> = self
            .entries
            .keys()
            .filter(|(asset, _)| asset == id)
            .cloned()
            .collect();
        for key in &keys {
            if let Some(entry) = self.entries.remove(key) {
                remove_quietly(&entry.location);
            }
        }
        if !keys.is_empty() {
            tracing::debug!(asset = %id, entries = keys.len(), "cache entries invalidated");
        }
        keys.len()
    }

    /// Invalidate `id` and forget its observed revision (asset deleted or evicted).
    pub fn forget(&mut self, id: &AssetId) {
        self.invalidate(id);
        self.observed.remove(id);
    }

    /// Record the latest revision seen for `id`. Returns true if it differs
    /// from a previously observed one.
    pub fn observe_revision(&mut self, id: &AssetId, revision: &str) -> bool {
        match self.observed.insert(id.clone(), revision.to_string()) {
            Some(previous) => previous != revision,
            None => false,
        }
    }

    pub fn observed_revision(&self, id: &AssetId) -> Option<&str> {
        self.observed.get(id).map(String::as_str)
    }
}
