//! TTL memoization of health index results keyed by station and variant.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;

use crate::formula::VariantId;
use crate::result::HealthIndexResult;
use crate::types::StationId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub station_id: StationId,
    pub variant: VariantId,
}

impl CacheKey {
    pub fn new(station_id: impl Into<StationId>, variant: VariantId) -> Self {
        Self {
            station_id: station_id.into(),
            variant,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub result: Arc<HealthIndexResult>,
    pub computed_at: DateTime<Utc>,
}

/// Backing store for [`ResultCache`]. `put` replaces a key's entry atomically.
pub trait ResultStore: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<CacheEntry>;
    fn put(&self, key: CacheKey, entry: CacheEntry);
    fn remove(&self, key: &CacheKey) -> Option<CacheEntry>;
    /// Drops every entry for which `keep` returns `false`. Returns how many went.
    fn retain(&self, keep: &dyn Fn(&CacheEntry) -> bool) -> usize;
    fn len(&self) -> usize;
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: DashMap<CacheKey, CacheEntry>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultStore for InMemoryStore {
    fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    fn put(&self, key: CacheKey, entry: CacheEntry) {
        self.entries.insert(key, entry);
    }

    fn remove(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.remove(key).map(|(_, e)| e)
    }

    fn retain(&self, keep: &dyn Fn(&CacheEntry) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| keep(entry));
        before.saturating_sub(self.entries.len())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

pub struct ResultCache {
    store: Arc<dyn ResultStore>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(store: Arc<dyn ResultStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn in_memory(ttl: Duration) -> Self {
        Self::new(Arc::new(InMemoryStore::new()), ttl)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now - entry.computed_at < self.ttl
    }

    /// Returns the cached result if it is younger than the TTL.
    pub fn get(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<Arc<HealthIndexResult>> {
        self.store
            .get(key)
            .filter(|entry| self.is_fresh(entry, now))
            .map(|entry| entry.result)
    }

    pub fn insert(&self, key: CacheKey, result: Arc<HealthIndexResult>, now: DateTime<Utc>) {
        self.store.put(
            key,
            CacheEntry {
                result,
                computed_at: now,
            },
        );
    }

    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.store.remove(key).is_some()
    }

    /// Evicts expired entries and returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        self.store.retain(&|entry| self.is_fresh(entry, now))
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
