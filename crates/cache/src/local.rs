//! In-process read-through cache backed by DashMap for lock-free concurrent
//! access. Fronts Graph API reads, keyed by resource and date range.

use dashmap::DashMap;
use insights_core::types::DateRange;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// What was fetched, and for which window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub resource: String,
    pub range: Option<DateRange>,
}

impl CacheKey {
    pub fn new(resource: impl Into<String>, range: Option<DateRange>) -> Self {
        Self {
            resource: resource.into(),
            range,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.range {
            Some(range) => write!(f, "{}@{}", self.resource, range),
            None => f.write_str(&self.resource),
        }
    }
}

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// Size- and time-bounded cache. Clones share the same store.
pub struct ResponseCache<V> {
    store: Arc<DashMap<CacheKey, CacheEntry<V>>>,
    ttl: Duration,
    max_entries: usize,
}

impl<V> Clone for ResponseCache<V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            ttl: self.ttl,
            max_entries: self.max_entries,
        }
    }
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            store: Arc::new(DashMap::with_capacity(max_entries)),
            ttl,
            max_entries,
        }
    }

    pub fn from_secs(ttl_secs: u64, max_entries: usize) -> Self {
        Self::new(Duration::from_secs(ttl_secs), max_entries)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns None if expired or missing. Expired entries are dropped on read.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let Some(entry) = self.store.get(key) else {
            metrics::counter!("cache.miss").increment(1);
            return None;
        };
        if entry.inserted_at.elapsed() >= self.ttl {
            drop(entry);
            self.store.remove(key);
            metrics::counter!("cache.miss").increment(1);
            return None;
        }
        metrics::counter!("cache.hit").increment(1);
        debug!(key = %key, "Cache hit");
        Some(entry.value.clone())
    }

    /// Insert or replace. When full, expired entries are purged first; if
    /// the cache is still full a new key is not admitted.
    pub fn put(&self, key: CacheKey, value: V) {
        if self.store.len() >= self.max_entries && !self.store.contains_key(&key) {
            self.evict_expired();
            if self.store.len() >= self.max_entries {
                debug!(key = %key, "Cache full, skipping insert");
                return;
            }
        }
        self.store.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop everything. Called after any write to the ad account.
    pub fn invalidate_all(&self) -> usize {
        let dropped = self.store.len();
        self.store.clear();
        debug!(dropped, "Cache invalidated");
        dropped
    }

    /// Remove expired entries. Call this periodically from a background task.
    pub fn evict_expired(&self) -> usize {
        let before = self.store.len();
        self.store
            .retain(|_, entry| entry.inserted_at.elapsed() < self.ttl);
        before.saturating_sub(self.store.len())
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
