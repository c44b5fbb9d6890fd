//! Bounded, priority-aware response cache

use crate::config::CacheConfig;
use crate::entry::{CacheEntry, CacheStats, CachedValue, Freshness};
use crate::eviction::select_victims;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use storegate_core::Priority;
use tokio::time::Instant;
use tracing::debug;

/// In-memory cache keyed by logical resource key
///
/// Every operation completes inside one critical section and never suspends.
pub struct CacheStore<V> {
    config: CacheConfig,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    hits: AtomicU64,
    stale_hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<V: Clone> CacheStore<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            stale_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up `key`
    ///
    /// Fresh entries are always returned. Stale entries are returned flagged
    /// when `allow_stale` is set and dropped otherwise. Expired entries are
    /// dropped.
    pub fn get(&self, key: &str, allow_stale: bool) -> Option<CachedValue<V>> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let freshness = match entries.get(key) {
            Some(entry) => entry.freshness(now, self.config.ttl, self.config.stale_ttl),
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "cache_miss");
                return None;
            }
        };

        let servable = match freshness {
            Freshness::Fresh => true,
            Freshness::Stale => allow_stale,
            Freshness::Expired => false,
        };

        if !servable {
            entries.remove(key);
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, ?freshness, "cache_entry_dropped");
            return None;
        }

        let entry = entries.get_mut(key)?;
        entry.access_count += 1;
        let stale = freshness == Freshness::Stale;
        if stale {
            entry.is_stale = true;
            self.stale_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        debug!(key = %key, stale, access_count = entry.access_count, "cache_hit");

        Some(CachedValue {
            value: entry.value.clone(),
            stale,
            age: entry.age(now),
        })
    }

    /// Insert or overwrite `key`
    ///
    /// Inserting a new key at capacity first evicts the lowest-scored share
    /// of the cache.
    pub fn set(&self, key: impl Into<String>, value: V, priority: Priority) {
        let key = key.into();
        let mut entries = self.entries.lock();

        if !entries.contains_key(&key) && entries.len() >= self.config.max_size {
            let count = self.config.eviction_count(entries.len());
            let victims = select_victims(entries.values(), count);
            for victim in &victims {
                entries.remove(victim);
            }
            self.evictions
                .fetch_add(victims.len() as u64, Ordering::Relaxed);
            debug!(evicted = victims.len(), remaining = entries.len(), "cache_eviction");
        }

        let entry = CacheEntry::new(key.clone(), value, priority);
        entries.insert(key, entry);
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    /// Drop every key starting with `prefix`, returning how many were dropped
    pub fn remove_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(prefix = %prefix, removed, "cache_invalidated");
        }
        removed
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        let removed = entries.len();
        entries.clear();
        debug!(removed, "cache_cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            stale_hits: self.stale_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl<V: Clone> Default for CacheStore<V> {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
