//! Cache entries and their lifecycle

use std::time::Duration;
use storegate_core::Priority;
use tokio::time::Instant;

/// Where an entry sits in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// `age <= ttl`
    Fresh,
    /// `ttl < age <= stale_ttl`
    Stale,
    /// `age > stale_ttl`
    Expired,
}

impl Freshness {
    pub fn classify(age: Duration, ttl: Duration, stale_ttl: Duration) -> Self {
        if age <= ttl {
            Freshness::Fresh
        } else if age <= stale_ttl {
            Freshness::Stale
        } else {
            Freshness::Expired
        }
    }
}

/// In-memory cache entry
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: String,
    /// Replaced on every write, never mutated in place
    pub value: V,
    pub written_at: Instant,
    pub access_count: u64,
    pub priority: Priority,
    /// Set once the entry has been served past its TTL
    pub is_stale: bool,
}

impl<V> CacheEntry<V> {
    pub fn new(key: impl Into<String>, value: V, priority: Priority) -> Self {
        Self {
            key: key.into(),
            value,
            written_at: Instant::now(),
            access_count: 0,
            priority,
            is_stale: false,
        }
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.written_at)
    }

    pub fn freshness(&self, now: Instant, ttl: Duration, stale_ttl: Duration) -> Freshness {
        Freshness::classify(self.age(now), ttl, stale_ttl)
    }

    /// Retention score; the lowest scores are evicted first
    pub fn score(&self) -> f64 {
        self.priority.weight() * (1.0 + self.access_count as f64)
    }
}

/// A value handed out by the cache
#[derive(Debug, Clone, PartialEq)]
pub struct CachedValue<V> {
    pub value: V,
    /// Served past its TTL
    pub stale: bool,
    pub age: Duration,
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub stale_hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.stale_hits;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }
}
