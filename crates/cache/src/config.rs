//! Cache sizing and lifetimes

use std::time::Duration;
use storegate_core::{
    Error, Result, CACHE_EVICTION_FRACTION, DEFAULT_CACHE_MAX_SIZE, DEFAULT_CACHE_STALE_TTL_MS,
    DEFAULT_CACHE_TTL_MS,
};

/// Configuration for a [`CacheStore`](crate::CacheStore)
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Maximum number of entries
    pub max_size: usize,
    /// Age up to which an entry is fresh
    pub ttl: Duration,
    /// Age up to which an entry may still be served as stale
    pub stale_ttl: Duration,
    /// Share of entries dropped when a new key arrives at capacity
    pub eviction_fraction: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_CACHE_MAX_SIZE,
            ttl: Duration::from_millis(DEFAULT_CACHE_TTL_MS),
            stale_ttl: Duration::from_millis(DEFAULT_CACHE_STALE_TTL_MS),
            eviction_fraction: CACHE_EVICTION_FRACTION,
        }
    }
}

impl CacheConfig {
    pub fn new(max_size: usize, ttl: Duration, stale_ttl: Duration) -> Result<Self> {
        let config = Self {
            max_size,
            ttl,
            stale_ttl,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(Error::configuration("cache max_size must be greater than 0"));
        }
        if self.stale_ttl < self.ttl {
            return Err(Error::configuration(
                "cache stale_ttl must not be shorter than ttl",
            ));
        }
        if !(self.eviction_fraction > 0.0 && self.eviction_fraction <= 1.0) {
            return Err(Error::configuration(
                "cache eviction_fraction must be within (0, 1]",
            ));
        }
        Ok(())
    }

    /// Entries dropped by one eviction pass over `len` entries
    pub(crate) fn eviction_count(&self, len: usize) -> usize {
        ((len as f64 * self.eviction_fraction).floor() as usize).max(1)
    }
}
