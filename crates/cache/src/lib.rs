//! Cache system for storegate
//!
//! This crate provides the two storage layers the gateway relies on:
//! - [`CacheStore`]: a bounded in-memory response cache with a
//!   fresh/stale/expired lifecycle and priority-weighted eviction
//! - [`KeyValueStore`]: a narrow durable store for session state, backed by
//!   memory or a single JSON file

pub mod config;
pub mod entry;
pub mod eviction;
pub mod storage;
pub mod store;

pub use config::CacheConfig;
pub use entry::{CacheEntry, CacheStats, CachedValue, Freshness};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use store::CacheStore;
