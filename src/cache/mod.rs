//! Cache Module
//!
//! Provides in-memory caching with TTL expiration, policy-driven eviction
//! and best-effort snapshot persistence.

mod config;
mod entry;
mod pattern;
mod persistence;
mod policy;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use config::{
    CacheConfig, CacheConfigPatch, DEFAULT_MAX_SIZE, DEFAULT_STORAGE_KEY, DEFAULT_TTL_MS,
};
pub use entry::{current_timestamp_ms, CacheEntry};
pub use pattern::KeyPattern;
pub use persistence::{FileStorage, MemoryStorage, PersistOutcome, Storage};
pub use policy::EvictionPolicy;
pub use stats::CacheStats;
pub use store::TtlCache;
