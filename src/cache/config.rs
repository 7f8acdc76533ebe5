//! Cache Configuration Module
//!
//! Per-instance cache settings and their partial-update form.

use serde::{Deserialize, Serialize};

use crate::cache::EvictionPolicy;
use crate::error::{CacheError, Result};

/// Default maximum number of entries
pub const DEFAULT_MAX_SIZE: usize = 100;

/// Default entry lifetime (5 minutes)
pub const DEFAULT_TTL_MS: u64 = 5 * 60 * 1000;

/// Default storage slot name for persisted snapshots
pub const DEFAULT_STORAGE_KEY: &str = "app-cache";

// == Cache Config ==
/// Settings for a single cache instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    /// Maximum number of entries held at once
    pub max_size: usize,
    /// Lifetime in milliseconds for entries set without an explicit TTL
    pub default_ttl: u64,
    /// Write a snapshot to storage after every mutation
    pub enable_persistence: bool,
    /// Storage slot the snapshot is written to
    pub storage_key: String,
    /// Which entries leave first when the cache is full
    pub eviction_policy: EvictionPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            default_ttl: DEFAULT_TTL_MS,
            enable_persistence: false,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            eviction_policy: EvictionPolicy::default(),
        }
    }
}

impl CacheConfig {
    /// Shallow-merges every field present in `patch`.
    pub fn merge(&mut self, patch: CacheConfigPatch) {
        if let Some(max_size) = patch.max_size {
            self.max_size = max_size;
        }
        if let Some(default_ttl) = patch.default_ttl {
            self.default_ttl = default_ttl;
        }
        if let Some(enable_persistence) = patch.enable_persistence {
            self.enable_persistence = enable_persistence;
        }
        if let Some(storage_key) = patch.storage_key {
            self.storage_key = storage_key;
        }
        if let Some(eviction_policy) = patch.eviction_policy {
            self.eviction_policy = eviction_policy;
        }
    }
}

// == Cache Config Patch ==
/// Partial configuration, every field optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheConfigPatch {
    pub max_size: Option<usize>,
    pub default_ttl: Option<u64>,
    pub enable_persistence: Option<bool>,
    pub storage_key: Option<String>,
    pub eviction_policy: Option<EvictionPolicy>,
}

impl CacheConfigPatch {
    /// Rejects values no cache can operate with.
    pub fn validate(&self) -> Result<()> {
        if self.max_size == Some(0) {
            return Err(CacheError::InvalidRequest(
                "maxSize must be greater than zero".to_string(),
            ));
        }
        if matches!(&self.storage_key, Some(key) if key.is_empty()) {
            return Err(CacheError::InvalidRequest(
                "storageKey cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.max_size, 100);
        assert_eq!(config.default_ttl, 300_000);
        assert!(!config.enable_persistence);
        assert_eq!(config.storage_key, "app-cache");
        assert_eq!(config.eviction_policy, EvictionPolicy::Lru);
    }

    #[test]
    fn test_merge_only_touches_present_fields() {
        let mut config = CacheConfig::default();
        config.merge(CacheConfigPatch {
            max_size: Some(5),
            eviction_policy: Some(EvictionPolicy::Lfu),
            ..Default::default()
        });

        assert_eq!(config.max_size, 5);
        assert_eq!(config.eviction_policy, EvictionPolicy::Lfu);
        assert_eq!(config.default_ttl, 300_000);
        assert_eq!(config.storage_key, "app-cache");
    }

    #[test]
    fn test_patch_deserializes_partial_json() {
        let patch: CacheConfigPatch = serde_json::from_str(r#"{"defaultTtl": 1000}"#).unwrap();
        assert_eq!(patch.default_ttl, Some(1000));
        assert!(patch.max_size.is_none());
    }

    #[test]
    fn test_patch_validation() {
        let zero = CacheConfigPatch {
            max_size: Some(0),
            ..Default::default()
        };
        assert!(zero.validate().is_err());

        let empty_key = CacheConfigPatch {
            storage_key: Some(String::new()),
            ..Default::default()
        };
        assert!(empty_key.validate().is_err());

        assert!(CacheConfigPatch::default().validate().is_ok());
    }
}
