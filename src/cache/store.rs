//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with policy-driven eviction,
//! TTL expiration and best-effort snapshot persistence.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::cache::entry::current_timestamp_ms;
use crate::cache::persistence::{LoadedSnapshot, Snapshot};
use crate::cache::{
    CacheConfig, CacheConfigPatch, CacheEntry, CacheStats, KeyPattern, PersistOutcome, Storage,
};
use crate::error::Result;

// == TTL Cache ==
/// Keyed cache with per-entry TTL, configurable eviction and hit/miss accounting.
///
/// All operations are synchronous and never fail the primary action because
/// of storage problems; the outcome of the snapshot write that follows each
/// mutation is reported as a [`PersistOutcome`].
#[derive(Debug)]
pub struct TtlCache<T> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<T>>,
    /// Performance statistics
    stats: CacheStats,
    /// Instance settings
    config: CacheConfig,
    /// Snapshot target, used when `config.enable_persistence` is set
    storage: Option<Arc<dyn Storage>>,
    /// Time of the last mutation (Unix milliseconds)
    last_updated: u64,
    /// Result of the last snapshot write
    last_persist: PersistOutcome,
    /// Monotonic touch counter
    sequence: u64,
}

impl<T> Default for TtlCache<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl<T> TtlCache<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    // == Constructors ==
    /// Creates an in-memory cache with no storage backend.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::new(),
            config,
            storage: None,
            last_updated: current_timestamp_ms(),
            last_persist: PersistOutcome::Disabled,
            sequence: 0,
        }
    }

    /// Creates a cache backed by `storage`.
    ///
    /// When persistence is enabled, a snapshot previously written under
    /// `config.storage_key` is loaded, skipping entries that have already
    /// expired. Unreadable snapshots are ignored.
    pub fn with_storage(config: CacheConfig, storage: Arc<dyn Storage>) -> Self {
        let mut cache = Self::new(config);
        cache.storage = Some(storage);
        if cache.config.enable_persistence {
            cache.load_persisted();
        }
        cache
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// A hit bumps the entry's access count and `last_accessed`. Expired
    /// entries are removed, counted as an eviction and reported as a miss.
    pub fn get(&mut self, key: &str) -> Option<T> {
        let now = current_timestamp_ms();
        let sequence = self.next_sequence();

        let value = match self.entries.get(key).map(|entry| entry.is_expired_at(now)) {
            Some(false) => self.entries.get_mut(key).map(|entry| {
                entry.touch(now, sequence);
                entry.data.clone()
            }),
            Some(true) => {
                self.entries.remove(key);
                self.stats.record_evictions(1);
                debug!(key, "Removed expired entry on read");
                None
            }
            None => None,
        };

        if value.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        self.commit(now);
        value
    }

    // == Set ==
    /// Stores a value, replacing any previous entry for the key.
    ///
    /// The new entry starts with zero accesses and fresh timestamps. When the
    /// key is new and the cache is full, entries are evicted first according
    /// to the configured policy.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `ttl` - Optional lifetime in milliseconds (uses `default_ttl` if None)
    pub fn set(&mut self, key: impl Into<String>, value: T, ttl: Option<u64>) -> PersistOutcome {
        let key = key.into();
        let now = current_timestamp_ms();

        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity() {
            self.evict(now);
        }

        let mut entry = CacheEntry::new(value, ttl.unwrap_or(self.config.default_ttl), now);
        entry.sequence = self.next_sequence();
        self.entries.insert(key, entry);

        self.commit(now)
    }

    // == Has ==
    /// Returns true if the key holds a live entry. Does not touch stats.
    pub fn has(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    // == Peek ==
    /// Returns the raw entry, expired or not, without touching stats.
    pub fn peek(&self, key: &str) -> Option<&CacheEntry<T>> {
        self.entries.get(key)
    }

    // == Delete ==
    /// Removes an entry by key. Not counted as an eviction.
    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.commit(current_timestamp_ms());
        }
        removed
    }

    // == Clear ==
    /// Removes every entry. Cumulative counters survive; only `size` resets.
    pub fn clear(&mut self) -> PersistOutcome {
        self.entries.clear();
        self.commit(current_timestamp_ms())
    }

    // == Invalidate ==
    /// Removes every key matched by `pattern`, counting each as an eviction.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate(&mut self, pattern: &KeyPattern) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !pattern.matches(key));
        let removed = before - self.entries.len();

        if removed > 0 {
            self.stats.record_evictions(removed);
            self.commit(current_timestamp_ms());
            debug!(removed, "Invalidated cache entries");
        }
        removed
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_size(self.entries.len());
        stats
    }

    /// Current settings.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // == Update Config ==
    /// Shallow-merges `patch` into the settings.
    ///
    /// Existing entries are left alone: shrinking `max_size` only takes
    /// effect on the next insert of a new key.
    pub fn update_config(&mut self, patch: CacheConfigPatch) -> Result<PersistOutcome> {
        patch.validate()?;
        self.config.merge(patch);
        Ok(self.commit(current_timestamp_ms()))
    }

    // == Preload ==
    /// Inserts keys that are not present yet, using the default TTL.
    ///
    /// No eviction happens here: once the cache reaches `max_size` the
    /// remaining input is skipped entirely. Returns the number inserted.
    pub fn preload<K, I>(&mut self, entries: I) -> usize
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, T)>,
    {
        let now = current_timestamp_ms();
        let mut inserted = 0;

        for (key, value) in entries {
            let key = key.into();
            if self.entries.contains_key(&key) {
                continue;
            }
            if self.entries.len() >= self.capacity() {
                debug!(inserted, "Preload stopped at capacity");
                break;
            }
            let mut entry = CacheEntry::new(value, self.config.default_ttl, now);
            entry.sequence = self.next_sequence();
            self.entries.insert(key, entry);
            inserted += 1;
        }

        if inserted > 0 {
            self.commit(now);
        }
        inserted
    }

    // == Export ==
    /// Serializes entries, stats and config to JSON.
    ///
    /// Entries are listed oldest-touched first.
    pub fn export(&self) -> Result<String> {
        self.snapshot_json(current_timestamp_ms())
    }

    // == Import ==
    /// Replaces entries and stats with those from an exported snapshot.
    ///
    /// Entries already expired are dropped and the snapshot's config is merged
    /// into the current one. On a parse error the cache is left untouched.
    /// Returns the number of entries restored.
    pub fn import(&mut self, data: &str) -> Result<usize> {
        let snapshot: LoadedSnapshot<T> = serde_json::from_str(data)?;
        snapshot.config.validate()?;

        let now = current_timestamp_ms();
        self.config.merge(snapshot.config);
        let restored = self.restore(snapshot.cache, snapshot.stats, now);
        self.commit(now);

        info!(restored, "Imported cache snapshot");
        Ok(restored)
    }

    // == Sweep Expired ==
    /// Removes all expired entries, counting each as an eviction.
    ///
    /// Returns the number of entries removed.
    pub fn sweep_expired(&mut self) -> usize {
        let now = current_timestamp_ms();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - self.entries.len();

        if removed > 0 {
            self.stats.record_evictions(removed);
            self.commit(now);
        }
        removed
    }

    // == Length ==
    /// Returns the current number of entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Time of the last mutation (Unix milliseconds).
    pub fn last_updated(&self) -> u64 {
        self.last_updated
    }

    /// Result of the snapshot write that followed the last mutation.
    pub fn last_persist_outcome(&self) -> &PersistOutcome {
        &self.last_persist
    }

    // == Internals ==
    fn capacity(&self) -> usize {
        self.config.max_size.max(1)
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    /// Evicts until one slot is free for a new key.
    fn evict(&mut self, now: u64) -> usize {
        self.evict_to(self.capacity() - 1, now)
    }

    /// Evicts in policy order until at most `target` entries remain.
    fn evict_to(&mut self, target: usize, now: u64) -> usize {
        let excess = self.entries.len().saturating_sub(target);
        if excess == 0 {
            return 0;
        }

        let victims = self
            .config
            .eviction_policy
            .eviction_order(self.entries.iter(), now);
        for key in victims.iter().take(excess) {
            self.entries.remove(key);
        }

        self.stats.record_evictions(excess);
        debug!(
            policy = %self.config.eviction_policy,
            evicted = excess,
            "Evicted entries over capacity"
        );
        excess
    }

    /// Installs restored entries in their listed order, dropping expired ones
    /// and evicting any excess over `max_size`.
    fn restore(
        &mut self,
        entries: Vec<(String, CacheEntry<T>)>,
        stats: Option<CacheStats>,
        now: u64,
    ) -> usize {
        self.entries.clear();
        for (key, mut entry) in entries {
            if entry.is_expired_at(now) {
                continue;
            }
            entry.sequence = self.next_sequence();
            self.entries.insert(key, entry);
        }
        if let Some(stats) = stats {
            self.stats = stats;
        }
        self.evict_to(self.capacity(), now);
        self.stats.set_size(self.entries.len());
        self.entries.len()
    }

    /// Bookkeeping shared by every mutation.
    fn commit(&mut self, now: u64) -> PersistOutcome {
        self.stats.set_size(self.entries.len());
        self.last_updated = now;
        let outcome = self.persist(now);
        self.last_persist = outcome.clone();
        outcome
    }

    fn persist(&self, now: u64) -> PersistOutcome {
        if !self.config.enable_persistence {
            return PersistOutcome::Disabled;
        }
        let Some(storage) = &self.storage else {
            return PersistOutcome::MemoryOnly {
                reason: "no storage backend configured".to_string(),
            };
        };

        let result = self
            .snapshot_json(now)
            .and_then(|payload| {
                storage
                    .write(&self.config.storage_key, &payload)
                    .map_err(Into::into)
            });

        match result {
            Ok(()) => PersistOutcome::Persisted,
            Err(err) => {
                warn!(
                    storage_key = %self.config.storage_key,
                    "Cache snapshot not persisted: {}", err
                );
                PersistOutcome::MemoryOnly {
                    reason: err.to_string(),
                }
            }
        }
    }

    fn load_persisted(&mut self) {
        let Some(storage) = self.storage.clone() else {
            return;
        };
        let key = self.config.storage_key.clone();

        let raw = match storage.read(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(err) => {
                warn!(storage_key = %key, "Could not read cache snapshot: {}", err);
                return;
            }
        };

        match serde_json::from_str::<LoadedSnapshot<T>>(&raw) {
            Ok(snapshot) => {
                let now = current_timestamp_ms();
                let restored = self.restore(snapshot.cache, snapshot.stats, now);
                self.last_updated = now;
                info!(storage_key = %key, restored, "Loaded persisted cache snapshot");
            }
            Err(err) => {
                warn!(storage_key = %key, "Ignoring unreadable cache snapshot: {}", err);
            }
        }
    }

    fn snapshot_json(&self, now: u64) -> Result<String> {
        let mut cache: Vec<(&String, &CacheEntry<T>)> = self.entries.iter().collect();
        cache.sort_by_key(|(_, entry)| entry.sequence);

        let stats = self.stats();
        let snapshot = Snapshot {
            cache,
            stats: &stats,
            config: &self.config,
            exported_at: now,
        };
        Ok(serde_json::to_string(&snapshot)?)
    }
}
