//! Eviction Policy Module
//!
//! Closed set of eviction strategies sharing one comparator.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cache::CacheEntry;
use crate::error::CacheError;

// == Eviction Policy ==
/// Chooses which entries leave first when the cache is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Least recently used: oldest `last_accessed` first
    #[default]
    Lru,
    /// Least frequently used: lowest `access_count` first
    Lfu,
    /// Soonest to expire: smallest remaining lifetime first
    Ttl,
}

impl EvictionPolicy {
    // == Compare ==
    /// Orders two entries so that the one to evict first sorts first.
    ///
    /// Ties fall back to touch order, oldest first.
    pub fn compare<T>(&self, a: &CacheEntry<T>, b: &CacheEntry<T>, now: u64) -> Ordering {
        let primary = match self {
            EvictionPolicy::Lru => a.last_accessed.cmp(&b.last_accessed),
            EvictionPolicy::Lfu => a.access_count.cmp(&b.access_count),
            EvictionPolicy::Ttl => a.remaining_ttl_at(now).cmp(&b.remaining_ttl_at(now)),
        };
        primary.then_with(|| a.sequence.cmp(&b.sequence))
    }

    // == Eviction Order ==
    /// Returns the keys of `entries` sorted from first-to-evict to last.
    pub fn eviction_order<'a, T, I>(&self, entries: I, now: u64) -> Vec<String>
    where
        T: 'a,
        I: IntoIterator<Item = (&'a String, &'a CacheEntry<T>)>,
    {
        let mut candidates: Vec<(&String, &CacheEntry<T>)> = entries.into_iter().collect();
        candidates.sort_by(|(_, a), (_, b)| self.compare(a, b, now));
        candidates.into_iter().map(|(key, _)| key.clone()).collect()
    }

    /// Lowercase name as used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionPolicy::Lru => "lru",
            EvictionPolicy::Lfu => "lfu",
            EvictionPolicy::Ttl => "ttl",
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvictionPolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lru" => Ok(EvictionPolicy::Lru),
            "lfu" => Ok(EvictionPolicy::Lfu),
            "ttl" => Ok(EvictionPolicy::Ttl),
            other => Err(CacheError::InvalidRequest(format!(
                "Unknown eviction policy '{}'",
                other
            ))),
        }
    }
}
