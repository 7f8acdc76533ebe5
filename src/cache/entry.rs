//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL and access metadata.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    /// The stored value
    pub data: T,
    /// Creation timestamp (Unix milliseconds)
    pub timestamp: u64,
    /// Time to live in milliseconds, measured from `timestamp`
    pub ttl: u64,
    /// Number of hits served from this entry
    pub access_count: u64,
    /// Last hit (or creation) timestamp (Unix milliseconds)
    pub last_accessed: u64,
    /// Touch order within the owning cache, breaks millisecond ties
    #[serde(skip)]
    pub(crate) sequence: u64,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Creates a fresh entry stamped at `now`.
    ///
    /// # Arguments
    /// * `data` - The value to store
    /// * `ttl` - Lifetime in milliseconds
    /// * `now` - Creation time in Unix milliseconds
    pub fn new(data: T, ttl: u64, now: u64) -> Self {
        Self {
            data,
            timestamp: now,
            ttl,
            access_count: 0,
            last_accessed: now,
            sequence: 0,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at the given instant.
    ///
    /// Boundary condition: the entry is expired once the full TTL has
    /// elapsed, i.e. `now - timestamp >= ttl`.
    pub fn is_expired_at(&self, now: u64) -> bool {
        now.saturating_sub(self.timestamp) >= self.ttl
    }

    /// Checks if the entry has expired right now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    // == Remaining Lifetime ==
    /// Returns `ttl - (now - timestamp)`, or zero once expired.
    ///
    /// Used by the `ttl` eviction policy to find the soonest-to-expire entry.
    pub fn remaining_ttl_at(&self, now: u64) -> u64 {
        let age = now.saturating_sub(self.timestamp);
        self.ttl.saturating_sub(age)
    }

    // == Touch ==
    /// Records a hit: bumps the access counter and refreshes `last_accessed`.
    pub fn touch(&mut self, now: u64, sequence: u64) {
        self.access_count += 1;
        self.last_accessed = now;
        self.sequence = sequence;
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
