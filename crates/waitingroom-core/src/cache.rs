//! Process-local TTL cache.
//!
//! Sits in front of hot shared-store reads. Each entry carries its own
//! expiry, so callers can mix a long positive TTL (value present in the
//! store) with a short negative TTL (value known absent). The cache never
//! talks to the store; the domain engine invalidates entries explicitly
//! after it mutates store state.
//!
//! # Thread Safety
//!
//! Entries live in a `RwLock<HashMap>`; request handlers and the admission
//! controller read and write concurrently. Reads may observe a value up to
//! its TTL stale, which the admission protocol tolerates by design.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// A string-keyed cache with per-entry TTLs.
pub struct TtlCache<V> {
    entries: RwLock<HashMap<String, Entry<V>>>,
}

impl<V> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> TtlCache<V> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<V: Clone> TtlCache<V> {
    /// Returns the live value for `key`, or `None` if absent or expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries
            .get(key)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.value.clone())
    }

    /// Returns whether `key` holds a live entry.
    pub fn exists(&self, key: &str) -> bool {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries
            .get(key)
            .is_some_and(|e| e.expires_at > Instant::now())
    }

    /// Stores `value` under `key` for `ttl`.
    ///
    /// Expired entries are swept on every write; the working set is one
    /// entry per active domain plus recently seen client ids, so the sweep
    /// stays cheap.
    pub fn set(&self, key: &str, value: V, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.retain(|_, e| e.expires_at > now);
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: now + ttl,
            },
        );
    }

    /// Removes `key`. Removing an absent key is a no-op.
    pub fn delete(&self, key: &str) {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.remove(key);
    }

    /// Number of live entries, for tests and debugging.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self
            .entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.values().filter(|e| e.expires_at > now).count()
    }

    /// Returns whether the cache holds no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
