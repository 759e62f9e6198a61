//! Least-recently-used cache used for query results.
//!
//! [`LruCache`] wraps [`lru::LruCache`] with the capacity semantics tables need: a
//! bounded cache evicts its least recently used entry once it grows past capacity, an
//! unbounded cache never evicts, and a cache bounded at `0` accepts writes but keeps
//! nothing.

use std::{fmt, hash::Hash, num::NonZeroUsize};
use tracing::trace;

use crate::config::CacheCapacity;

/// Hit, miss and eviction counters of a cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of lookups that found an entry
    pub hits: u64,
    /// Number of lookups that found nothing
    pub misses: u64,
    /// Number of entries dropped to stay within capacity
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// A map that forgets its least recently used entries.
pub struct LruCache<K: Hash + Eq, V> {
    inner: lru::LruCache<K, V>,
    capacity: CacheCapacity,
    stats: CacheStats,
}

impl<K: Hash + Eq, V> LruCache<K, V> {
    /// Creates an empty cache with the given capacity.
    pub fn new(capacity: CacheCapacity) -> Self {
        let inner = match capacity {
            CacheCapacity::Bounded(size) => match NonZeroUsize::new(size) {
                Some(size) => lru::LruCache::new(size),
                // Nothing is ever stored at zero capacity
                None => lru::LruCache::unbounded(),
            },
            CacheCapacity::Unbounded => lru::LruCache::unbounded(),
        };

        Self { inner, capacity, stats: CacheStats::default() }
    }

    /// Creates an empty cache that never evicts.
    pub fn unbounded() -> Self {
        Self::new(CacheCapacity::Unbounded)
    }

    /// Returns the configured capacity.
    pub fn capacity(&self) -> CacheCapacity {
        self.capacity
    }

    /// Looks up `key`, marking it as most recently used.
    ///
    /// A miss leaves the cache untouched.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        match self.inner.get(key) {
            Some(value) => {
                self.stats.hits += 1;
                Some(value)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Looks up `key`, falling back to `default` on a miss.
    pub fn get_or<'a>(&'a mut self, key: &K, default: &'a V) -> &'a V {
        self.get(key).unwrap_or(default)
    }

    /// Looks up `key` without touching its recency or the statistics.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.inner.peek(key)
    }

    /// Returns `true` if `key` is cached. Does not touch its recency.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.contains(key)
    }

    /// Inserts or replaces the value for `key` and marks it as most recently used.
    ///
    /// Inserting a new key into a full cache evicts the least recently used entry.
    pub fn set(&mut self, key: K, value: V) {
        if self.capacity == CacheCapacity::Bounded(0) {
            self.stats.evictions += 1;
            return;
        }

        let is_new = !self.inner.contains(&key);
        if self.inner.push(key, value).is_some() && is_new {
            self.stats.evictions += 1;
            trace!(target: "doctable::cache", len = self.inner.len(), "Evicted least recently used entry");
        }
    }

    /// Removes `key`, returning its value if it was cached.
    pub fn delete(&mut self, key: &K) -> Option<V> {
        self.inner.pop(key)
    }

    /// Removes every entry and forgets the recency order.
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Returns the number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterates over the cached entries from most to least recently used.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.inner.iter()
    }

    /// Iterates over the cached keys from most to least recently used.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.inner.iter().map(|(key, _)| key)
    }

    /// Returns the hit, miss and eviction counters.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

impl<K: Hash + Eq, V> Default for LruCache<K, V> {
    fn default() -> Self {
        Self::new(CacheCapacity::default())
    }
}

impl<K: Hash + Eq, V> fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("capacity", &self.capacity)
            .field("len", &self.inner.len())
            .field("stats", &self.stats)
            .finish()
    }
}
