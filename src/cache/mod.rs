//! Bounded caches with TTL expiry and LRU eviction
//!
//! Reads promote an entry to most-recently-used. When an insert would exceed
//! capacity, expired entries are purged first and only then is the
//! least-recently-used entry evicted. An expired entry is indistinguishable
//! from a miss.

use lru::LruCache;
use serde::Serialize;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

/// A cached value with its bookkeeping
#[derive(Debug, Clone)]
pub struct CacheEntry<K, V> {
    pub key: K,
    pub value: V,
    pub inserted_at: Instant,
    pub ttl: Duration,
    pub hit_count: u64,
}

impl<K, V> CacheEntry<K, V> {
    pub fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) >= self.ttl
    }
}

/// Counters for one cache instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub len: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

impl CacheStats {
    /// hits / (hits + misses), 0 before any lookup
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Inner<K: Hash + Eq, V> {
    entries: LruCache<K, CacheEntry<K, V>>,
    stats: CacheStats,
}

impl<K: Hash + Eq + Clone, V> Inner<K, V> {
    fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.entries.pop(key);
        }
        self.stats.expirations += expired.len() as u64;
        expired.len()
    }
}

/// Thread-safe TTL + LRU cache
pub struct TtlLruCache<K: Hash + Eq, V> {
    name: &'static str,
    default_ttl: Duration,
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> TtlLruCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create a cache holding at most `capacity` entries (at least one)
    pub fn new(name: &'static str, capacity: usize, default_ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            name,
            default_ttl,
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                stats: CacheStats::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.lock().entries.cap().get()
    }

    /// Look up a live entry, promoting it to most-recently-used
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.lock();
        let now = Instant::now();

        let expired = inner.entries.peek(key).map(|entry| entry.is_expired(now));
        let Some(expired) = expired else {
            inner.stats.misses += 1;
            return None;
        };
        if expired {
            inner.entries.pop(key);
            inner.stats.expirations += 1;
            inner.stats.misses += 1;
            return None;
        }

        let value = inner.entries.get_mut(key).map(|entry| {
            entry.hit_count += 1;
            entry.value.clone()
        });
        inner.stats.hits += 1;
        value
    }

    /// Insert with the cache's default TTL
    pub fn insert(&self, key: K, value: V) {
        self.insert_with_ttl(key, value, self.default_ttl);
    }

    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let mut inner = self.lock();
        let now = Instant::now();

        if !inner.entries.contains(&key) && inner.entries.len() >= inner.entries.cap().get() {
            let purged = inner.purge_expired(now);
            if purged == 0 && inner.entries.pop_lru().is_some() {
                inner.stats.evictions += 1;
                debug!("{} cache: evicted least-recently-used entry", self.name);
            }
        }

        let entry = CacheEntry {
            key: key.clone(),
            value,
            inserted_at: now,
            ttl,
            hit_count: 0,
        };
        inner.entries.put(key, entry);
    }

    /// Snapshot of an entry without promoting it or counting a lookup
    pub fn peek_entry(&self, key: &K) -> Option<CacheEntry<K, V>> {
        self.lock().entries.peek(key).cloned()
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.lock().entries.pop(key).map(|entry| entry.value)
    }

    /// Remove every entry, returning how many were dropped
    pub fn clear(&self) -> usize {
        let mut inner = self.lock();
        let dropped = inner.entries.len();
        inner.entries.clear();
        dropped
    }

    /// Drop expired entries now
    pub fn purge_expired(&self) -> usize {
        self.lock().purge_expired(Instant::now())
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            len: inner.entries.len(),
            ..inner.stats
        }
    }
}

impl<K: Hash + Eq, V> std::fmt::Debug for TtlLruCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlLruCache")
            .field("name", &self.name)
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_get_after_insert() {
        let cache = TtlLruCache::new("test", 4, HOUR);
        cache.insert("a", 1);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"b"), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.len, 1);
        assert!((stats.hit_rate() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_entry_expires() {
        let cache = TtlLruCache::new("test", 4, HOUR);
        cache.insert_with_ttl("a", 1, Duration::from_millis(20));
        sleep(Duration::from_millis(40));
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.stats().expirations, 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_lru_eviction() {
        let cache = TtlLruCache::new("test", 2, HOUR);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.get(&"b"), Some(2));
        assert_eq!(cache.get(&"c"), Some(3));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_access_promotes() {
        let cache = TtlLruCache::new("test", 2, HOUR);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.get(&"a"), Some(1));
        cache.insert("c", 3);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"b"), None);
    }

    #[test]
    fn test_expired_entries_evicted_before_lru() {
        let cache = TtlLruCache::new("test", 2, HOUR);
        cache.insert("a", 1);
        cache.insert_with_ttl("b", 2, Duration::from_millis(10));
        sleep(Duration::from_millis(30));
        cache.insert("c", 3);

        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"c"), Some(3));
        let stats = cache.stats();
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.expirations, 1);
    }

    #[test]
    fn test_hit_count_and_clear() {
        let cache = TtlLruCache::new("test", 2, HOUR);
        cache.insert("a", 1);
        cache.get(&"a");
        cache.get(&"a");
        assert_eq!(cache.peek_entry(&"a").map(|e| e.hit_count), Some(2));
        assert_eq!(cache.clear(), 1);
        assert_eq!(cache.get(&"a"), None);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let cache: TtlLruCache<&str, i32> = TtlLruCache::new("test", 0, HOUR);
        assert_eq!(cache.capacity(), 1);
    }
}
