//! Bounded in-process LRU cache (Tier 1)
//!
//! One mutex guards both the map and the recency list, so a reader can
//! never observe an order that disagrees with the contents. Entries carry
//! an absolute expiry and are purged lazily when touched.

use std::{
    num::NonZeroUsize,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use application::{
    error::ApplicationError,
    ports::{CachePort, CacheStats},
};
use async_trait::async_trait;
use chrono::Utc;
use domain::CacheEntry;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, instrument};

/// Default capacity per cache kind
pub const DEFAULT_CAPACITY: usize = 100;

/// Bounded LRU cache with per-entry TTL
pub struct BoundedLru<V> {
    inner: Mutex<LruCache<String, CacheEntry<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<V> std::fmt::Debug for BoundedLru<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("BoundedLru")
            .field("len", &inner.len())
            .field("capacity", &inner.cap())
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<V: Clone> BoundedLru<V> {
    /// Create a cache holding at most `capacity` entries
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Create a cache, or `None` when `capacity` is zero (tier disabled)
    pub fn with_capacity(capacity: usize) -> Option<Self> {
        NonZeroUsize::new(capacity).map(Self::new)
    }

    /// Look up a live entry, refreshing its recency
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Utc::now();
        let mut inner = self.inner.lock();

        if let Some(entry) = inner.get_mut(key) {
            if !entry.is_expired_at(now) {
                entry.record_hit();
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            inner.pop(key);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Look up a live entry with its remaining lifetime, refreshing recency
    pub fn get_with_ttl(&self, key: &str) -> Option<(V, Duration)> {
        let now = Utc::now();
        let mut inner = self.inner.lock();

        if let Some(entry) = inner.get_mut(key) {
            if let Some(left) = entry.remaining_ttl_at(now) {
                entry.record_hit();
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some((entry.value.clone(), left));
            }
            inner.pop(key);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Live keys starting with `prefix`, without touching recency
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let now = Utc::now();
        self.inner
            .lock()
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && !entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Whether a live entry exists, without touching recency or counters
    pub fn contains(&self, key: &str) -> bool {
        let now = Utc::now();
        self.inner
            .lock()
            .peek(key)
            .is_some_and(|entry| !entry.is_expired_at(now))
    }

    /// Insert or replace an entry
    ///
    /// A zero TTL removes any previous value and stores nothing. Inserting
    /// past capacity evicts the least recently used entry.
    pub fn put(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let mut inner = self.inner.lock();

        if ttl.is_zero() {
            inner.pop(&key);
            return;
        }

        let replacing = inner.contains(&key);
        let entry = CacheEntry::new(key.clone(), value, ttl);
        if let Some((evicted, _)) = inner.push(key, entry).filter(|_| !replacing) {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(key = %evicted, "Evicted least recently used entry");
        }
    }

    /// Remove an entry; returns whether it was present
    pub fn remove(&self, key: &str) -> bool {
        self.inner.lock().pop(key).is_some()
    }

    /// Remove every entry whose key starts with `prefix`
    pub fn remove_prefix(&self, prefix: &str) -> u64 {
        let mut inner = self.inner.lock();
        let doomed: Vec<String> = inner
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            inner.pop(key);
        }
        doomed.len() as u64
    }

    /// Drop every expired entry
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut inner = self.inner.lock();
        let expired: Vec<String> = inner
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            inner.pop(key);
        }
        expired.len()
    }

    /// Remove everything
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Current number of entries, including not yet purged expired ones
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.inner.lock().cap().get()
    }

    /// Entries evicted for capacity so far
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    fn counters(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

#[async_trait]
impl CachePort for BoundedLru<Vec<u8>> {
    #[instrument(skip(self))]
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, ApplicationError> {
        Ok(self.get(key))
    }

    async fn get_bytes_with_ttl(
        &self,
        key: &str,
    ) -> Result<Option<(Vec<u8>, Duration)>, ApplicationError> {
        Ok(self.get_with_ttl(key))
    }

    #[instrument(skip(self, value), fields(value_len = value.len()))]
    async fn set_bytes(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), ApplicationError> {
        self.put(key, value, ttl);
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<(), ApplicationError> {
        self.remove(key);
        Ok(())
    }

    async fn invalidate_pattern(&self, pattern: &str) -> Result<u64, ApplicationError> {
        Ok(match pattern.strip_suffix('*') {
            Some(prefix) => self.remove_prefix(prefix),
            None => u64::from(self.remove(pattern)),
        })
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, ApplicationError> {
        Ok(match pattern.strip_suffix('*') {
            Some(prefix) => self.keys_with_prefix(prefix),
            None if self.contains(pattern) => vec![pattern.to_string()],
            None => Vec::new(),
        })
    }

    async fn exists(&self, key: &str) -> Result<bool, ApplicationError> {
        Ok(self.contains(key))
    }

    fn stats(&self) -> CacheStats {
        let (hits, misses) = self.counters();
        let inner = self.inner.lock();
        let memory_bytes = inner
            .iter()
            .map(|(key, entry)| (key.len() + entry.value.len()) as u64)
            .sum();
        CacheStats {
            hits,
            misses,
            entries: inner.len() as u64,
            memory_bytes,
        }
    }
}
