//! Cache port definition
//!
//! Defines the byte-level storage interface every cache tier implements.
//! Implementations include the in-process LRU, the embedded redb store,
//! Redis, and the fail-soft and tiered wrappers composed over them.

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::warn;

use crate::error::ApplicationError;

/// Cache port for storing and retrieving cached values
///
/// Implementations should be thread-safe and support async operations.
/// Values are stored as raw bytes - callers handle serialization.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CachePort: Send + Sync + std::fmt::Debug {
    /// Get a cached value by key
    ///
    /// Returns `None` if the key doesn't exist or has expired.
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, ApplicationError>;

    /// Get a cached value together with the lifetime it has left
    ///
    /// Copies made from the result (e.g. a Tier 1 backfill) must not be
    /// given more than the returned duration.
    async fn get_bytes_with_ttl(
        &self,
        key: &str,
    ) -> Result<Option<(Vec<u8>, Duration)>, ApplicationError>;

    /// Set a cached value with a time-to-live
    ///
    /// If the key already exists, its value and TTL are replaced. A zero TTL
    /// stores nothing (the entry would already be expired).
    async fn set_bytes(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), ApplicationError>;

    /// Invalidate (delete) a single cache entry
    async fn invalidate(&self, key: &str) -> Result<(), ApplicationError>;

    /// Invalidate all cache entries matching a pattern
    ///
    /// Patterns are a literal prefix followed by `*` (e.g. `retrieval:*`);
    /// a pattern without `*` matches only the exact key.
    async fn invalidate_pattern(&self, pattern: &str) -> Result<u64, ApplicationError>;

    /// List the live keys matching a pattern (same syntax as
    /// [`invalidate_pattern`](Self::invalidate_pattern))
    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, ApplicationError>;

    /// Check if a key exists in the cache (without deserializing)
    async fn exists(&self, key: &str) -> Result<bool, ApplicationError>;

    /// Get cache statistics (hits, misses, size)
    fn stats(&self) -> CacheStats;
}

/// Extension trait for typed cache operations
///
/// Provides convenient typed get/set methods on top of the raw byte interface.
#[async_trait]
pub trait CachePortExt: CachePort {
    /// Get a typed value from cache
    async fn get<T>(&self, key: &str) -> Result<Option<T>, ApplicationError>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        match self.get_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Set a typed value in cache
    async fn set<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), ApplicationError>
    where
        T: serde::Serialize + Send + Sync,
    {
        let bytes = serde_json::to_vec(value)?;
        self.set_bytes(key, bytes, ttl).await
    }

    /// Get a typed value, evicting a payload that no longer decodes
    ///
    /// A corrupt entry reads as absent so the next writer replaces it.
    /// Store errors are returned to the caller.
    async fn try_get_or_evict<T>(&self, key: &str) -> Result<Option<T>, ApplicationError>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        let Some(bytes) = self.get_bytes(key).await? else {
            return Ok(None);
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key, error = %e, "Corrupt cache entry, evicting");
                metrics::counter!("querycache_corrupt_entries_total").increment(1);
                if let Err(e) = self.invalidate(key).await {
                    warn!(key, error = %e, "Failed to evict corrupt cache entry");
                }
                Ok(None)
            },
        }
    }

    /// Get a typed value, treating every failure as a miss
    ///
    /// Like [`try_get_or_evict`](Self::try_get_or_evict), with store errors
    /// logged and reported as a miss.
    async fn get_or_evict<T>(&self, key: &str) -> Option<T>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        self.try_get_or_evict(key).await.unwrap_or_else(|e| {
            warn!(key, error = %e, "Cache read failed, treating as miss");
            None
        })
    }

    /// Set a typed value, logging instead of failing
    ///
    /// Returns whether the write was accepted by the store.
    async fn put_soft<T>(&self, key: &str, value: &T, ttl: Duration) -> bool
    where
        T: serde::Serialize + Send + Sync,
    {
        match self.set(key, value, ttl).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "Cache write failed, skipping");
                false
            },
        }
    }
}

// Blanket implementation for all CachePort implementors
impl<T: CachePort + ?Sized> CachePortExt for T {}

/// Cache statistics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Current number of entries
    pub entries: u64,
    /// Approximate memory usage in bytes
    pub memory_bytes: u64,
}

impl CacheStats {
    /// Calculate the hit rate as a percentage (0.0 - 1.0)
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            // Precision loss is acceptable for statistics display
            self.hits as f64 / total as f64
        }
    }
}

/// Default TTL values per cache kind
pub mod ttl {
    use std::time::Duration;

    /// Generated answers (24 hours)
    pub const ANSWER: Duration = Duration::from_secs(24 * 60 * 60);

    /// Retrieval results (1 hour); document status changes independently
    pub const RETRIEVAL: Duration = Duration::from_secs(60 * 60);

    /// Conversation windows (1 hour of inactivity)
    pub const CONVERSATION: Duration = Duration::from_secs(60 * 60);
}

/// Storage key prefixes, one per cache kind sharing the Tier-2 store
pub mod prefix {
    /// Exact-match answers
    pub const ANSWER: &str = "answer";
    /// Retrieval results
    pub const RETRIEVAL: &str = "retrieval";
    /// Reverse index from document id to retrieval keys
    pub const RETRIEVAL_DOCS: &str = "retrieval-docs";
    /// Conversation windows
    pub const CONVERSATION: &str = "conversation";

    /// Pattern matching every key of one kind
    pub fn all(kind: &str) -> String {
        format!("{kind}:*")
    }
}
