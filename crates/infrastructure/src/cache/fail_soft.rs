//! Fail-soft wrapper for Tier-2 stores
//!
//! Every call runs under a deadline. A timeout or a backend error is logged,
//! counted and turned into the neutral answer for that operation (a miss, a
//! no-op, zero keys removed), so a dead store only costs latency.

use std::{
    future::Future,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use application::{
    error::ApplicationError,
    ports::{CachePort, CacheStats},
};
use async_trait::async_trait;
use tracing::warn;

/// Default per-operation deadline
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(250);

/// Store wrapper that never returns an error
#[derive(Debug)]
pub struct FailSoftStore<S> {
    inner: S,
    timeout: Duration,
    failures: AtomicU64,
}

impl<S: CachePort> FailSoftStore<S> {
    /// Wrap `inner`, bounding every operation by `timeout`
    pub const fn new(inner: S, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            failures: AtomicU64::new(0),
        }
    }

    /// Wrapped store
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    /// Per-operation deadline
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Operations absorbed so far (errors and timeouts)
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    async fn guarded<T, F>(&self, op: &'static str, key: &str, fallback: T, call: F) -> T
    where
        T: Send,
        F: Future<Output = Result<T, ApplicationError>> + Send,
    {
        let error = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => return value,
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {}ms", self.timeout.as_millis()),
        };

        self.failures.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("querycache_store_failures_total", "op" => op).increment(1);
        warn!(op, key, error = %error, "Cache store unavailable, failing soft");
        fallback
    }
}

#[async_trait]
impl<S: CachePort> CachePort for FailSoftStore<S> {
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, ApplicationError> {
        Ok(self.guarded("get", key, None, self.inner.get_bytes(key)).await)
    }

    async fn get_bytes_with_ttl(
        &self,
        key: &str,
    ) -> Result<Option<(Vec<u8>, Duration)>, ApplicationError> {
        Ok(self
            .guarded("get", key, None, self.inner.get_bytes_with_ttl(key))
            .await)
    }

    async fn set_bytes(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), ApplicationError> {
        self.guarded("set", key, (), self.inner.set_bytes(key, value, ttl))
            .await;
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<(), ApplicationError> {
        self.guarded("invalidate", key, (), self.inner.invalidate(key))
            .await;
        Ok(())
    }

    async fn invalidate_pattern(&self, pattern: &str) -> Result<u64, ApplicationError> {
        Ok(self
            .guarded("invalidate_pattern", pattern, 0, self.inner.invalidate_pattern(pattern))
            .await)
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, ApplicationError> {
        Ok(self
            .guarded("scan_keys", pattern, Vec::new(), self.inner.scan_keys(pattern))
            .await)
    }

    async fn exists(&self, key: &str) -> Result<bool, ApplicationError> {
        Ok(self.guarded("exists", key, false, self.inner.exists(key)).await)
    }

    fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RedbStore;

    /// Store whose every call hangs or fails
    #[derive(Debug)]
    enum Outage {
        Hang,
        Refuse,
    }

    #[async_trait]
    impl CachePort for Outage {
        async fn get_bytes(&self, _key: &str) -> Result<Option<Vec<u8>>, ApplicationError> {
            self.fail().await
        }

        async fn get_bytes_with_ttl(
            &self,
            _key: &str,
        ) -> Result<Option<(Vec<u8>, Duration)>, ApplicationError> {
            self.fail().await
        }

        async fn set_bytes(
            &self,
            _key: &str,
            _value: Vec<u8>,
            _ttl: Duration,
        ) -> Result<(), ApplicationError> {
            self.fail().await
        }

        async fn invalidate(&self, _key: &str) -> Result<(), ApplicationError> {
            self.fail().await
        }

        async fn invalidate_pattern(&self, _pattern: &str) -> Result<u64, ApplicationError> {
            self.fail().await
        }

        async fn scan_keys(&self, _pattern: &str) -> Result<Vec<String>, ApplicationError> {
            self.fail().await
        }

        async fn exists(&self, _key: &str) -> Result<bool, ApplicationError> {
            self.fail().await
        }

        fn stats(&self) -> CacheStats {
            CacheStats::default()
        }
    }

    impl Outage {
        async fn fail<T>(&self) -> Result<T, ApplicationError> {
            match self {
                Self::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(ApplicationError::Internal("unreachable".into()))
                },
                Self::Refuse => Err(ApplicationError::ExternalService(
                    "connection refused".into(),
                )),
            }
        }
    }

    #[tokio::test]
    async fn hanging_store_reads_as_miss() {
        let store = FailSoftStore::new(Outage::Hang, Duration::from_millis(20));

        assert_eq!(store.get_bytes("answer:a").await.unwrap(), None);
        assert!(!store.exists("answer:a").await.unwrap());
        store
            .set_bytes("answer:a", b"v".to_vec(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(store.failures(), 3);
    }

    #[tokio::test]
    async fn refusing_store_is_absorbed() {
        let store = FailSoftStore::new(Outage::Refuse, DEFAULT_STORE_TIMEOUT);

        assert_eq!(store.get_bytes("k").await.unwrap(), None);
        store.invalidate("k").await.unwrap();
        assert_eq!(store.invalidate_pattern("retrieval:*").await.unwrap(), 0);
        assert!(store.scan_keys("retrieval-docs:*").await.unwrap().is_empty());
        assert_eq!(store.get_bytes_with_ttl("k").await.unwrap(), None);
        assert_eq!(store.failures(), 5);
    }

    #[tokio::test]
    async fn healthy_store_passes_through() {
        let store = FailSoftStore::new(RedbStore::in_memory().unwrap(), DEFAULT_STORE_TIMEOUT);
        store
            .set_bytes("answer:a", b"v".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.get_bytes("answer:a").await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(store.failures(), 0);
        assert_eq!(store.stats().hits, 1);
    }
}
