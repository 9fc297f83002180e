//! In-memory doubles shared by the service tests

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    error::ApplicationError,
    ports::{CachePort, CacheStats},
};

/// HashMap-backed store honouring TTLs
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Vec<u8>, Instant)>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn corrupt(&self, key: &str) {
        let far = Instant::now() + Duration::from_secs(3600);
        self.entries
            .lock()
            .insert(key.to_string(), (b"\xff\x00garbage".to_vec(), far));
    }
}

#[async_trait]
impl CachePort for MemoryCache {
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, ApplicationError> {
        Ok(self.get_bytes_with_ttl(key).await?.map(|(value, _)| value))
    }

    async fn get_bytes_with_ttl(
        &self,
        key: &str,
    ) -> Result<Option<(Vec<u8>, Duration)>, ApplicationError> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        match entries.get(key) {
            Some((value, expires)) if *expires > now => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some((value.clone(), *expires - now)))
            },
            Some(_) => {
                entries.remove(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            },
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            },
        }
    }

    async fn set_bytes(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), ApplicationError> {
        let mut entries = self.entries.lock();
        if ttl.is_zero() {
            entries.remove(key);
        } else {
            entries.insert(key.to_string(), (value, Instant::now() + ttl));
        }
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<(), ApplicationError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn invalidate_pattern(&self, pattern: &str) -> Result<u64, ApplicationError> {
        let stem = pattern.trim_end_matches('*');
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(stem));
        Ok((before - entries.len()) as u64)
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, ApplicationError> {
        let now = Instant::now();
        Ok(self
            .entries
            .lock()
            .iter()
            .filter(|(k, (_, expires))| {
                *expires > now
                    && pattern
                        .strip_suffix('*')
                        .map_or(k.as_str() == pattern, |stem| k.starts_with(stem))
            })
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn exists(&self, key: &str) -> Result<bool, ApplicationError> {
        Ok(self
            .entries
            .lock()
            .get(key)
            .is_some_and(|(_, expires)| *expires > Instant::now()))
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.lock().len() as u64,
            memory_bytes: 0,
        }
    }
}

/// Store whose every call fails
#[derive(Debug, Default)]
pub struct BrokenCache;

#[async_trait]
impl CachePort for BrokenCache {
    async fn get_bytes(&self, _key: &str) -> Result<Option<Vec<u8>>, ApplicationError> {
        Err(ApplicationError::ExternalService("store unreachable".into()))
    }

    async fn get_bytes_with_ttl(
        &self,
        _key: &str,
    ) -> Result<Option<(Vec<u8>, Duration)>, ApplicationError> {
        Err(ApplicationError::ExternalService("store unreachable".into()))
    }

    async fn set_bytes(
        &self,
        _key: &str,
        _value: Vec<u8>,
        _ttl: Duration,
    ) -> Result<(), ApplicationError> {
        Err(ApplicationError::ExternalService("store unreachable".into()))
    }

    async fn invalidate(&self, _key: &str) -> Result<(), ApplicationError> {
        Err(ApplicationError::ExternalService("store unreachable".into()))
    }

    async fn invalidate_pattern(&self, _pattern: &str) -> Result<u64, ApplicationError> {
        Err(ApplicationError::ExternalService("store unreachable".into()))
    }

    async fn scan_keys(&self, _pattern: &str) -> Result<Vec<String>, ApplicationError> {
        Err(ApplicationError::ExternalService("store unreachable".into()))
    }

    async fn exists(&self, _key: &str) -> Result<bool, ApplicationError> {
        Err(ApplicationError::ExternalService("store unreachable".into()))
    }

    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }
}

/// Shared [`MemoryCache`] that yields to the scheduler around every call,
/// so concurrent tasks interleave at each store round trip
#[derive(Debug, Clone, Default)]
pub struct YieldingCache(pub std::sync::Arc<MemoryCache>);

#[async_trait]
impl CachePort for YieldingCache {
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, ApplicationError> {
        tokio::task::yield_now().await;
        let value = self.0.get_bytes(key).await;
        tokio::task::yield_now().await;
        value
    }

    async fn get_bytes_with_ttl(
        &self,
        key: &str,
    ) -> Result<Option<(Vec<u8>, Duration)>, ApplicationError> {
        tokio::task::yield_now().await;
        let value = self.0.get_bytes_with_ttl(key).await;
        tokio::task::yield_now().await;
        value
    }

    async fn set_bytes(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), ApplicationError> {
        tokio::task::yield_now().await;
        self.0.set_bytes(key, value, ttl).await
    }

    async fn invalidate(&self, key: &str) -> Result<(), ApplicationError> {
        tokio::task::yield_now().await;
        self.0.invalidate(key).await
    }

    async fn invalidate_pattern(&self, pattern: &str) -> Result<u64, ApplicationError> {
        tokio::task::yield_now().await;
        self.0.invalidate_pattern(pattern).await
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, ApplicationError> {
        tokio::task::yield_now().await;
        let keys = self.0.scan_keys(pattern).await;
        tokio::task::yield_now().await;
        keys
    }

    async fn exists(&self, key: &str) -> Result<bool, ApplicationError> {
        tokio::task::yield_now().await;
        self.0.exists(key).await
    }

    fn stats(&self) -> CacheStats {
        self.0.stats()
    }
}
