//! Disabled Tier 2: every read misses, every write is dropped

use std::time::Duration;

use application::{
    error::ApplicationError,
    ports::{CachePort, CacheStats},
};
use async_trait::async_trait;

/// Store that remembers nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStore;

#[async_trait]
impl CachePort for NullStore {
    async fn get_bytes(&self, _key: &str) -> Result<Option<Vec<u8>>, ApplicationError> {
        Ok(None)
    }

    async fn get_bytes_with_ttl(
        &self,
        _key: &str,
    ) -> Result<Option<(Vec<u8>, Duration)>, ApplicationError> {
        Ok(None)
    }

    async fn set_bytes(
        &self,
        _key: &str,
        _value: Vec<u8>,
        _ttl: Duration,
    ) -> Result<(), ApplicationError> {
        Ok(())
    }

    async fn invalidate(&self, _key: &str) -> Result<(), ApplicationError> {
        Ok(())
    }

    async fn invalidate_pattern(&self, _pattern: &str) -> Result<u64, ApplicationError> {
        Ok(0)
    }

    async fn scan_keys(&self, _pattern: &str) -> Result<Vec<String>, ApplicationError> {
        Ok(Vec::new())
    }

    async fn exists(&self, _key: &str) -> Result<bool, ApplicationError> {
        Ok(false)
    }

    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }
}
