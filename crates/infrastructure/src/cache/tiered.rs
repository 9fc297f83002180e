//! Two-tier cache for one cache kind
//!
//! Read path: L1 -> miss -> L2 -> miss -> return None. An L2 hit is copied
//! into L1 for no longer than the L2 entry has left, so the copy expires
//! with the original. Writes go to both tiers, invalidation clears both.

use std::{sync::Arc, time::Duration};

use application::{
    error::ApplicationError,
    ports::{CachePort, CacheStats},
};
use async_trait::async_trait;
use tracing::{debug, instrument};

use super::BoundedLru;

/// Tier 1 (optional, per process) in front of the shared Tier 2
pub struct TieredCache {
    kind: &'static str,
    l1: Option<BoundedLru<Vec<u8>>>,
    l2: Arc<dyn CachePort>,
    backfill_ttl: Duration,
}

impl std::fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("kind", &self.kind)
            .field("l1", &self.l1)
            .field("l2", &self.l2)
            .finish()
    }
}

impl TieredCache {
    /// Compose `l1` over `l2` for the cache kind `kind`
    ///
    /// `backfill_ttl` caps the lifetime of entries copied from L2 into L1,
    /// normally the kind's TTL. A copy never outlives its L2 entry.
    pub fn new(
        kind: &'static str,
        l1: Option<BoundedLru<Vec<u8>>>,
        l2: Arc<dyn CachePort>,
        backfill_ttl: Duration,
    ) -> Self {
        Self {
            kind,
            l1,
            l2,
            backfill_ttl,
        }
    }

    /// Cache kind label used in metrics
    pub const fn kind(&self) -> &'static str {
        self.kind
    }

    /// Tier 1, if enabled
    pub const fn l1(&self) -> Option<&BoundedLru<Vec<u8>>> {
        self.l1.as_ref()
    }

    /// Tier 2
    pub fn l2(&self) -> &Arc<dyn CachePort> {
        &self.l2
    }

    fn record_hit(&self, tier: &'static str) {
        metrics::counter!("querycache_cache_hits_total", "kind" => self.kind, "tier" => tier)
            .increment(1);
    }

    fn record_miss(&self) {
        metrics::counter!("querycache_cache_misses_total", "kind" => self.kind).increment(1);
    }
}

#[async_trait]
impl CachePort for TieredCache {
    #[instrument(skip(self), level = "debug", fields(kind = self.kind))]
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, ApplicationError> {
        Ok(self.get_bytes_with_ttl(key).await?.map(|(value, _)| value))
    }

    #[instrument(skip(self), level = "debug", fields(kind = self.kind))]
    async fn get_bytes_with_ttl(
        &self,
        key: &str,
    ) -> Result<Option<(Vec<u8>, Duration)>, ApplicationError> {
        if let Some(hit) = self.l1.as_ref().and_then(|l1| l1.get_with_ttl(key)) {
            debug!(key, "L1 cache hit");
            self.record_hit("l1");
            return Ok(Some(hit));
        }

        if let Some((value, left)) = self.l2.get_bytes_with_ttl(key).await? {
            let ttl = left.min(self.backfill_ttl);
            debug!(key, ttl = ?ttl, "L2 cache hit, backfilling L1");
            if let Some(l1) = &self.l1 {
                l1.put(key, value.clone(), ttl);
            }
            self.record_hit("l2");
            return Ok(Some((value, left)));
        }

        debug!(key, "Cache miss (both layers)");
        self.record_miss();
        Ok(None)
    }

    #[instrument(skip(self, value), level = "debug", fields(kind = self.kind))]
    async fn set_bytes(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), ApplicationError> {
        if let Some(l1) = &self.l1 {
            l1.put(key, value.clone(), ttl);
        }
        self.l2.set_bytes(key, value, ttl).await
    }

    #[instrument(skip(self), level = "debug", fields(kind = self.kind))]
    async fn invalidate(&self, key: &str) -> Result<(), ApplicationError> {
        if let Some(l1) = &self.l1 {
            l1.remove(key);
        }
        self.l2.invalidate(key).await
    }

    #[instrument(skip(self), level = "debug", fields(kind = self.kind))]
    async fn invalidate_pattern(&self, pattern: &str) -> Result<u64, ApplicationError> {
        let l1_count = match (&self.l1, pattern.strip_suffix('*')) {
            (Some(l1), Some(prefix)) => l1.remove_prefix(prefix),
            (Some(l1), None) => u64::from(l1.remove(pattern)),
            (None, _) => 0,
        };
        let l2_count = self.l2.invalidate_pattern(pattern).await?;

        // The tiers overlap, report the larger count
        Ok(l1_count.max(l2_count))
    }

    #[instrument(skip(self), level = "debug", fields(kind = self.kind))]
    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, ApplicationError> {
        let mut keys = self.l2.scan_keys(pattern).await?;
        if let Some(l1) = &self.l1 {
            match pattern.strip_suffix('*') {
                Some(prefix) => keys.extend(l1.keys_with_prefix(prefix)),
                None if l1.contains(pattern) => keys.push(pattern.to_string()),
                None => {},
            }
        }
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> Result<bool, ApplicationError> {
        if self.l1.as_ref().is_some_and(|l1| l1.contains(key)) {
            return Ok(true);
        }
        self.l2.exists(key).await
    }

    fn stats(&self) -> CacheStats {
        let l1 = self.l1.as_ref().map(|l1| l1.stats()).unwrap_or_default();
        let l2 = self.l2.stats();

        CacheStats {
            hits: l1.hits + l2.hits,
            // An L1 miss that hits L2 is not a miss overall
            misses: l2.misses,
            entries: l1.entries.max(l2.entries),
            memory_bytes: l1.memory_bytes + l2.memory_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{NullStore, RedbStore};

    const HOUR: Duration = Duration::from_secs(3600);

    fn tiered(l2: Arc<dyn CachePort>) -> TieredCache {
        TieredCache::new("answer", BoundedLru::with_capacity(2), l2, HOUR)
    }

    #[tokio::test]
    async fn write_through_reaches_both_tiers() {
        let l2: Arc<dyn CachePort> = Arc::new(RedbStore::in_memory().unwrap());
        let cache = tiered(Arc::clone(&l2));
        cache.set_bytes("answer:a", b"v".to_vec(), HOUR).await.unwrap();

        assert!(cache.l1().unwrap().contains("answer:a"));
        assert_eq!(l2.get_bytes("answer:a").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn l2_hit_backfills_l1() {
        let l2: Arc<dyn CachePort> = Arc::new(RedbStore::in_memory().unwrap());
        l2.set_bytes("answer:a", b"v".to_vec(), HOUR).await.unwrap();
        let cache = tiered(Arc::clone(&l2));

        assert!(!cache.l1().unwrap().contains("answer:a"));
        assert_eq!(cache.get_bytes("answer:a").await.unwrap(), Some(b"v".to_vec()));
        assert!(cache.l1().unwrap().contains("answer:a"));
    }

    #[tokio::test]
    async fn backfilled_copy_expires_with_the_l2_entry() {
        let l2: Arc<dyn CachePort> = Arc::new(RedbStore::in_memory().unwrap());
        l2.set_bytes("answer:a", b"v".to_vec(), Duration::from_millis(80))
            .await
            .unwrap();
        let cache = tiered(Arc::clone(&l2));

        assert_eq!(cache.get_bytes("answer:a").await.unwrap(), Some(b"v".to_vec()));
        assert!(cache.l1().unwrap().contains("answer:a"));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(l2.get_bytes("answer:a").await.unwrap(), None);
        assert_eq!(cache.get_bytes("answer:a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn backfill_is_capped_by_the_kind_ttl() {
        let l2: Arc<dyn CachePort> = Arc::new(RedbStore::in_memory().unwrap());
        l2.set_bytes("answer:a", b"v".to_vec(), HOUR).await.unwrap();
        let cache = TieredCache::new(
            "answer",
            BoundedLru::with_capacity(2),
            l2,
            Duration::from_secs(60),
        );

        cache.get_bytes("answer:a").await.unwrap();
        let (_, left) = cache.l1().unwrap().get_with_ttl("answer:a").unwrap();
        assert!(left <= Duration::from_secs(60));
    }

    #[tokio::test]
    async fn scan_merges_both_tiers() {
        let l2: Arc<dyn CachePort> = Arc::new(RedbStore::in_memory().unwrap());
        l2.set_bytes("retrieval-docs:d:1", Vec::new(), HOUR).await.unwrap();
        let cache = tiered(Arc::clone(&l2));
        cache.set_bytes("retrieval-docs:d:2", Vec::new(), HOUR).await.unwrap();
        cache.l1().unwrap().put("retrieval-docs:d:3", Vec::new(), HOUR);

        assert_eq!(
            cache.scan_keys("retrieval-docs:d:*").await.unwrap(),
            vec!["retrieval-docs:d:1", "retrieval-docs:d:2", "retrieval-docs:d:3"]
        );
    }

    #[tokio::test]
    async fn invalidate_clears_both_tiers() {
        let l2: Arc<dyn CachePort> = Arc::new(RedbStore::in_memory().unwrap());
        let cache = tiered(Arc::clone(&l2));
        cache.set_bytes("answer:a", b"v".to_vec(), HOUR).await.unwrap();
        cache.invalidate("answer:a").await.unwrap();

        assert_eq!(cache.get_bytes("answer:a").await.unwrap(), None);
        assert!(!l2.exists("answer:a").await.unwrap());
    }

    #[tokio::test]
    async fn pattern_invalidation_clears_l1_and_delegates() {
        let l2: Arc<dyn CachePort> = Arc::new(RedbStore::in_memory().unwrap());
        let cache = TieredCache::new("retrieval", BoundedLru::with_capacity(8), l2, HOUR);
        cache.set_bytes("retrieval:1", b"a".to_vec(), HOUR).await.unwrap();
        cache.set_bytes("retrieval:2", b"b".to_vec(), HOUR).await.unwrap();
        cache.set_bytes("answer:1", b"c".to_vec(), HOUR).await.unwrap();

        assert_eq!(cache.invalidate_pattern("retrieval:*").await.unwrap(), 2);
        assert!(!cache.exists("retrieval:1").await.unwrap());
        assert!(cache.exists("answer:1").await.unwrap());
    }

    #[tokio::test]
    async fn l1_alone_serves_when_l2_is_disabled() {
        let cache = tiered(Arc::new(NullStore));
        cache.set_bytes("answer:a", b"v".to_vec(), HOUR).await.unwrap();

        assert_eq!(cache.get_bytes("answer:a").await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn both_tiers_disabled_always_miss() {
        let cache = TieredCache::new("answer", None, Arc::new(NullStore), HOUR);
        cache.set_bytes("answer:a", b"v".to_vec(), HOUR).await.unwrap();

        assert_eq!(cache.get_bytes("answer:a").await.unwrap(), None);
        assert!(!cache.exists("answer:a").await.unwrap());
    }

    #[tokio::test]
    async fn zero_ttl_write_is_never_read_back() {
        let l2: Arc<dyn CachePort> = Arc::new(RedbStore::in_memory().unwrap());
        let cache = tiered(l2);
        cache.set_bytes("answer:a", b"v".to_vec(), HOUR).await.unwrap();
        cache
            .set_bytes("answer:a", b"w".to_vec(), Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(cache.get_bytes("answer:a").await.unwrap(), None);
    }
}
