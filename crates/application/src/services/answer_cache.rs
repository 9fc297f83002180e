//! Exact-match answer cache

use std::{sync::Arc, time::Duration};

use domain::{AnswerRecord, CacheKey, exact_key};
use tracing::{debug, instrument};

use crate::{
    error::ApplicationError,
    ports::{CachePort, CachePortExt, prefix},
};

/// Answers keyed by the normalized query text
///
/// Backed by one tiered store (Tier 1 → Tier 2). Every failure of the store
/// is a miss or a skipped write; only [`AnswerCache::lookup_by_key`] reports
/// it.
#[derive(Debug, Clone)]
pub struct AnswerCache {
    store: Arc<dyn CachePort>,
    ttl: Duration,
}

impl AnswerCache {
    /// Create an answer cache over `store`
    pub fn new(store: Arc<dyn CachePort>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Configured lifetime of new entries
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Key an answer for `original_query` is stored under
    pub fn key_for(original_query: &str) -> CacheKey {
        exact_key(original_query)
    }

    fn storage_key(key: &CacheKey) -> String {
        key.namespaced(prefix::ANSWER)
    }

    /// Look up the answer for a query
    #[instrument(skip(self, original_query))]
    pub async fn get(&self, original_query: &str) -> Option<AnswerRecord> {
        self.get_by_key(&Self::key_for(original_query)).await
    }

    /// Look up an answer by key
    pub async fn get_by_key(&self, key: &CacheKey) -> Option<AnswerRecord> {
        let record = self.store.get_or_evict(&Self::storage_key(key)).await;
        debug!(key = ?key, hit = record.is_some(), "Answer cache lookup");
        record
    }

    /// Look up an answer by key, reporting store failures instead of
    /// reading them as a miss
    ///
    /// `Ok(None)` means the store answered and holds no live entry.
    pub async fn lookup_by_key(
        &self,
        key: &CacheKey,
    ) -> Result<Option<AnswerRecord>, ApplicationError> {
        self.store.try_get_or_evict(&Self::storage_key(key)).await
    }

    /// Store an answer and return the key it was stored under
    #[instrument(skip(self, original_query, record))]
    pub async fn put(&self, original_query: &str, record: &AnswerRecord) -> CacheKey {
        let key = Self::key_for(original_query);
        self.store
            .put_soft(&Self::storage_key(&key), record, self.ttl)
            .await;
        key
    }

    /// Remove the answer for a query
    pub async fn invalidate(&self, original_query: &str) {
        let key = Self::storage_key(&Self::key_for(original_query));
        if let Err(e) = self.store.invalidate(&key).await {
            tracing::warn!(key, error = %e, "Answer invalidation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use domain::{AnswerMode, DocumentId, SourceRef};

    use super::*;
    use crate::testing::{BrokenCache, MemoryCache};

    fn record(query: &str) -> AnswerRecord {
        AnswerRecord {
            answer: "Nhà thầu phải có tư cách hợp lệ".to_string(),
            sources: vec![SourceRef {
                document_id: DocumentId::new("luat-dau-thau").unwrap(),
                chunk_id: Some("c1".into()),
                score: 0.91,
            }],
            mode_used: AnswerMode::Balanced,
            latency_ms: 2_950,
            produced_at: Utc::now(),
            original_query: query.to_string(),
        }
    }

    #[tokio::test]
    async fn stored_answer_is_returned_for_normalized_query() {
        let cache = AnswerCache::new(Arc::new(MemoryCache::new()), Duration::from_secs(60));
        let query = "Điều kiện tham gia đấu thầu";
        let stored = record(query);
        cache.put(query, &stored).await;

        let hit = cache.get("  điều kiện tham gia đấu thầu ").await;
        assert_eq!(hit, Some(stored));
    }

    #[tokio::test]
    async fn entries_live_under_answer_prefix() {
        let store = Arc::new(MemoryCache::new());
        let cache = AnswerCache::new(store.clone(), Duration::from_secs(60));
        let key = cache.put("q", &record("q")).await;

        assert_eq!(store.keys(), vec![format!("answer:{}", key.to_hex())]);
    }

    #[tokio::test]
    async fn zero_ttl_is_never_returned() {
        let cache = AnswerCache::new(Arc::new(MemoryCache::new()), Duration::ZERO);
        cache.put("q", &record("q")).await;
        assert!(cache.get("q").await.is_none());
    }

    #[tokio::test]
    async fn corrupt_entry_is_a_miss_and_evicted() {
        let store = Arc::new(MemoryCache::new());
        let cache = AnswerCache::new(store.clone(), Duration::from_secs(60));
        let key = AnswerCache::key_for("q");
        store.corrupt(&key.namespaced("answer"));

        assert!(cache.get("q").await.is_none());
        assert!(store.keys().is_empty());
    }

    #[tokio::test]
    async fn broken_store_is_absorbed() {
        let cache = AnswerCache::new(Arc::new(BrokenCache), Duration::from_secs(60));
        cache.put("q", &record("q")).await;
        assert!(cache.get("q").await.is_none());
        cache.invalidate("q").await;
    }

    #[tokio::test]
    async fn keyed_lookup_separates_absence_from_outage() {
        let key = AnswerCache::key_for("q");

        let healthy = AnswerCache::new(Arc::new(MemoryCache::new()), Duration::from_secs(60));
        assert_eq!(healthy.lookup_by_key(&key).await.unwrap(), None);
        healthy.put("q", &record("q")).await;
        assert!(healthy.lookup_by_key(&key).await.unwrap().is_some());

        let broken = AnswerCache::new(Arc::new(BrokenCache), Duration::from_secs(60));
        assert!(broken.lookup_by_key(&key).await.is_err());
    }

    #[tokio::test]
    async fn invalidate_removes_answer() {
        let cache = AnswerCache::new(Arc::new(MemoryCache::new()), Duration::from_secs(60));
        cache.put("q", &record("q")).await;
        cache.invalidate("Q ").await;
        assert!(cache.get("q").await.is_none());
    }
}
