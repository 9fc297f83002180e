//! Retrieval-result cache with a document reverse index
//!
//! Retrieval keys are digests of the query and its parameters, so they say
//! nothing about which documents a result contains. To evict precisely when
//! a document changes, every `put` also records `document_id → key` links:
//!
//! * in-process, for this replica's Tier 1
//! * in Tier 2, one key per link (`retrieval-docs:<document_id>:<key>`), so
//!   that any replica (or the operator CLI) can find keys written by another
//!   one
//!
//! Every shared link is its own write, so concurrent puts never overwrite
//! each other's links. Links carry the retrieval TTL; a link that outlives
//! its entry only costs a no-op delete.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, TimeDelta, Utc};
use domain::{CacheKey, DocumentId, Filters, RetrievalRecord, retrieval_key};
use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::ports::{CachePort, CachePortExt, prefix};

/// In-process link table is swept for expired links past this many documents
const LINK_SWEEP_THRESHOLD: usize = 4096;

type LinkTable = HashMap<DocumentId, HashMap<CacheKey, DateTime<Utc>>>;

/// Cache of similarity-search results keyed by (query, k, filters)
pub struct RetrievalCache {
    store: Arc<dyn CachePort>,
    links_store: Arc<dyn CachePort>,
    links: RwLock<LinkTable>,
    ttl: Duration,
}

impl std::fmt::Debug for RetrievalCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalCache")
            .field("ttl", &self.ttl)
            .field("linked_documents", &self.links.read().len())
            .finish_non_exhaustive()
    }
}

impl RetrievalCache {
    /// Create a retrieval cache
    ///
    /// `store` holds the records (usually Tier 1 → Tier 2); `links_store`
    /// holds the shared reverse index and should be the Tier-2 store alone.
    pub fn new(store: Arc<dyn CachePort>, links_store: Arc<dyn CachePort>, ttl: Duration) -> Self {
        Self {
            store,
            links_store,
            links: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Configured lifetime of new entries
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    fn storage_key(key: &CacheKey) -> String {
        key.namespaced(prefix::RETRIEVAL)
    }

    fn links_prefix(document_id: &DocumentId) -> String {
        format!("{}:{document_id}:", prefix::RETRIEVAL_DOCS)
    }

    fn link_key(document_id: &DocumentId, key: &CacheKey) -> String {
        format!("{}{}", Self::links_prefix(document_id), key.to_hex())
    }

    /// Look up a cached search result
    #[instrument(skip(self, query, filters))]
    pub async fn get(&self, query: &str, k: u32, filters: &Filters) -> Option<RetrievalRecord> {
        let key = retrieval_key(query, k, filters);
        let record = self.store.get_or_evict(&Self::storage_key(&key)).await;
        debug!(key = ?key, hit = record.is_some(), "Retrieval cache lookup");
        record
    }

    /// Store a search result and link it to every document it contains
    #[instrument(skip(self, query, record), fields(k = record.k, documents = record.documents.len()))]
    pub async fn put(&self, query: &str, record: &RetrievalRecord) -> CacheKey {
        let key = retrieval_key(query, record.k, &record.filters);
        if !self
            .store
            .put_soft(&Self::storage_key(&key), record, self.ttl)
            .await
        {
            return key;
        }

        let document_ids = record.document_ids();
        self.link_locally(&document_ids, key);
        for document_id in &document_ids {
            self.link_shared(document_id, key).await;
        }
        key
    }

    fn link_locally(&self, document_ids: &BTreeSet<DocumentId>, key: CacheKey) {
        let now = Utc::now();
        let expires = TimeDelta::from_std(self.ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut links = self.links.write();
        for document_id in document_ids {
            let keys = links.entry(document_id.clone()).or_default();
            keys.retain(|_, expiry| *expiry > now);
            keys.insert(key, expires);
        }
        if links.len() > LINK_SWEEP_THRESHOLD {
            links.retain(|_, keys| {
                keys.retain(|_, expiry| *expiry > now);
                !keys.is_empty()
            });
        }
    }

    async fn link_shared(&self, document_id: &DocumentId, key: CacheKey) {
        let link_key = Self::link_key(document_id, &key);
        if let Err(e) = self.links_store.set_bytes(&link_key, Vec::new(), self.ttl).await {
            warn!(key = %link_key, error = %e, "Failed to record document link");
        }
    }

    /// Retrieval keys linked to `document_id` in the shared store, with the
    /// link keys that recorded them
    async fn shared_links(&self, document_id: &DocumentId) -> Vec<(String, CacheKey)> {
        let prefix = Self::links_prefix(document_id);
        let link_keys = match self.links_store.scan_keys(&format!("{prefix}*")).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Failed to list document links");
                return Vec::new();
            },
        };

        // A longer document id sharing this prefix leaves a suffix that is
        // not a bare key, so it is skipped here
        link_keys
            .into_iter()
            .filter_map(|link_key| {
                let key = link_key.strip_prefix(&prefix)?.parse::<CacheKey>().ok()?;
                Some((link_key, key))
            })
            .collect()
    }

    /// Evict every cached result that contains `document_id`
    ///
    /// Returns the number of retrieval keys evicted.
    #[instrument(skip(self), fields(document_id = %document_id))]
    pub async fn invalidate_document(&self, document_id: &DocumentId) -> usize {
        let mut keys: BTreeSet<CacheKey> = self
            .links
            .write()
            .remove(document_id)
            .map(|linked| linked.into_keys().collect())
            .unwrap_or_default();

        for (link_key, key) in self.shared_links(document_id).await {
            keys.insert(key);
            if let Err(e) = self.links_store.invalidate(&link_key).await {
                warn!(key = %link_key, error = %e, "Failed to drop document link");
            }
        }

        for key in &keys {
            if let Err(e) = self.store.invalidate(&Self::storage_key(key)).await {
                warn!(key = ?key, error = %e, "Retrieval eviction failed");
            }
        }

        debug!(evicted = keys.len(), "Retrieval entries invalidated for document");
        keys.len()
    }

    /// Drop every retrieval entry and every document link
    #[instrument(skip(self))]
    pub async fn clear(&self) -> u64 {
        self.links.write().clear();

        let removed = match self
            .store
            .invalidate_pattern(&prefix::all(prefix::RETRIEVAL))
            .await
        {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "Retrieval cache clear failed");
                0
            },
        };
        if let Err(e) = self
            .links_store
            .invalidate_pattern(&prefix::all(prefix::RETRIEVAL_DOCS))
            .await
        {
            warn!(error = %e, "Document link clear failed");
        }

        info!(removed, "Retrieval cache cleared");
        removed
    }

    /// Number of documents with in-process links
    pub fn linked_documents(&self) -> usize {
        self.links.read().len()
    }
}
