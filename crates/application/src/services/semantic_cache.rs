//! Approximate-match answer lookup
//!
//! The semantic index only holds pointers (`answer_key`) into the answer
//! cache. A pointer whose answer is missing is a miss. It is pruned only
//! when the answer store answered and the answer's lifetime has run out;
//! an unreachable store, or an answer dropped early by Tier 1, leaves the
//! pointer in place for the next lookup.

use std::sync::Arc;

use chrono::Utc;
use domain::{AnswerRecord, CacheKey, SemanticIndexEntry};
use tracing::{debug, instrument, warn};

use crate::{
    error::ApplicationError,
    ports::SemanticIndexPort,
    services::AnswerCache,
};

/// Default similarity a previous query must reach to be reused
pub const DEFAULT_THRESHOLD: f32 = 0.95;

/// Semantic cache over an embedding index and the answer cache
#[derive(Clone)]
pub struct SemanticCache {
    index: Option<Arc<dyn SemanticIndexPort>>,
    answers: AnswerCache,
    threshold: f32,
}

impl std::fmt::Debug for SemanticCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticCache")
            .field("enabled", &self.index.is_some())
            .field("entries", &self.index.as_ref().map(|i| i.len()))
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

impl SemanticCache {
    /// Create a semantic cache
    pub fn new(index: Arc<dyn SemanticIndexPort>, answers: AnswerCache, threshold: f32) -> Self {
        Self {
            index: Some(index),
            answers,
            threshold,
        }
    }

    /// A semantic cache that never hits and never records
    pub fn disabled(answers: AnswerCache) -> Self {
        Self {
            index: None,
            answers,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    /// Whether an index is attached
    pub fn is_enabled(&self) -> bool {
        self.index.is_some()
    }

    /// Number of indexed queries
    pub fn len(&self) -> usize {
        self.index.as_ref().map_or(0, |index| index.len())
    }

    /// Whether no query is indexed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find a cached answer for a query similar to `original_query`
    ///
    /// Fails only when `embedding` has a dimension other than the one the
    /// index was configured with.
    #[instrument(skip(self, embedding), fields(threshold = self.threshold))]
    pub async fn lookup(
        &self,
        original_query: &str,
        embedding: &[f32],
    ) -> Result<Option<AnswerRecord>, ApplicationError> {
        let Some(index) = &self.index else {
            return Ok(None);
        };

        let Some(found) = index.find_similar(embedding, self.threshold)? else {
            Self::record_miss();
            return Ok(None);
        };

        let answer_key = found.entry.answer_key;
        match self.answers.lookup_by_key(&answer_key).await {
            Ok(Some(record)) => {
                debug!(
                    similarity = found.similarity,
                    matched = %found.entry.query_text,
                    "Semantic cache hit"
                );
                metrics::counter!(
                    "querycache_cache_hits_total",
                    "kind" => "semantic",
                    "tier" => "index"
                )
                .increment(1);
                Ok(Some(record))
            },
            Ok(None) => {
                if found.entry.outlived(self.answers.ttl(), Utc::now()) {
                    let pruned = index.remove(&answer_key);
                    debug!(pruned, "Semantic entry points at an expired answer, pruned");
                } else {
                    debug!("Referenced answer not found before its expiry, keeping entry");
                }
                Self::record_miss();
                Ok(None)
            },
            Err(e) => {
                warn!(error = %e, "Answer store unavailable, semantic lookup missed");
                Self::record_miss();
                Ok(None)
            },
        }
    }

    fn record_miss() {
        metrics::counter!("querycache_cache_misses_total", "kind" => "semantic").increment(1);
    }

    /// Remember that `original_query` (with `embedding`) was answered under `answer_key`
    pub fn record(
        &self,
        original_query: &str,
        embedding: Vec<f32>,
        answer_key: CacheKey,
    ) -> Result<(), ApplicationError> {
        let Some(index) = &self.index else {
            return Ok(());
        };
        index.insert(SemanticIndexEntry {
            query_text: original_query.to_string(),
            embedding,
            answer_key,
            recorded_at: Utc::now(),
        })?;
        Ok(())
    }

    /// Forget every indexed query
    pub fn clear(&self) {
        if let Some(index) = &self.index {
            index.clear();
        }
    }
}
