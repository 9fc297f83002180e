//! Semantic cache index entries

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::CacheKey;

/// One previously answered query in the embedding index
///
/// `answer_key` is a back-reference into the answer cache, never a source of
/// truth: when the referenced answer is gone the entry is a miss, and once
/// the answer's lifetime has certainly run out the entry gets pruned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticIndexEntry {
    /// Query text as originally asked
    pub query_text: String,
    /// Query embedding, dimension fixed by configuration
    pub embedding: Vec<f32>,
    /// Exact-match key of the cached answer
    pub answer_key: CacheKey,
    /// When the answer was recorded
    pub recorded_at: DateTime<Utc>,
}

impl SemanticIndexEntry {
    /// Whether an answer stored with `ttl` when this entry was recorded has
    /// expired by `now`
    pub fn outlived(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        TimeDelta::from_std(ttl)
            .ok()
            .and_then(|ttl| self.recorded_at.checked_add_signed(ttl))
            .is_some_and(|expiry| now >= expiry)
    }
}

/// A lookup result: the best entry and how similar it was
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticMatch {
    /// Matched entry
    pub entry: SemanticIndexEntry,
    /// Cosine similarity to the query embedding
    pub similarity: f32,
}
