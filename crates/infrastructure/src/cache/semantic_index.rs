//! In-process embedding index for the semantic cache
//!
//! A bounded linear scan over the most recently inserted entries. Lookup
//! cost is `O(max_scan × dimension)`; raising `max_scan` finds older
//! paraphrases at the price of latency. Entries beyond `max_entries` are
//! evicted oldest first, so the scan window always covers the newest data.

use std::collections::VecDeque;

use application::ports::SemanticIndexPort;
use domain::{CacheKey, DomainError, SemanticIndexEntry, SemanticMatch, cosine_similarity};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Default number of entries compared per lookup
pub const DEFAULT_MAX_SCAN: usize = 100;

/// Default index size before the oldest entries are evicted
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Sizing of the embedding index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticIndexConfig {
    /// Embedding dimension every entry and query must have
    pub dimension: usize,
    /// Entries compared per lookup, newest first
    pub max_scan: usize,
    /// Maximum entries kept
    pub max_entries: usize,
}

impl SemanticIndexConfig {
    /// Default sizing for `dimension`
    pub const fn new(dimension: usize) -> Self {
        Self {
            dimension,
            max_scan: DEFAULT_MAX_SCAN,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

/// Embedding index held in process memory
#[derive(Debug)]
pub struct InMemorySemanticIndex {
    config: SemanticIndexConfig,
    entries: RwLock<VecDeque<SemanticIndexEntry>>,
}

impl InMemorySemanticIndex {
    /// Create an empty index
    pub fn new(config: SemanticIndexConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(VecDeque::new()),
        }
    }

    /// Index sizing
    pub const fn config(&self) -> &SemanticIndexConfig {
        &self.config
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<(), DomainError> {
        if embedding.len() == self.config.dimension {
            Ok(())
        } else {
            Err(DomainError::dimension_mismatch(
                self.config.dimension,
                embedding.len(),
            ))
        }
    }
}

impl SemanticIndexPort for InMemorySemanticIndex {
    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn find_similar(
        &self,
        embedding: &[f32],
        threshold: f32,
    ) -> Result<Option<SemanticMatch>, DomainError> {
        self.check_dimension(embedding)?;

        let entries = self.entries.read();
        let mut best: Option<(f32, &SemanticIndexEntry)> = None;

        // Newest first; only a strictly better score replaces the current
        // best, so exact ties resolve to the more recent entry.
        for entry in entries.iter().rev().take(self.config.max_scan) {
            let similarity = cosine_similarity(embedding, &entry.embedding);
            trace!(similarity, query = %entry.query_text, "Compared index entry");
            if similarity >= threshold && best.is_none_or(|(score, _)| similarity > score) {
                best = Some((similarity, entry));
            }
        }

        let found = best.map(|(similarity, entry)| SemanticMatch {
            entry: entry.clone(),
            similarity,
        });
        drop(entries);

        if let Some(found) = &found {
            debug!(similarity = found.similarity, "Semantic index match");
        }
        Ok(found)
    }

    fn insert(&self, entry: SemanticIndexEntry) -> Result<(), DomainError> {
        self.check_dimension(&entry.embedding)?;

        let mut entries = self.entries.write();
        entries.push_back(entry);
        let mut evicted = 0usize;
        while entries.len() > self.config.max_entries {
            entries.pop_front();
            evicted += 1;
        }
        drop(entries);

        if evicted > 0 {
            debug!(evicted, "Evicted oldest semantic index entries");
        }
        Ok(())
    }

    fn remove(&self, answer_key: &CacheKey) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|entry| &entry.answer_key != answer_key);
        before - entries.len()
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn clear(&self) {
        self.entries.write().clear();
    }
}
