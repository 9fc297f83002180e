//! Semantic index port
//!
//! Approximate-match store of previously answered query embeddings.
//! Lookups are CPU-bound and bounded, so the interface is synchronous.

use domain::{CacheKey, DomainError, SemanticIndexEntry, SemanticMatch};
#[cfg(test)]
use mockall::automock;

/// Embedding index backing the semantic cache
#[cfg_attr(test, automock)]
pub trait SemanticIndexPort: Send + Sync {
    /// Dimension every stored and queried vector must have
    fn dimension(&self) -> usize;

    /// Best match at or above `threshold` among the most recent entries
    ///
    /// Fails with [`DomainError::DimensionMismatch`] when `embedding` has the
    /// wrong dimension.
    fn find_similar(
        &self,
        embedding: &[f32],
        threshold: f32,
    ) -> Result<Option<SemanticMatch>, DomainError>;

    /// Insert an entry, evicting the oldest ones past the size limit
    fn insert(&self, entry: SemanticIndexEntry) -> Result<(), DomainError>;

    /// Remove every entry pointing at `answer_key`, returning how many
    fn remove(&self, answer_key: &CacheKey) -> usize;

    /// Number of stored entries
    fn len(&self) -> usize;

    /// Whether the index is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry
    fn clear(&self);
}
