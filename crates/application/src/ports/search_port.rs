//! Similarity-search and answer-generation collaborators
//!
//! Both sit on the primary request path: their errors propagate to the
//! caller, unlike cache and reranker failures.

use async_trait::async_trait;
use domain::{AnswerMode, DocumentChunkRef, Filters, ScoredDocument};
#[cfg(test)]
use mockall::automock;

use crate::error::ApplicationError;

/// Opaque vector-search engine over the document corpus
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SimilaritySearchPort: Send + Sync {
    /// Return up to `k` chunks nearest to `embedding`, best first
    async fn search(
        &self,
        embedding: &[f32],
        k: u32,
        filters: &Filters,
    ) -> Result<Vec<DocumentChunkRef>, ApplicationError>;
}

/// Text produced by the generation model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedAnswer {
    /// Answer text
    pub text: String,
    /// Mode actually used (adaptive requests resolve to a concrete mode)
    pub mode_used: AnswerMode,
}

/// Text-generation model call
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AnswerGeneratorPort: Send + Sync {
    /// Generate an answer to `query` grounded in `context`
    async fn generate(
        &self,
        query: &str,
        context: &[ScoredDocument],
        mode: AnswerMode,
    ) -> Result<GeneratedAnswer, ApplicationError>;
}
