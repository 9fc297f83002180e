//! Embedding port - Interface for generating vector embeddings
//!
//! Embeddings feed both the similarity-search provider and the semantic
//! cache, so every vector returned here must have the configured dimension.

use async_trait::async_trait;
use domain::DomainError;
#[cfg(test)]
use mockall::automock;

use crate::error::ApplicationError;

/// Information about the embedding model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingModelInfo {
    /// Model identifier (e.g., "bge-m3")
    pub model: String,
    /// Number of dimensions in the embedding vector
    pub dimensions: usize,
}

/// Port for generating text embeddings
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EmbeddingPort: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApplicationError>;

    /// Generate embeddings for multiple texts, in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApplicationError>;

    /// Get information about the embedding model
    fn model_info(&self) -> EmbeddingModelInfo;
}

/// Reject a vector whose dimension differs from `expected`
pub fn ensure_dimension(embedding: &[f32], expected: usize) -> Result<(), DomainError> {
    if embedding.len() == expected {
        Ok(())
    } else {
        Err(DomainError::dimension_mismatch(expected, embedding.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_dimension_passes() {
        assert!(ensure_dimension(&[0.0; 4], 4).is_ok());
    }

    #[test]
    fn mismatched_dimension_is_reported() {
        let err = ensure_dimension(&[0.0; 3], 4).unwrap_err();
        assert_eq!(err, DomainError::dimension_mismatch(4, 3));
    }

    #[tokio::test]
    async fn mock_embedding_is_usable_as_trait_object() {
        let mut mock = MockEmbeddingPort::new();
        mock.expect_embed().returning(|_| Ok(vec![0.1, 0.2]));
        mock.expect_model_info().returning(|| EmbeddingModelInfo {
            model: "test".to_string(),
            dimensions: 2,
        });

        let port: &dyn EmbeddingPort = &mock;
        let v = port.embed("hi").await.unwrap();
        assert!(ensure_dimension(&v, port.model_info().dimensions).is_ok());
    }
}
