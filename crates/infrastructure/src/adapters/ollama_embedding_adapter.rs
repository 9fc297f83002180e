//! Ollama embedding adapter - Implements EmbeddingPort using ai_core
//!
//! A vector of the wrong dimension is a deployment error (model swapped
//! without reconfiguring), so it surfaces as `DomainError::DimensionMismatch`
//! instead of a retryable inference failure.

use ai_core::{EmbeddingConfig, InferenceError, OllamaEmbeddingEngine};
use application::{
    error::ApplicationError,
    ports::{EmbeddingModelInfo, EmbeddingPort},
};
use async_trait::async_trait;
use domain::DomainError;
use tracing::instrument;

/// Adapter for Ollama-compatible embedding servers
#[derive(Debug)]
pub struct OllamaEmbeddingAdapter {
    engine: OllamaEmbeddingEngine,
}

impl OllamaEmbeddingAdapter {
    /// Create a new adapter with the given configuration
    pub fn new(config: EmbeddingConfig) -> Result<Self, ApplicationError> {
        let engine = OllamaEmbeddingEngine::new(config).map_err(Self::map_error)?;
        Ok(Self { engine })
    }

    /// Convert ai_core error to application error
    fn map_error(e: InferenceError) -> ApplicationError {
        match e {
            InferenceError::DimensionMismatch { expected, actual } => {
                DomainError::dimension_mismatch(expected, actual).into()
            },
            InferenceError::ConnectionFailed(msg) => {
                ApplicationError::ExternalService(format!("Embedding service connection failed: {msg}"))
            },
            InferenceError::Timeout(ms) => {
                ApplicationError::ExternalService(format!("Embedding timeout after {ms}ms"))
            },
            other => ApplicationError::Inference(other.to_string()),
        }
    }
}

#[async_trait]
impl EmbeddingPort for OllamaEmbeddingAdapter {
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApplicationError> {
        self.engine.embed(text).await.map_err(Self::map_error)
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApplicationError> {
        self.engine.embed_batch(texts).await.map_err(Self::map_error)
    }

    fn model_info(&self) -> EmbeddingModelInfo {
        EmbeddingModelInfo {
            model: self.engine.model().to_string(),
            dimensions: self.engine.dimensions(),
        }
    }
}
