//! Ollama embedding engine implementation
//!
//! Produces query embeddings through Ollama's `/api/embed` endpoint. The
//! semantic cache compares vectors across processes and restarts, so every
//! returned vector is checked against the configured dimension.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::InferenceError;

/// Configuration for the embedding engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL of the Ollama server
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Embedding model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Number of embedding dimensions every vector must have
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_embedding_model() -> String {
    "bge-m3".to_string()
}

const fn default_timeout_ms() -> u64 {
    10_000
}

const fn default_dimensions() -> usize {
    1024 // bge-m3
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_embedding_model(),
            timeout_ms: default_timeout_ms(),
            dimensions: default_dimensions(),
        }
    }
}

impl EmbeddingConfig {
    /// Configuration for nomic-embed-text (768 dimensions, English)
    #[must_use]
    pub fn nomic_embed_text() -> Self {
        Self {
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            ..Self::default()
        }
    }

    /// Configuration for bge-m3 (1024 dimensions, multilingual)
    #[must_use]
    pub fn bge_m3() -> Self {
        Self::default()
    }
}

/// Ollama-compatible embedding engine
#[derive(Debug)]
pub struct OllamaEmbeddingEngine {
    client: Client,
    config: EmbeddingConfig,
}

impl OllamaEmbeddingEngine {
    /// Create a new embedding engine with the given configuration
    pub fn new(config: EmbeddingConfig) -> Result<Self, InferenceError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| InferenceError::ConnectionFailed(e.to_string()))?;

        info!(
            base_url = %config.base_url,
            model = %config.model,
            dimensions = config.dimensions,
            "Initialized Ollama embedding engine"
        );

        Ok(Self { client, config })
    }

    fn embed_url(&self) -> String {
        format!("{}/api/embed", self.config.base_url.trim_end_matches('/'))
    }

    /// Get the configured model name
    #[must_use]
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Get the expected embedding dimensions
    #[must_use]
    pub const fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    /// Generate an embedding for a single text
    #[instrument(skip(self, text), fields(model = %self.config.model, text_len = text.len()))]
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, InferenceError> {
        let result = self.send(EmbedInput::Single(text.to_string())).await?;

        let embedding = match result.embeddings {
            Some(mut embeddings) if !embeddings.is_empty() => embeddings.swap_remove(0),
            _ => result.embedding.ok_or_else(|| {
                InferenceError::InvalidResponse("No embedding in response".to_string())
            })?,
        };

        self.check_dimensions(&embedding)?;
        debug!("Received embedding from Ollama");
        Ok(embedding)
    }

    /// Generate embeddings for multiple texts, in input order
    #[instrument(skip(self, texts), fields(model = %self.config.model, batch_size = texts.len()))]
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, InferenceError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self
            .send(EmbedInput::Batch(texts.to_vec()))
            .await?
            .embeddings
            .unwrap_or_default();

        if embeddings.len() != texts.len() {
            return Err(InferenceError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }
        for embedding in &embeddings {
            self.check_dimensions(embedding)?;
        }

        debug!(count = embeddings.len(), "Received batch embeddings from Ollama");
        Ok(embeddings)
    }

    async fn send(&self, input: EmbedInput) -> Result<OllamaEmbedResponse, InferenceError> {
        let request = OllamaEmbedRequest {
            model: &self.config.model,
            input,
        };

        let response = self
            .client
            .post(self.embed_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to reach Ollama server");
                InferenceError::from_reqwest(&e, self.config.timeout_ms)
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "Ollama embed request failed");
            return Err(InferenceError::from_status(status, &error_text));
        }

        response.json().await.map_err(|e| {
            warn!(error = %e, "Failed to parse Ollama response");
            InferenceError::InvalidResponse(e.to_string())
        })
    }

    fn check_dimensions(&self, embedding: &[f32]) -> Result<(), InferenceError> {
        if embedding.len() == self.config.dimensions {
            Ok(())
        } else {
            warn!(
                expected = self.config.dimensions,
                actual = embedding.len(),
                "Embedding model returned unexpected dimension"
            );
            Err(InferenceError::DimensionMismatch {
                expected: self.config.dimensions,
                actual: embedding.len(),
            })
        }
    }
}

#[derive(Debug, Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: EmbedInput,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum EmbedInput {
    Single(String),
    Batch(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    /// Older API format
    #[serde(default)]
    embedding: Option<Vec<f32>>,
    #[serde(default)]
    embeddings: Option<Vec<Vec<f32>>>,
}

/// Trait for embedding engines
#[async_trait]
pub trait EmbeddingEngine: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, InferenceError>;

    /// Generate embeddings for multiple texts in a batch
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, InferenceError>;

    /// Get the model name
    fn model(&self) -> &str;

    /// Get the embedding dimensions
    fn dimensions(&self) -> usize;
}

#[async_trait]
impl EmbeddingEngine for OllamaEmbeddingEngine {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, InferenceError> {
        self.embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, InferenceError> {
        self.embed_batch(texts).await
    }

    fn model(&self) -> &str {
        self.model()
    }

    fn dimensions(&self) -> usize {
        self.dimensions()
    }
}
