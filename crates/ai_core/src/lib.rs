//! AI Core - Embedding and rerank engines
//!
//! HTTP engines for query embeddings (Ollama `/api/embed`) and remote
//! reranking (`/rerank`), plus an in-process lexical cross-encoder with
//! device memory accounting. Knows nothing about the application ports;
//! infrastructure adapts these engines.

pub mod config;
pub mod embedding;
pub mod error;
pub mod rerank;

pub use config::{DeviceProfile, LexicalModelConfig, RemoteRerankConfig};
pub use embedding::{EmbeddingConfig, EmbeddingEngine, OllamaEmbeddingEngine};
pub use error::InferenceError;
pub use rerank::{LexicalCrossEncoder, RemoteRerankClient};
