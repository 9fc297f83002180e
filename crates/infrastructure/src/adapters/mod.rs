//! Infrastructure adapters
//!
//! Adapters connect application ports to concrete implementations.

mod circuit_breaker;
mod lexical_rerank_adapter;
mod ollama_embedding_adapter;
mod remote_rerank_adapter;
mod resilient_reranker;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};
pub use lexical_rerank_adapter::{LexicalRerankLoader, LexicalRerankModel};
pub use ollama_embedding_adapter::OllamaEmbeddingAdapter;
pub use remote_rerank_adapter::RemoteRerankAdapter;
pub use resilient_reranker::{DEFAULT_REMOTE_TIMEOUT, ResilientReranker};
