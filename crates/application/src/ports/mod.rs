//! Port definitions for application layer
//!
//! Ports are interfaces that define how the application interacts with
//! external systems. Adapters in the infrastructure layer implement these ports.

mod cache_port;
mod embedding_port;
mod reranker_port;
mod search_port;
mod semantic_index_port;

#[cfg(test)]
pub use cache_port::MockCachePort;
pub use cache_port::{CachePort, CachePortExt, CacheStats, prefix, ttl};
#[cfg(test)]
pub use embedding_port::MockEmbeddingPort;
pub use embedding_port::{EmbeddingModelInfo, EmbeddingPort, ensure_dimension};
#[cfg(test)]
pub use reranker_port::{
    MockRemoteRerankPort, MockRerankModel, MockRerankModelLoader, MockRerankerPort,
};
pub use reranker_port::{
    DegradationReason, DeviceKind, ModelSingletonState, RemoteRerankPort, RerankError,
    RerankModel, RerankModelLoader, RerankStrategy, RerankerPort, RerankerStats, original_order,
    rank_by_scores,
};
#[cfg(test)]
pub use search_port::{MockAnswerGeneratorPort, MockSimilaritySearchPort};
pub use search_port::{AnswerGeneratorPort, GeneratedAnswer, SimilaritySearchPort};
#[cfg(test)]
pub use semantic_index_port::MockSemanticIndexPort;
pub use semantic_index_port::SemanticIndexPort;
