//! Application services - Use case implementations

mod answer_cache;
mod conversation_context;
mod invalidation;
mod query_service;
mod retrieval_cache;
mod semantic_cache;

pub use answer_cache::AnswerCache;
pub use conversation_context::{ConversationContextConfig, ConversationContextService};
pub use invalidation::{CacheInvalidationCoordinator, InvalidationStats};
pub use query_service::{AnswerSource, DEFAULT_TOP_K, QueryOutcome, QueryRequest, QueryService};
pub use retrieval_cache::RetrievalCache;
pub use semantic_cache::{DEFAULT_THRESHOLD, SemanticCache};
