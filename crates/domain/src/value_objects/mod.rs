//! Value Objects - Immutable, identity-less domain primitives

mod cache_key;
mod ids;

pub use cache_key::{CacheKey, exact_key, normalize_query, retrieval_key};
pub use ids::{ConversationId, DocumentId};
