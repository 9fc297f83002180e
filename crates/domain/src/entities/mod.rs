//! Domain entities - the records the cache tiers hold

mod answer;
mod cache_entry;
mod conversation_window;
mod document;
mod retrieval;
mod semantic;

pub use answer::{AnswerMode, AnswerRecord, SourceRef};
pub use cache_entry::CacheEntry;
pub use conversation_window::{ConversationWindow, DEFAULT_WINDOW_SIZE, Message, MessageRole};
pub use document::{Document, DocumentChangeKind, DocumentChunkRef, ScoredDocument};
pub use retrieval::{Filters, RetrievalRecord};
pub use semantic::{SemanticIndexEntry, SemanticMatch};
