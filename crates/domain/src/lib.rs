//! Domain layer for the query-result cache
//!
//! Contains the cached data model (answers, retrieval results, semantic index
//! entries, conversation windows), deterministic key derivation and the
//! similarity math shared by the semantic cache. No I/O lives here.

pub mod entities;
pub mod errors;
pub mod similarity;
pub mod value_objects;

pub use entities::*;
pub use errors::DomainError;
pub use similarity::{cosine_similarity, try_cosine_similarity};
pub use value_objects::*;
