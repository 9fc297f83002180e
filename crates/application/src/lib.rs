//! Application layer - Cache services and port definitions
//!
//! Contains the answer, semantic and retrieval caches, conversation
//! context, invalidation and the end-to-end query flow, plus the ports
//! that infrastructure adapters implement.

pub mod error;
pub mod ports;
pub mod services;

#[cfg(test)]
mod testing;

pub use error::ApplicationError;
pub use ports::*;
pub use services::*;
