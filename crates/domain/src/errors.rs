//! Domain-level errors

use thiserror::Error;

/// Errors that can occur in the domain layer
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    /// Query text is unusable (empty after normalization)
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Two embeddings of different dimension were compared
    ///
    /// This is a deployment error (wrong embedding model for the configured
    /// dimension) and is never recovered from silently.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Entity not found
    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: String, id: String },

    /// Validation failed
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

impl DomainError {
    /// Create a not found error
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Create a dimension mismatch error
    pub const fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_error_message_is_correct() {
        let err = DomainError::not_found("AnswerRecord", "abc");
        assert_eq!(err.to_string(), "AnswerRecord not found: abc");
    }

    #[test]
    fn dimension_mismatch_message() {
        let err = DomainError::dimension_mismatch(384, 1024);
        assert_eq!(
            err.to_string(),
            "Embedding dimension mismatch: expected 384, got 1024"
        );
    }

    #[test]
    fn invalid_query_message() {
        let err = DomainError::InvalidQuery("empty".to_string());
        assert_eq!(err.to_string(), "Invalid query: empty");
    }
}
