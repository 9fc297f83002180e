//! Inference errors

use thiserror::Error;

/// Errors that can occur during embedding or reranking
#[derive(Debug, Error)]
pub enum InferenceError {
    /// Failed to connect to the model server
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Request to the model server failed
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Model not found or not loaded
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Response parsing failed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The model returned vectors of an unexpected dimension
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Timeout during inference
    #[error("Inference timeout after {0}ms")]
    Timeout(u64),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Server error
    #[error("Server error: {0}")]
    ServerError(String),

    /// The device cannot hold the model or the batch working set
    #[error("Out of device memory on {device}: need {required} bytes, {available} available")]
    ResourceExhausted {
        device: String,
        required: u64,
        available: u64,
    },
}

impl InferenceError {
    /// Map an HTTP client error, recording the configured timeout
    pub fn from_reqwest(err: &reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout_ms)
        } else if err.is_connect() {
            Self::ConnectionFailed(err.to_string())
        } else {
            Self::RequestFailed(err.to_string())
        }
    }

    /// Map a non-success HTTP status
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            429 => Self::RateLimited,
            404 => Self::ModelNotAvailable(body.to_string()),
            _ => Self::ServerError(format!("server returned {status}: {body}")),
        }
    }
}
