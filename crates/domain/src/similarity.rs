//! Vector similarity used by the semantic cache

use crate::errors::DomainError;

/// Cosine similarity `(a·b)/(|a||b|)` of two embeddings
///
/// Returns `0.0` when either vector has zero norm, when the vectors are
/// empty, or when their lengths differ. Callers that must treat a length
/// difference as a configuration error use [`try_cosine_similarity`].
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }

    dot / denominator
}

/// Cosine similarity that rejects vectors of different dimension
pub fn try_cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, DomainError> {
    if a.len() != b.len() {
        return Err(DomainError::dimension_mismatch(a.len(), b.len()));
    }
    Ok(cosine_similarity(a, b))
}
