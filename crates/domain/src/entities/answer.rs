//! Cached answers

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{entities::ScoredDocument, errors::DomainError, value_objects::DocumentId};

/// Pipeline quality/latency trade-off used to produce an answer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerMode {
    /// Smallest retrieval depth, no reranking budget
    Fast,
    /// Default trade-off
    #[default]
    Balanced,
    /// Deep retrieval and full reranking
    Quality,
    /// Mode chosen per query by the pipeline
    Adaptive,
}

impl fmt::Display for AnswerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fast => "fast",
            Self::Balanced => "balanced",
            Self::Quality => "quality",
            Self::Adaptive => "adaptive",
        })
    }
}

impl FromStr for AnswerMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "balanced" => Ok(Self::Balanced),
            "quality" => Ok(Self::Quality),
            "adaptive" => Ok(Self::Adaptive),
            other => Err(DomainError::ValidationError(format!(
                "unknown answer mode: {other}"
            ))),
        }
    }
}

/// Citation attached to an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Cited document
    pub document_id: DocumentId,
    /// Cited chunk, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,
    /// Relevance score the source was selected with
    pub score: f32,
}

impl From<&ScoredDocument> for SourceRef {
    fn from(scored: &ScoredDocument) -> Self {
        Self {
            document_id: scored.document.id.clone(),
            chunk_id: scored.document.chunk_id.clone(),
            score: scored.score,
        }
    }
}

/// A fully generated answer as stored in the answer cache
///
/// Immutable once created; a newer answer for the same query replaces the
/// whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    /// Generated answer text
    pub answer: String,
    /// Sources in citation order
    pub sources: Vec<SourceRef>,
    /// Mode the answer was produced with
    pub mode_used: AnswerMode,
    /// End-to-end latency of the computation that produced it
    pub latency_ms: u32,
    /// When the answer was produced
    pub produced_at: DateTime<Utc>,
    /// Query text exactly as the user asked it
    pub original_query: String,
}

impl AnswerRecord {
    /// Whether any source cites `document_id`
    pub fn cites(&self, document_id: &DocumentId) -> bool {
        self.sources.iter().any(|s| &s.document_id == document_id)
    }
}
