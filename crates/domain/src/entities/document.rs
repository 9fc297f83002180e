//! Documents as seen by retrieval and reranking

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{errors::DomainError, value_objects::DocumentId};

/// Reference to a chunk returned by the similarity-search provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunkRef {
    /// Owning document
    pub document_id: DocumentId,
    /// Chunk identifier within the document
    pub chunk_id: String,
    /// Chunk text, needed for reranking and answer generation
    pub content: String,
    /// Similarity reported by the search provider
    pub similarity: f32,
}

/// A rerank candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Owning document
    pub id: DocumentId,
    /// Chunk identifier, when the candidate is a chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,
    /// Text scored against the query
    pub text: String,
}

impl Document {
    /// Create a whole-document candidate
    pub fn new(id: DocumentId, text: impl Into<String>) -> Self {
        Self {
            id,
            chunk_id: None,
            text: text.into(),
        }
    }
}

impl From<&DocumentChunkRef> for Document {
    fn from(chunk: &DocumentChunkRef) -> Self {
        Self {
            id: chunk.document_id.clone(),
            chunk_id: Some(chunk.chunk_id.clone()),
            text: chunk.content.clone(),
        }
    }
}

/// A candidate paired with its relevance score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    /// The scored candidate
    pub document: Document,
    /// Relevance score, higher is better
    pub score: f32,
}

/// Kind of mutation reported by the document-management collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentChangeKind {
    /// Publication status changed (e.g. active → archived)
    StatusChange,
    /// Text or metadata changed
    ContentUpdate,
    /// Document removed
    Delete,
}

impl fmt::Display for DocumentChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::StatusChange => "status_change",
            Self::ContentUpdate => "content_update",
            Self::Delete => "delete",
        })
    }
}

impl FromStr for DocumentChangeKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "status" | "status_change" => Ok(Self::StatusChange),
            "content" | "content_update" => Ok(Self::ContentUpdate),
            "delete" | "deleted" => Ok(Self::Delete),
            other => Err(DomainError::ValidationError(format!(
                "unknown document change kind: {other}"
            ))),
        }
    }
}
