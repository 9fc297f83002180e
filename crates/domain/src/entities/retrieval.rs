//! Cached retrieval results

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{entities::DocumentChunkRef, value_objects::DocumentId};

/// Search filters, kept sorted so serialization is deterministic
pub type Filters = BTreeMap<String, String>;

/// Result of one similarity search, as stored in the retrieval cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalRecord {
    /// Chunks in provider order
    pub documents: Vec<DocumentChunkRef>,
    /// Requested result count
    pub k: u32,
    /// Filters the search ran with
    pub filters: Filters,
}

impl RetrievalRecord {
    /// Distinct documents referenced by this result
    pub fn document_ids(&self) -> BTreeSet<DocumentId> {
        self.documents
            .iter()
            .map(|chunk| chunk.document_id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(doc: &str, chunk: &str) -> DocumentChunkRef {
        DocumentChunkRef {
            document_id: DocumentId::new(doc).unwrap(),
            chunk_id: chunk.to_string(),
            content: String::new(),
            similarity: 0.5,
        }
    }

    #[test]
    fn document_ids_are_deduplicated() {
        let record = RetrievalRecord {
            documents: vec![chunk("a", "1"), chunk("b", "1"), chunk("a", "2")],
            k: 3,
            filters: Filters::new(),
        };
        let ids: Vec<_> = record.document_ids().into_iter().collect();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0].as_str(), "a");
    }

    #[test]
    fn filters_serialize_sorted() {
        let mut filters = Filters::new();
        filters.insert("year".to_string(), "2024".to_string());
        filters.insert("status".to_string(), "active".to_string());
        let record = RetrievalRecord {
            documents: vec![],
            k: 1,
            filters,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.find("status").unwrap() < json.find("year").unwrap());
    }
}
