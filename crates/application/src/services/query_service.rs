//! Query answering with the full cache hierarchy
//!
//! Exact answer cache → semantic cache → retrieval cache / search →
//! rerank → generate, writing the new answer back to the exact and
//! semantic caches.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::Utc;
use domain::{AnswerMode, AnswerRecord, Document, DomainError, Filters, RetrievalRecord, SourceRef};
use tracing::{debug, info, instrument};

use crate::{
    error::ApplicationError,
    ports::{AnswerGeneratorPort, EmbeddingPort, RerankerPort, SimilaritySearchPort},
    services::{AnswerCache, RetrievalCache, SemanticCache},
};

/// Default number of chunks retrieved per query
pub const DEFAULT_TOP_K: u32 = 5;

/// A question to answer
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    /// Query text as typed by the user
    pub query: String,
    /// Number of chunks to retrieve
    pub k: u32,
    /// Search filters
    pub filters: Filters,
    /// Requested pipeline mode
    pub mode: AnswerMode,
}

impl QueryRequest {
    /// Request with default parameters
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            k: DEFAULT_TOP_K,
            filters: Filters::new(),
            mode: AnswerMode::default(),
        }
    }

    /// Set the number of chunks to retrieve
    #[must_use]
    pub fn with_k(mut self, k: u32) -> Self {
        self.k = k;
        self
    }

    /// Add a search filter
    #[must_use]
    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    /// Set the pipeline mode
    #[must_use]
    pub fn with_mode(mut self, mode: AnswerMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Where an answer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerSource {
    /// Exact-match answer cache
    ExactCache,
    /// Semantic cache (similar earlier query)
    SemanticCache,
    /// Full pipeline
    Computed,
}

/// Answer plus provenance
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    /// The answer
    pub record: AnswerRecord,
    /// Which layer produced it
    pub source: AnswerSource,
    /// Time spent in this call
    pub latency: Duration,
}

/// Answers queries through the cache hierarchy
pub struct QueryService {
    answers: AnswerCache,
    semantic: SemanticCache,
    retrieval: Arc<RetrievalCache>,
    reranker: Arc<dyn RerankerPort>,
    embedder: Arc<dyn EmbeddingPort>,
    search: Arc<dyn SimilaritySearchPort>,
    generator: Arc<dyn AnswerGeneratorPort>,
}

impl std::fmt::Debug for QueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryService")
            .field("answers", &self.answers)
            .field("semantic", &self.semantic)
            .field("retrieval", &self.retrieval)
            .finish_non_exhaustive()
    }
}

impl QueryService {
    /// Wire the service from its caches and collaborators
    pub fn new(
        answers: AnswerCache,
        semantic: SemanticCache,
        retrieval: Arc<RetrievalCache>,
        reranker: Arc<dyn RerankerPort>,
        embedder: Arc<dyn EmbeddingPort>,
        search: Arc<dyn SimilaritySearchPort>,
        generator: Arc<dyn AnswerGeneratorPort>,
    ) -> Self {
        Self {
            answers,
            semantic,
            retrieval,
            reranker,
            embedder,
            search,
            generator,
        }
    }

    /// Answer a query
    ///
    /// Errors come only from the embedding, search and generation
    /// collaborators, or from a dimension mismatch in the semantic index.
    #[instrument(skip(self, request), fields(k = request.k, mode = %request.mode))]
    pub async fn answer(&self, request: QueryRequest) -> Result<QueryOutcome, ApplicationError> {
        let started = Instant::now();
        if request.query.trim().is_empty() {
            return Err(DomainError::InvalidQuery("query is empty".to_string()).into());
        }

        if let Some(record) = self.answers.get(&request.query).await {
            debug!("Answered from exact cache");
            return Ok(QueryOutcome {
                record,
                source: AnswerSource::ExactCache,
                latency: started.elapsed(),
            });
        }

        let embedding = self.embedder.embed(&request.query).await?;

        if let Some(record) = self.semantic.lookup(&request.query, &embedding).await? {
            debug!("Answered from semantic cache");
            return Ok(QueryOutcome {
                record,
                source: AnswerSource::SemanticCache,
                latency: started.elapsed(),
            });
        }

        let retrieved = self.retrieve(&request, &embedding).await?;
        let candidates: Vec<Document> = retrieved.documents.iter().map(Document::from).collect();
        let ranked = self.reranker.score(&request.query, candidates).await;
        let generated = self
            .generator
            .generate(&request.query, &ranked, request.mode)
            .await?;

        let latency = started.elapsed();
        let record = AnswerRecord {
            answer: generated.text,
            sources: ranked.iter().map(SourceRef::from).collect(),
            mode_used: generated.mode_used,
            latency_ms: u32::try_from(latency.as_millis()).unwrap_or(u32::MAX),
            produced_at: Utc::now(),
            original_query: request.query.clone(),
        };

        let key = self.answers.put(&request.query, &record).await;
        self.semantic.record(&request.query, embedding, key)?;

        info!(
            latency_ms = record.latency_ms,
            sources = record.sources.len(),
            "Answer computed and cached"
        );
        Ok(QueryOutcome {
            record,
            source: AnswerSource::Computed,
            latency,
        })
    }

    async fn retrieve(
        &self,
        request: &QueryRequest,
        embedding: &[f32],
    ) -> Result<RetrievalRecord, ApplicationError> {
        if let Some(record) = self
            .retrieval
            .get(&request.query, request.k, &request.filters)
            .await
        {
            return Ok(record);
        }

        let documents = self
            .search
            .search(embedding, request.k, &request.filters)
            .await?;
        let record = RetrievalRecord {
            documents,
            k: request.k,
            filters: request.filters.clone(),
        };
        self.retrieval.put(&request.query, &record).await;
        Ok(record)
    }
}
