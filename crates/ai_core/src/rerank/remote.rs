//! HTTP client for a remote rerank service
//!
//! Speaks the `/rerank` dialect shared by text-embeddings-inference
//! (a bare array of `{index, score}`) and Cohere-style services
//! (`{results: [{index, relevance_score}]}`).

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::{config::RemoteRerankConfig, error::InferenceError};

/// Client for a remote rerank endpoint
#[derive(Debug, Clone)]
pub struct RemoteRerankClient {
    client: Client,
    config: RemoteRerankConfig,
}

impl RemoteRerankClient {
    /// Create a client with the given configuration
    pub fn new(config: RemoteRerankConfig) -> Result<Self, InferenceError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| InferenceError::ConnectionFailed(e.to_string()))?;

        info!(base_url = %config.base_url, timeout_ms = config.timeout_ms, "Initialized remote rerank client");
        Ok(Self { client, config })
    }

    fn rerank_url(&self) -> String {
        format!("{}/rerank", self.config.base_url.trim_end_matches('/'))
    }

    /// Score every document against `query`, in input order
    #[instrument(skip(self, query, documents), fields(documents = documents.len()))]
    pub async fn score<S: AsRef<str> + Sync>(
        &self,
        query: &str,
        documents: &[S],
    ) -> Result<Vec<f32>, InferenceError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let request = RerankRequest {
            model: self.config.model.as_deref(),
            query,
            texts: documents.iter().map(AsRef::as_ref).collect(),
            return_documents: false,
        };

        let mut builder = self.client.post(self.rerank_url()).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(error = %e, "Failed to reach rerank service");
            InferenceError::from_reqwest(&e, self.config.timeout_ms)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %body, "Rerank request failed");
            return Err(InferenceError::from_status(status, &body));
        }

        let parsed: RerankResponse = response.json().await.map_err(|e| {
            warn!(error = %e, "Failed to parse rerank response");
            InferenceError::InvalidResponse(e.to_string())
        })?;

        let scores = parsed.into_scores(documents.len())?;
        debug!("Received rerank scores");
        Ok(scores)
    }
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    query: &'a str,
    texts: Vec<&'a str>,
    return_documents: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RerankResponse {
    Bare(Vec<RankedIndex>),
    Wrapped { results: Vec<RankedIndex> },
}

#[derive(Debug, Deserialize)]
struct RankedIndex {
    index: usize,
    #[serde(alias = "relevance_score")]
    score: f32,
}

impl RerankResponse {
    /// Reorder results back into input order; every index must appear once
    fn into_scores(self, expected: usize) -> Result<Vec<f32>, InferenceError> {
        let ranked = match self {
            Self::Bare(ranked) | Self::Wrapped { results: ranked } => ranked,
        };

        let mut scores: Vec<Option<f32>> = vec![None; expected];
        for RankedIndex { index, score } in ranked {
            let slot = scores.get_mut(index).ok_or_else(|| {
                InferenceError::InvalidResponse(format!("index {index} out of range"))
            })?;
            *slot = Some(score);
        }

        scores
            .into_iter()
            .enumerate()
            .map(|(i, score)| {
                score.ok_or_else(|| InferenceError::InvalidResponse(format!("no score for index {i}")))
            })
            .collect()
    }
}
