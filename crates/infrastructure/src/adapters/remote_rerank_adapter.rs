//! Remote rerank adapter - Implements RemoteRerankPort using ai_core

use ai_core::{InferenceError, RemoteRerankClient, RemoteRerankConfig};
use application::ports::{RemoteRerankPort, RerankError};
use async_trait::async_trait;
use domain::Document;
use std::time::Duration;
use tracing::instrument;

/// Adapter for a `/rerank` HTTP service
#[derive(Debug, Clone)]
pub struct RemoteRerankAdapter {
    client: RemoteRerankClient,
}

impl RemoteRerankAdapter {
    /// Create a new adapter with the given configuration
    pub fn new(config: RemoteRerankConfig) -> Result<Self, RerankError> {
        let client = RemoteRerankClient::new(config).map_err(map_error)?;
        Ok(Self { client })
    }
}

/// Convert ai_core error to rerank error
fn map_error(e: InferenceError) -> RerankError {
    match e {
        InferenceError::Timeout(ms) => RerankError::Timeout(Duration::from_millis(ms)),
        InferenceError::ConnectionFailed(_)
        | InferenceError::RateLimited
        | InferenceError::ServerError(_) => RerankError::Unavailable(e.to_string()),
        InferenceError::ResourceExhausted { .. } => RerankError::ResourceExhausted(e.to_string()),
        other => RerankError::Failed(other.to_string()),
    }
}

#[async_trait]
impl RemoteRerankPort for RemoteRerankAdapter {
    #[instrument(skip(self, query, documents), fields(documents = documents.len()))]
    async fn score(&self, query: &str, documents: &[Document]) -> Result<Vec<f32>, RerankError> {
        let texts: Vec<&str> = documents.iter().map(|d| d.text.as_str()).collect();
        self.client.score(query, &texts).await.map_err(map_error)
    }
}

#[cfg(test)]
mod tests {
    use domain::DocumentId;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path},
    };

    use super::*;

    fn config(base_url: &str) -> RemoteRerankConfig {
        RemoteRerankConfig {
            base_url: base_url.to_string(),
            model: None,
            api_key: Some("secret".to_string()),
            timeout_ms: 2_000,
        }
    }

    fn docs() -> Vec<Document> {
        vec![
            Document::new(DocumentId::new("a").unwrap(), "first"),
            Document::new(DocumentId::new("b").unwrap(), "second"),
        ]
    }

    #[tokio::test]
    async fn scores_come_back_in_input_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rerank"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"index": 1, "score": 0.9},
                {"index": 0, "score": 0.1}
            ])))
            .mount(&server)
            .await;

        let adapter = RemoteRerankAdapter::new(config(&server.uri())).unwrap();
        let scores = adapter.score("q", &docs()).await.unwrap();
        assert_eq!(scores, vec![0.1, 0.9]);
    }

    #[tokio::test]
    async fn server_error_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rerank"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let adapter = RemoteRerankAdapter::new(config(&server.uri())).unwrap();
        assert!(matches!(
            adapter.score("q", &docs()).await,
            Err(RerankError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn malformed_body_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rerank"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let adapter = RemoteRerankAdapter::new(config(&server.uri())).unwrap();
        assert!(matches!(
            adapter.score("q", &docs()).await,
            Err(RerankError::Failed(_))
        ));
    }

    #[test]
    fn timeout_keeps_its_duration() {
        assert_eq!(
            map_error(InferenceError::Timeout(150)),
            RerankError::Timeout(Duration::from_millis(150))
        );
    }
}
