//! Integration tests for the HTTP engines using WireMock
//!
//! These tests mock the Ollama embed API and a `/rerank` service to verify
//! client behavior without requiring real servers.

use ai_core::{
    EmbeddingConfig, InferenceError, OllamaEmbeddingEngine, RemoteRerankClient,
    RemoteRerankConfig,
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path},
};

// =============================================================================
// Test Helpers
// =============================================================================

fn embedding_config_for_mock(base_url: &str, dimensions: usize) -> EmbeddingConfig {
    EmbeddingConfig {
        base_url: base_url.to_string(),
        model: "bge-m3".to_string(),
        timeout_ms: 5000,
        dimensions,
    }
}

fn rerank_config_for_mock(base_url: &str) -> RemoteRerankConfig {
    RemoteRerankConfig {
        base_url: base_url.to_string(),
        model: None,
        api_key: None,
        timeout_ms: 5000,
    }
}

#[allow(clippy::cast_precision_loss)]
fn vector(dimensions: usize, offset: usize) -> Vec<f32> {
    (0..dimensions).map(|i| ((i + offset) as f32) / dimensions as f32).collect()
}

// =============================================================================
// Embedding Tests
// =============================================================================

mod embedding_tests {
    use super::*;

    #[tokio::test]
    async fn embed_single_text_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .and(body_partial_json(serde_json::json!({"model": "bge-m3"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"embeddings": [vector(8, 0)]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let engine = OllamaEmbeddingEngine::new(embedding_config_for_mock(&server.uri(), 8)).unwrap();
        let embedding = engine.embed("Điều kiện tham gia đấu thầu").await.unwrap();
        assert_eq!(embedding.len(), 8);
    }

    #[tokio::test]
    async fn embed_accepts_legacy_single_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"embedding": vector(4, 1)})),
            )
            .mount(&server)
            .await;

        let engine = OllamaEmbeddingEngine::new(embedding_config_for_mock(&server.uri(), 4)).unwrap();
        assert_eq!(engine.embed("q").await.unwrap(), vector(4, 1));
    }

    #[tokio::test]
    async fn embed_batch_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"embeddings": [vector(4, 0), vector(4, 1), vector(4, 2)]}),
            ))
            .mount(&server)
            .await;

        let engine = OllamaEmbeddingEngine::new(embedding_config_for_mock(&server.uri(), 4)).unwrap();
        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let embeddings = engine.embed_batch(&texts).await.unwrap();
        assert_eq!(embeddings.len(), 3);
        assert_eq!(embeddings[2], vector(4, 2));
    }

    #[tokio::test]
    async fn embed_batch_empty_skips_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let engine = OllamaEmbeddingEngine::new(embedding_config_for_mock(&server.uri(), 4)).unwrap();
        assert!(engine.embed_batch(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn embed_wrong_dimension_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"embeddings": [vector(3, 0)]})),
            )
            .mount(&server)
            .await;

        let engine = OllamaEmbeddingEngine::new(embedding_config_for_mock(&server.uri(), 4)).unwrap();
        let err = engine.embed("q").await.unwrap_err();
        assert!(matches!(
            err,
            InferenceError::DimensionMismatch {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[tokio::test]
    async fn embed_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let engine = OllamaEmbeddingEngine::new(embedding_config_for_mock(&server.uri(), 4)).unwrap();
        assert!(matches!(
            engine.embed("q").await.unwrap_err(),
            InferenceError::ServerError(_)
        ));
    }

    #[tokio::test]
    async fn embed_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let engine = OllamaEmbeddingEngine::new(embedding_config_for_mock(&server.uri(), 4)).unwrap();
        assert!(matches!(
            engine.embed("q").await.unwrap_err(),
            InferenceError::InvalidResponse(_)
        ));
    }
}

// =============================================================================
// Remote Rerank Tests
// =============================================================================

mod rerank_tests {
    use super::*;

    #[tokio::test]
    async fn scores_come_back_in_input_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rerank"))
            .and(body_partial_json(
                serde_json::json!({"query": "bid bond", "texts": ["a", "b"]}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"index": 1, "score": 0.8},
                {"index": 0, "score": 0.2}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = RemoteRerankClient::new(rerank_config_for_mock(&server.uri())).unwrap();
        let scores = client.score("bid bond", &["a", "b"]).await.unwrap();
        assert_eq!(scores, vec![0.2, 0.8]);
    }

    #[tokio::test]
    async fn bearer_token_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rerank"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{"index": 0, "relevance_score": 0.5}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = RemoteRerankConfig {
            api_key: Some("secret".to_string()),
            ..rerank_config_for_mock(&server.uri())
        };
        let client = RemoteRerankClient::new(config).unwrap();
        assert_eq!(client.score("q", &["a"]).await.unwrap(), vec![0.5]);
    }

    #[tokio::test]
    async fn quota_exhaustion_maps_to_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rerank"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = RemoteRerankClient::new(rerank_config_for_mock(&server.uri())).unwrap();
        assert!(matches!(
            client.score("q", &["a"]).await.unwrap_err(),
            InferenceError::RateLimited
        ));
    }

    #[tokio::test]
    async fn slow_service_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rerank"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(std::time::Duration::from_millis(500))
                    .set_body_json(serde_json::json!([])),
            )
            .mount(&server)
            .await;

        let config = RemoteRerankConfig {
            timeout_ms: 50,
            ..rerank_config_for_mock(&server.uri())
        };
        let client = RemoteRerankClient::new(config).unwrap();
        assert!(matches!(
            client.score("q", &["a"]).await.unwrap_err(),
            InferenceError::Timeout(50)
        ));
    }

    #[tokio::test]
    async fn unreachable_service_fails_to_connect() {
        let client = RemoteRerankClient::new(rerank_config_for_mock("http://127.0.0.1:1")).unwrap();
        assert!(client.score("q", &["a"]).await.is_err());
    }
}
