//! Embedding provider boundary.
//!
//! The store never computes embeddings itself; it asks an [`EmbeddingProvider`].
//! [`OpenAiEmbedder`] talks to any OpenAI-compatible `/embeddings` endpoint.

use crate::config::EmbeddingSettings;
use crate::error::{LectroError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Turns `text` into a vector. Never substitutes a default on failure.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

pub struct OpenAiEmbedder {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetails,
}

#[derive(Deserialize)]
struct ApiErrorDetails {
    message: String,
}

impl OpenAiEmbedder {
    pub fn new(settings: &EmbeddingSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| LectroError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(OpenAiEmbedder {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone().filter(|key| !key.trim().is_empty()),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            LectroError::Configuration("no embedding API key configured (set OPENAI_API_KEY)".to_string())
        })?;

        let text = text.trim();
        if text.is_empty() {
            return Err(LectroError::validation("text to embed is empty"));
        }

        let url = self.endpoint();
        debug!(%url, model = %self.model, chars = text.len(), "requesting embedding");

        let resp = self.client
            .post(&url)
            .bearer_auth(api_key)
            .json(&EmbeddingRequest { model: &self.model, input: text })
            .send()
            .await
            .map_err(|e| LectroError::provider(format!("request to {} failed: {}", url, e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            return Err(LectroError::provider(format!("{} returned {}: {}", url, status, message)));
        }

        let parsed: EmbeddingResponse = resp.json()
            .await
            .map_err(|e| LectroError::provider(format!("malformed embedding response: {}", e)))?;

        match parsed.data.into_iter().next() {
            Some(data) if !data.embedding.is_empty() => Ok(data.embedding),
            _ => Err(LectroError::provider("response contained no embedding")),
        }
    }
}

#[cfg(test)]
mod embedding_test {
    use super::*;
    use actix_web::{web, App, HttpResponse, HttpServer};
    use std::net::TcpListener;

    fn free_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    fn settings(base_url: String, api_key: Option<&str>) -> EmbeddingSettings {
        EmbeddingSettings {
            base_url,
            api_key: api_key.map(str::to_string),
            timeout_secs: 5,
            ..EmbeddingSettings::default()
        }
    }

    /// Starts a fake provider answering `/embeddings` with `reply`.
    fn fake_provider(port: u16, status: u16, reply: serde_json::Value) -> actix_web::dev::ServerHandle {
        let server = HttpServer::new(move || {
            let reply = reply.clone();
            App::new().route(
                "/v1/embeddings",
                web::post().to(move || {
                    let reply = reply.clone();
                    async move {
                        HttpResponse::build(actix_web::http::StatusCode::from_u16(status).unwrap()).json(reply)
                    }
                }),
            )
        })
        .workers(1)
        .bind(("127.0.0.1", port))
        .unwrap()
        .run();
        let handle = server.handle();
        actix_web::rt::spawn(server);
        handle
    }

    #[actix_web::test]
    async fn test_missing_api_key_is_configuration_error() {
        let embedder = OpenAiEmbedder::new(&settings("http://127.0.0.1:1".to_string(), None)).unwrap();

        let result = embedder.embed("hello").await;
        assert!(matches!(result, Err(LectroError::Configuration(_))));
    }

    #[actix_web::test]
    async fn test_blank_api_key_counts_as_missing() {
        let embedder = OpenAiEmbedder::new(&settings("http://127.0.0.1:1".to_string(), Some("  "))).unwrap();

        assert!(matches!(embedder.embed("hello").await, Err(LectroError::Configuration(_))));
    }

    #[actix_web::test]
    async fn test_empty_text_is_validation_error() {
        let embedder = OpenAiEmbedder::new(&settings("http://127.0.0.1:1".to_string(), Some("sk-test"))).unwrap();

        assert!(matches!(embedder.embed("   ").await, Err(LectroError::Validation(_))));
    }

    #[actix_web::test]
    async fn test_unreachable_provider_is_provider_error() {
        let port = free_port();
        let embedder = OpenAiEmbedder::new(&settings(format!("http://127.0.0.1:{}/v1", port), Some("sk-test"))).unwrap();

        assert!(matches!(embedder.embed("hello").await, Err(LectroError::Provider(_))));
    }

    #[actix_web::test]
    async fn test_successful_embedding() {
        let port = free_port();
        let handle = fake_provider(port, 200, serde_json::json!({
            "data": [{"embedding": [0.25, -0.5, 1.0], "index": 0}]
        }));
        actix_web::rt::time::sleep(Duration::from_millis(200)).await;

        let embedder = OpenAiEmbedder::new(&settings(format!("http://127.0.0.1:{}/v1/", port), Some("sk-test"))).unwrap();
        let embedding = embedder.embed("a quiet sea").await.unwrap();

        assert_eq!(embedding, vec![0.25, -0.5, 1.0]);
        handle.stop(true).await;
    }

    #[actix_web::test]
    async fn test_provider_error_message_is_surfaced() {
        let port = free_port();
        let handle = fake_provider(port, 429, serde_json::json!({
            "error": {"message": "You exceeded your current quota", "type": "insufficient_quota"}
        }));
        actix_web::rt::time::sleep(Duration::from_millis(200)).await;

        let embedder = OpenAiEmbedder::new(&settings(format!("http://127.0.0.1:{}/v1", port), Some("sk-test"))).unwrap();

        match embedder.embed("hello").await {
            Err(LectroError::Provider(msg)) => assert!(msg.contains("exceeded your current quota")),
            other => panic!("Expected provider error, got {:?}", other),
        }
        handle.stop(true).await;
    }

    #[actix_web::test]
    async fn test_empty_data_is_provider_error() {
        let port = free_port();
        let handle = fake_provider(port, 200, serde_json::json!({ "data": [] }));
        actix_web::rt::time::sleep(Duration::from_millis(200)).await;

        let embedder = OpenAiEmbedder::new(&settings(format!("http://127.0.0.1:{}/v1", port), Some("sk-test"))).unwrap();

        assert!(matches!(embedder.embed("hello").await, Err(LectroError::Provider(_))));
        handle.stop(true).await;
    }
}
