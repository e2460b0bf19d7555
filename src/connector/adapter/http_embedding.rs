use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::application::EmbeddingService;
use crate::domain::{DomainError, EmbeddingConfig};

pub const DEFAULT_EMBEDDING_URL: &str = "http://localhost:8001";

#[derive(Serialize)]
struct EmbedRequest<'a> {
    texts: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct HealthResponse {
    #[serde(default)]
    status: String,
}

/// Client for a remote embedding service exposing `POST /embed` and
/// `GET /health`.
///
/// No retries; a failed call logs and yields no vectors.
pub struct HttpEmbedding {
    client: reqwest::Client,
    base_url: String,
    config: EmbeddingConfig,
}

impl HttpEmbedding {
    pub fn new(base_url: impl Into<String>, config: EmbeddingConfig) -> Self {
        let base: String = base_url.into();
        Self {
            client: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            base_url: base.trim_end_matches('/').to_string(),
            config,
        }
    }

    /// `EMBEDDING_URL`, falling back to a local service.
    pub fn from_env(config: EmbeddingConfig) -> Self {
        let base = std::env::var("EMBEDDING_URL")
            .unwrap_or_else(|_| DEFAULT_EMBEDDING_URL.to_string());
        Self::new(base, config)
    }

    async fn request_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        let response = self
            .client
            .post(format!("{}/embed", self.base_url))
            .json(&EmbedRequest { texts })
            .send()
            .await
            .map_err(|e| DomainError::embedding(format!("Embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Embedding service returned {status}: {body}");
            return Err(DomainError::embedding(format!(
                "Embedding service returned {status}"
            )));
        }

        let parsed: EmbedResponse = response.json().await.map_err(|e| {
            DomainError::embedding(format!("Failed to parse embedding response: {}", e))
        })?;
        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl EmbeddingService for HttpEmbedding {
    async fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
        if texts.is_empty() {
            return Vec::new();
        }
        match self.request_embeddings(texts).await {
            Ok(vectors) => {
                debug!("Received {} embeddings", vectors.len());
                vectors
            }
            Err(e) => {
                warn!("{}", e);
                Vec::new()
            }
        }
    }

    async fn health_check(&self) -> Result<(), DomainError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(|e| DomainError::embedding(format!("Embedding service unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(DomainError::embedding(format!(
                "Embedding health check returned {}",
                response.status()
            )));
        }

        let health: HealthResponse = response
            .json()
            .await
            .map_err(|e| DomainError::embedding(format!("Invalid health response: {}", e)))?;
        if health.status != "ok" {
            return Err(DomainError::embedding(format!(
                "Embedding service reports status '{}'",
                health.status
            )));
        }
        Ok(())
    }

    fn config(&self) -> &EmbeddingConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_service_yields_empty() {
        let service = HttpEmbedding::new("http://127.0.0.1:9/", EmbeddingConfig::default());
        assert_eq!(service.base_url, "http://127.0.0.1:9");
        assert!(service.embed(&["shirt".to_string()]).await.is_empty());
        assert!(!service.is_available().await);
    }

    #[tokio::test]
    async fn test_empty_input_skips_request() {
        let service = HttpEmbedding::new("http://127.0.0.1:9", EmbeddingConfig::default());
        assert!(service.embed(&[]).await.is_empty());
    }
}
