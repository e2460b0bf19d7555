use async_trait::async_trait;

use crate::domain::{DomainError, EmbeddingConfig};

/// Turns text into fixed-dimension vectors.
///
/// Failures never surface from `embed`: the implementation logs and returns
/// an empty list, which callers must treat as "cannot proceed".
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Vec<Vec<f32>>;

    async fn embed_one(&self, text: &str) -> Vec<f32> {
        self.embed(&[text.to_string()])
            .await
            .into_iter()
            .next()
            .unwrap_or_default()
    }

    /// Probe the backing service, surfacing the failure reason.
    async fn health_check(&self) -> Result<(), DomainError>;

    async fn is_available(&self) -> bool {
        self.health_check().await.is_ok()
    }

    fn config(&self) -> &EmbeddingConfig;

    fn dimension(&self) -> usize {
        self.config().dimensions()
    }
}
