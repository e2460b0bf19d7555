use async_trait::async_trait;
use rand::Rng;
use rand::SeedableRng;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::debug;

use crate::application::EmbeddingService;
use crate::domain::{DomainError, EmbeddingConfig};

/// Deterministic, offline embeddings: the same text always maps to the same
/// unit vector.
pub struct MockEmbedding {
    config: EmbeddingConfig,
}

impl MockEmbedding {
    pub fn new() -> Self {
        Self::with_dimensions(384)
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            config: EmbeddingConfig::new("mock-embedding", dimensions),
        }
    }

    fn generate_embedding(&self, text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();

        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let mut vector: Vec<f32> = (0..self.config.dimensions())
            .map(|_| rng.gen_range(-1.0..1.0))
            .collect();

        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for x in &mut vector {
                *x /= magnitude;
            }
        }

        vector
    }
}

impl Default for MockEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingService for MockEmbedding {
    async fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
        let vectors: Vec<Vec<f32>> = texts
            .iter()
            .map(|text| self.generate_embedding(text))
            .collect();
        debug!("Generated {} mock embeddings", vectors.len());
        vectors
    }

    async fn health_check(&self) -> Result<(), DomainError> {
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
    async fn test_mock_embedding_consistency() {
        let service = MockEmbedding::new();

        let embedding1 = service.embed_one("blue cotton shirt").await;
        let embedding2 = service.embed_one("blue cotton shirt").await;

        assert_eq!(embedding1, embedding2);
    }

    #[tokio::test]
    async fn test_mock_embedding_dimensions() {
        let service = MockEmbedding::with_dimensions(128);

        let embedding = service.embed_one("test").await;

        assert_eq!(embedding.len(), 128);
        assert_eq!(service.dimension(), 128);
    }

    #[tokio::test]
    async fn test_mock_embedding_normalized() {
        let service = MockEmbedding::new();

        let embedding = service.embed_one("test").await;
        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();

        assert!((magnitude - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_empty_input_gives_empty_output() {
        let service = MockEmbedding::new();
        assert!(service.embed(&[]).await.is_empty());
    }
}
