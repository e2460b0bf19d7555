use serde::{Deserialize, Serialize};

/// Describes the active embedding model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model_name: String,
    pub dimensions: usize,
}

impl EmbeddingConfig {
    pub fn new(model_name: impl Into<String>, dimensions: usize) -> Self {
        Self {
            model_name: model_name.into(),
            dimensions,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_name: "all-MiniLM-L6-v2".to_string(),
            dimensions: 384,
        }
    }
}

/// Convert a vector-store distance into a similarity score in `(0, 1]`.
pub fn similarity_from_distance(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

/// Elementwise mean of equally weighted vectors.
///
/// Vectors whose length differs from the first one are skipped; an empty
/// input yields an empty vector.
pub fn average_vectors(vectors: &[Vec<f32>]) -> Vec<f32> {
    let weighted: Vec<(f32, &[f32])> = vectors.iter().map(|v| (1.0, v.as_slice())).collect();
    weighted_average(&weighted)
}

/// Elementwise `Σ(wᵢ·vᵢ) / Σwᵢ` over the non-empty vectors.
pub fn weighted_average(vectors: &[(f32, &[f32])]) -> Vec<f32> {
    let dimensions = match vectors.iter().find(|(_, v)| !v.is_empty()) {
        Some((_, v)) => v.len(),
        None => return Vec::new(),
    };

    let mut sum = vec![0.0f32; dimensions];
    let mut total_weight = 0.0f32;

    for (weight, vector) in vectors {
        if vector.len() != dimensions || *weight <= 0.0 {
            continue;
        }
        for (acc, value) in sum.iter_mut().zip(vector.iter()) {
            *acc += weight * value;
        }
        total_weight += weight;
    }

    if total_weight <= 0.0 {
        return Vec::new();
    }

    for value in &mut sum {
        *value /= total_weight;
    }
    sum
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
