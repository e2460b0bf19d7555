use async_trait::async_trait;

use crate::domain::DomainError;

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Text-completion backend used for re-ranking.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn send_prompt(&self, request: &CompletionRequest) -> Result<Completion, DomainError>;

    /// Configured well enough to attempt a call (e.g. API key present).
    fn is_available(&self) -> bool;

    fn provider_name(&self) -> &str;

    fn model(&self) -> &str;

    /// Estimated USD cost of a completion.
    fn estimate_cost(&self, completion: &Completion) -> f64;
}
