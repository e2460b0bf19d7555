use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::application::{Completion, CompletionRequest, LlmProvider};
use crate::domain::DomainError;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4-turbo-preview";
const SYSTEM_PROMPT: &str = "You are an intelligent e-commerce product recommendation system. \
You analyze products and customer context to provide highly relevant, personalized product recommendations.";
/// USD per million tokens.
const INPUT_PRICE: f64 = 10.0;
const OUTPUT_PRICE: f64 = 30.0;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
    response_format: serde_json::Value,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Chat Completions client requesting JSON-object output.
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    url: String,
}

impl OpenAiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let base: String = base_url.into();
        Self {
            client: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(2))
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            model: model.into(),
            url: format!("{}/v1/chat/completions", base.trim_end_matches('/')),
        }
    }

    pub fn from_env() -> Self {
        let base = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_OPENAI_BASE_URL.to_string());
        let model = std::env::var("OPENAI_MODEL")
            .unwrap_or_else(|_| DEFAULT_OPENAI_MODEL.to_string());
        let key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        Self::new(key, model, base)
    }
}

#[async_trait]
impl LlmProvider for OpenAiClient {
    async fn send_prompt(&self, request: &CompletionRequest) -> Result<Completion, DomainError> {
        if !self.is_available() {
            return Err(DomainError::configuration("OpenAI API key is not configured"));
        }

        let model = request.model.as_deref().unwrap_or(&self.model);
        let body = ChatRequest {
            model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            response_format: json!({ "type": "json_object" }),
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DomainError::llm(format!("OpenAI request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("OpenAI API returned {status}: {body}");
            return Err(DomainError::llm(format!("OpenAI API returned {status}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| DomainError::llm(format!("Failed to parse OpenAI response: {e}")))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| DomainError::llm("OpenAI response carried no content"))?;

        Ok(Completion {
            text,
            model: parsed.model.unwrap_or_else(|| model.to_string()),
            input_tokens: parsed.usage.prompt_tokens,
            output_tokens: parsed.usage.completion_tokens,
        })
    }

    fn is_available(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn estimate_cost(&self, completion: &Completion) -> f64 {
        (completion.input_tokens as f64 * INPUT_PRICE + completion.output_tokens as f64 * OUTPUT_PRICE)
            / 1_000_000.0
    }
}
