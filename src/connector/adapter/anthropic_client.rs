use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::application::{Completion, CompletionRequest, LlmProvider};
use crate::domain::DomainError;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const MESSAGES_PATH: &str = "/v1/messages";
const ANTHROPIC_API_VERSION: &str = "2023-06-01";
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20240620";
/// USD per million tokens.
const INPUT_PRICE: f64 = 3.0;
const OUTPUT_PRICE: f64 = 15.0;

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ApiMessage<'a>>,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

/// HTTP client for the Anthropic Messages API.
///
/// Timeouts are tight (2s connect, 5s total) because re-ranking sits on
/// the page-render path.
///
/// ```text
/// ANTHROPIC_BASE_URL=https://api.anthropic.com
/// ANTHROPIC_API_KEY=sk-ant-...
/// ANTHROPIC_MODEL=claude-3-5-sonnet-20240620
/// ```
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    url: String,
}

impl AnthropicClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let base: String = base_url.into();
        let url = format!("{}{MESSAGES_PATH}", base.trim_end_matches('/'));
        Self {
            client: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(2))
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            model: model.into(),
            url,
        }
    }

    pub fn from_env() -> Self {
        let base = std::env::var("ANTHROPIC_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("ANTHROPIC_MODEL")
            .unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let key = std::env::var("ANTHROPIC_API_KEY").unwrap_or_default();
        Self::new(key, model, base)
    }
}

#[async_trait]
impl LlmProvider for AnthropicClient {
    async fn send_prompt(&self, request: &CompletionRequest) -> Result<Completion, DomainError> {
        if !self.is_available() {
            return Err(DomainError::configuration("Anthropic API key is not configured"));
        }

        let model = request.model.as_deref().unwrap_or(&self.model);
        let body = ApiRequest {
            model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: vec![ApiMessage {
                role: "user",
                content: &request.prompt,
            }],
        };

        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| DomainError::llm(format!("Anthropic request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Anthropic API returned {status}: {body}");
            return Err(DomainError::llm(format!("Anthropic API returned {status}")));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| DomainError::llm(format!("Failed to parse Anthropic response: {e}")))?;

        let text = api_response
            .content
            .into_iter()
            .next()
            .map(|b| b.text)
            .ok_or_else(|| DomainError::llm("Anthropic response carried no content"))?;

        debug!(
            input_tokens = api_response.usage.input_tokens,
            output_tokens = api_response.usage.output_tokens,
            "Received Anthropic completion"
        );

        Ok(Completion {
            text,
            model: api_response.model.unwrap_or_else(|| model.to_string()),
            input_tokens: api_response.usage.input_tokens,
            output_tokens: api_response.usage.output_tokens,
        })
    }

    fn is_available(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    fn provider_name(&self) -> &str {
        "claude"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn estimate_cost(&self, completion: &Completion) -> f64 {
        (completion.input_tokens as f64 * INPUT_PRICE + completion.output_tokens as f64 * OUTPUT_PRICE)
            / 1_000_000.0
    }
}
