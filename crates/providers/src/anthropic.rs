//! Anthropic native backend.
//!
//! Uses Anthropic's Messages API directly (not an OpenAI-compatible
//! proxy): `x-api-key` header authentication, `anthropic-version`
//! header, system prompt as a top-level field.

use async_trait::async_trait;
use eidolon_config::ModelConfig;
use eidolon_core::{CompletionClient, CompletionError, CompletionRequest, CompletionResponse};
use serde::Deserialize;
use tracing::{debug, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic native Messages API client.
#[derive(Debug)]
pub struct AnthropicClient {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        config: &ModelConfig,
    ) -> std::result::Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs_f64(config.timeout_seconds))
            .build()
            .map_err(|e| {
                CompletionError::NotConfigured(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            name: "anthropic".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            client,
        })
    }

    /// Use a custom base URL (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn collect_text(resp: &MessagesResponse) -> String {
        let mut text = String::new();
        for block in &resp.content {
            if let ResponseContentBlock::Text { text: t } = block {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(t);
            }
        }
        text.trim().to_string()
    }

    fn into_completion(
        resp: MessagesResponse,
    ) -> std::result::Result<CompletionResponse, CompletionError> {
        let text = Self::collect_text(&resp);
        if text.is_empty() {
            return Err(CompletionError::EmptyCompletion);
        }
        Ok(CompletionResponse {
            text,
            model: resp.model,
            stop_reason: resp.stop_reason,
            input_tokens: resp.usage.input_tokens,
            output_tokens: resp.usage.output_tokens,
        })
    }
}

#[async_trait]
impl CompletionClient for AnthropicClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, CompletionError> {
        let url = format!("{}/v1/messages", self.base_url);

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens.unwrap_or(self.max_tokens),
            "temperature": request.temperature.unwrap_or(self.temperature),
            "system": request.system_prompt,
            "messages": [{"role": "user", "content": request.user_prompt}],
        });

        debug!(provider = "anthropic", model = %self.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout(e.to_string())
                } else {
                    CompletionError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(CompletionError::RateLimited { retry_after_secs });
        }
        if status == 401 || status == 403 {
            return Err(CompletionError::AuthenticationFailed(
                "Invalid Anthropic API key".into(),
            ));
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Anthropic API error");
            return Err(CompletionError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_resp: MessagesResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::InvalidResponse(e.to_string()))?;

        Self::into_completion(api_resp)
    }
}

// --- Anthropic API types ---

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: String,
    content: Vec<ResponseContentBlock>,
    usage: MessagesUsage,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    input_tokens: u32,
    output_tokens: u32,
}
