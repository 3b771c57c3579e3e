//! OpenAI-compatible backend.
//!
//! Works with any server exposing a `/v1/chat/completions` endpoint
//! (OpenAI, vLLM, Ollama, proxies). Bearer authentication.

use async_trait::async_trait;
use eidolon_config::ModelConfig;
use eidolon_core::{CompletionClient, CompletionError, CompletionRequest, CompletionResponse};
use serde::Deserialize;
use tracing::{debug, warn};

/// OpenAI-compatible chat completions client.
#[derive(Debug)]
pub struct OpenAiCompatClient {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        config: &ModelConfig,
    ) -> std::result::Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs_f64(config.timeout_seconds))
            .build()
            .map_err(|e| {
                CompletionError::NotConfigured(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            name: "openai".into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            client,
        })
    }

    fn into_completion(
        resp: ChatCompletionResponse,
    ) -> std::result::Result<CompletionResponse, CompletionError> {
        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or(CompletionError::EmptyCompletion)?;

        let text = choice.message.content.unwrap_or_default().trim().to_string();
        if text.is_empty() {
            return Err(CompletionError::EmptyCompletion);
        }

        let usage = resp.usage.unwrap_or_default();
        Ok(CompletionResponse {
            text,
            model: resp.model,
            stop_reason: choice.finish_reason,
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens.unwrap_or(self.max_tokens),
            "temperature": request.temperature.unwrap_or(self.temperature),
            "messages": [
                {"role": "system", "content": request.system_prompt},
                {"role": "user", "content": request.user_prompt},
            ],
        });

        debug!(provider = "openai", model = %self.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
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
                "Invalid API key".into(),
            ));
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Chat completions API error");
            return Err(CompletionError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_resp: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::InvalidResponse(e.to_string()))?;

        Self::into_completion(api_resp)
    }
}

// --- OpenAI API types ---

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    model: String,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_config() -> ModelConfig {
        ModelConfig {
            provider: "openai".into(),
            name: "gpt-4o".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            max_tokens: 500,
            temperature: 0.7,
            timeout_seconds: 30.0,
            base_url: None,
            prompt_token_budget: 2000,
        }
    }

    #[test]
    fn constructor_trims_trailing_slash() {
        let client = OpenAiCompatClient::new(
            "sk-test",
            "gpt-4o",
            "http://localhost:8000/v1/",
            &model_config(),
        )
        .unwrap();
        assert_eq!(client.base_url, "http://localhost:8000/v1");
        assert_eq!(client.name(), "openai");
    }

    #[test]
    fn parse_chat_response() {
        let resp: ChatCompletionResponse = serde_json::from_str(
            r#"{
                "model": "gpt-4o",
                "choices": [{
                    "message": {"role": "assistant", "content": " A reply. "},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 90, "completion_tokens": 12, "total_tokens": 102}
            }"#,
        )
        .unwrap();

        let completion = OpenAiCompatClient::into_completion(resp).unwrap();
        assert_eq!(completion.text, "A reply.");
        assert_eq!(completion.input_tokens, 90);
        assert_eq!(completion.output_tokens, 12);
        assert_eq!(completion.stop_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn missing_usage_defaults_to_zero() {
        let resp: ChatCompletionResponse = serde_json::from_str(
            r#"{
                "model": "gpt-4o",
                "choices": [{"message": {"content": "hi"}}]
            }"#,
        )
        .unwrap();

        let completion = OpenAiCompatClient::into_completion(resp).unwrap();
        assert_eq!(completion.input_tokens, 0);
        assert_eq!(completion.output_tokens, 0);
    }

    #[test]
    fn no_choices_is_empty_completion() {
        let resp: ChatCompletionResponse =
            serde_json::from_str(r#"{"model": "gpt-4o", "choices": []}"#).unwrap();
        let err = OpenAiCompatClient::into_completion(resp).unwrap_err();
        assert_eq!(err.kind(), "empty_completion");
    }

    #[test]
    fn null_content_is_empty_completion() {
        let resp: ChatCompletionResponse = serde_json::from_str(
            r#"{"model": "gpt-4o", "choices": [{"message": {"content": null}}]}"#,
        )
        .unwrap();
        let err = OpenAiCompatClient::into_completion(resp).unwrap_err();
        assert_eq!(err.kind(), "empty_completion");
    }
}
