//! LLM completion clients for Eidolon.
//!
//! Both backends implement `eidolon_core::CompletionClient`. The backend
//! is chosen once at construction time from config; there is no runtime
//! provider dispatch.

pub mod anthropic;
pub mod openai_compat;

pub use anthropic::AnthropicClient;
pub use openai_compat::OpenAiCompatClient;

use async_trait::async_trait;
use eidolon_config::ModelConfig;
use eidolon_core::{CompletionClient, CompletionError, CompletionRequest, CompletionResponse, ProcessEnv};

/// The closed set of completion backends.
#[derive(Debug)]
pub enum LlmClient {
    Anthropic(AnthropicClient),
    OpenAiCompat(OpenAiCompatClient),
}

#[async_trait]
impl CompletionClient for LlmClient {
    fn name(&self) -> &str {
        match self {
            LlmClient::Anthropic(client) => client.name(),
            LlmClient::OpenAiCompat(client) => client.name(),
        }
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, CompletionError> {
        match self {
            LlmClient::Anthropic(client) => client.complete(request).await,
            LlmClient::OpenAiCompat(client) => client.complete(request).await,
        }
    }
}

/// Build the configured backend, resolving the API key through env
/// indirection (`model.api_key_env` names the variable).
pub fn build_llm_client(
    config: &ModelConfig,
    env: &ProcessEnv,
) -> std::result::Result<LlmClient, CompletionError> {
    let api_key = env
        .resolve_secret(&config.api_key_env)
        .map_err(|e| CompletionError::NotConfigured(e.to_string()))?;

    match config.provider.trim().to_ascii_lowercase().as_str() {
        "anthropic" => {
            let mut client = AnthropicClient::new(api_key, &config.name, config)?;
            if let Some(base_url) = &config.base_url {
                client = client.with_base_url(base_url);
            }
            Ok(LlmClient::Anthropic(client))
        }
        "openai" => {
            let base_url = config
                .base_url
                .as_deref()
                .unwrap_or("https://api.openai.com/v1");
            let client = OpenAiCompatClient::new(api_key, &config.name, base_url, config)?;
            Ok(LlmClient::OpenAiCompat(client))
        }
        other => Err(CompletionError::NotConfigured(format!(
            "Unknown model provider '{other}'"
        ))),
    }
}
