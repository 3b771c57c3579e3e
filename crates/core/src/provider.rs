//! The completion seam — the abstraction over LLM backends.
//!
//! Eidolon prompts are a single system/user pair; the full
//! conversational state is already folded into them by the prompt
//! builder, so the request contract stays deliberately small.
//!
//! Implementations: Anthropic Messages API, OpenAI-compatible chat
//! completions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CompletionError;

/// One completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,

    /// Override the backend's configured max output tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Override the backend's configured temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            max_tokens: None,
            temperature: None,
        }
    }
}

/// One completion response. `text` is guaranteed non-empty: a transport
/// success carrying no text is reported as
/// [`CompletionError::EmptyCompletion`] by the backend adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub text: String,
    /// Which model actually responded (may differ from requested).
    pub model: String,
    pub stop_reason: Option<String>,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// The completion trait every LLM backend implements.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// A human-readable name for this backend (e.g. "anthropic").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, CompletionError>;
}
