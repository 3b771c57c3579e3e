//! Error types for the Eidolon domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.
//!
//! Retrieval failures are deliberately *not* here: the retriever never
//! raises — it returns a [`crate::memory::RetrievalError`] value inside
//! its result so the pipeline can degrade instead of abort.

use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for all Eidolon operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Chat platform errors ---
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    // --- LLM completion errors ---
    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    // --- Character card errors ---
    #[error("Persona error: {0}")]
    Persona(#[from] PersonaError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Filesystem ---
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures crossing the chat-platform boundary (history fetch, send).
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    #[error("History fetch failed: {0}")]
    HistoryFetch(String),

    #[error("Message delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Channel connection lost: {0}")]
    ConnectionLost(String),
}

impl ChannelError {
    /// Short stable tag used in logs and pipeline outcomes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HistoryFetch(_) => "history_fetch",
            Self::DeliveryFailed(_) => "delivery_failed",
            Self::ConnectionLost(_) => "connection_lost",
        }
    }
}

/// Failures from an LLM completion backend.
#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Response could not be decoded: {0}")]
    InvalidResponse(String),

    /// A transport-level success that carried no usable text. Surfaced as
    /// an error so the pipeline never sends an empty reply.
    #[error("Completion contained no text content")]
    EmptyCompletion,

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl CompletionError {
    /// Short stable tag used in logs and pipeline outcomes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ApiError { .. } => "api_error",
            Self::AuthenticationFailed(_) => "authentication_failed",
            Self::RateLimited { .. } => "rate_limited",
            Self::Timeout(_) => "timeout",
            Self::Network(_) => "network",
            Self::InvalidResponse(_) => "invalid_response",
            Self::EmptyCompletion => "empty_completion",
            Self::NotConfigured(_) => "not_configured",
        }
    }
}

/// Character card loading/validation failures.
#[derive(Debug, Error)]
pub enum PersonaError {
    #[error("Character card file does not exist: {0}")]
    NotFound(PathBuf),

    #[error("Character card is not valid JSON: {path}: {reason}")]
    InvalidJson { path: PathBuf, reason: String },

    #[error("Character card field '{field}' is invalid: {message}")]
    InvalidField { field: String, message: String },
}
