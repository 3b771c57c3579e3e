//! Memory retrieval domain types.
//!
//! The retriever is a two-stage state machine (precise `query` mode, then
//! a broader `search` fallback) over an external indexing tool. It never
//! raises: every call yields a [`RetrievalResult`], and a failed call
//! carries a structured [`RetrievalError`] preserving *why* each stage
//! failed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Which external tool mode produced a record / satisfied a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    /// Precise first-stage retrieval.
    Query,
    /// Broader fallback retrieval.
    Search,
}

impl RetrievalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMode::Query => "query",
            RetrievalMode::Search => "search",
        }
    }
}

impl std::fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One retrieved memory. Never mutated after parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub text: String,
    pub source: String,
    pub score: f64,
    pub mode: RetrievalMode,
}

/// Classified failure of a single retrieval attempt or of a whole call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalFailure {
    /// Query was empty after normalization; no attempt was made.
    InvalidQuery,
    /// Namespace resolved to an empty string; no attempt was made.
    InvalidNamespace,
    /// `top_k` was zero; no attempt was made.
    InvalidTopK,
    /// The external tool could not be started.
    SpawnError,
    /// The attempt exceeded its stage timeout and was killed.
    Timeout,
    /// The tool exited with a non-zero status.
    NonZeroExit,
    /// The tool's stdout did not satisfy the JSON shape contract.
    ParseError,
    /// Both the query attempt and the search fallback failed.
    BothFailed,
}

impl RetrievalFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalFailure::InvalidQuery => "invalid_query",
            RetrievalFailure::InvalidNamespace => "invalid_namespace",
            RetrievalFailure::InvalidTopK => "invalid_top_k",
            RetrievalFailure::SpawnError => "spawn_error",
            RetrievalFailure::Timeout => "timeout",
            RetrievalFailure::NonZeroExit => "non_zero_exit",
            RetrievalFailure::ParseError => "parse_error",
            RetrievalFailure::BothFailed => "both_failed",
        }
    }
}

impl std::fmt::Display for RetrievalFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured diagnosis of a failed retrieval call. When `kind` is
/// [`RetrievalFailure::BothFailed`], the per-stage kinds record what
/// happened to each attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalError {
    pub kind: RetrievalFailure,
    pub message: String,
    pub query_failure: Option<RetrievalFailure>,
    pub fallback_failure: Option<RetrievalFailure>,
}

impl RetrievalError {
    /// A terminal error raised before any external attempt.
    pub fn invalid(kind: RetrievalFailure, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            query_failure: None,
            fallback_failure: None,
        }
    }

    /// Both stages were attempted and both failed.
    pub fn both_failed(query: RetrievalFailure, fallback: RetrievalFailure) -> Self {
        Self {
            kind: RetrievalFailure::BothFailed,
            message: "Both query and search retrieval attempts failed".into(),
            query_failure: Some(query),
            fallback_failure: Some(fallback),
        }
    }
}

/// The outcome of one retrieval call. Exactly one of (`records` +
/// `mode`, `error`) is meaningful.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub records: Vec<MemoryRecord>,
    pub mode: Option<RetrievalMode>,
    pub used_fallback: bool,
    pub error: Option<RetrievalError>,
}

impl RetrievalResult {
    pub fn success(records: Vec<MemoryRecord>, mode: RetrievalMode) -> Self {
        Self {
            records,
            mode: Some(mode),
            used_fallback: mode == RetrievalMode::Search,
            error: None,
        }
    }

    /// Terminal failure before any attempt was made.
    pub fn rejected(error: RetrievalError) -> Self {
        Self {
            records: Vec::new(),
            mode: None,
            used_fallback: false,
            error: Some(error),
        }
    }

    /// Terminal failure after both attempts were exhausted.
    pub fn exhausted(error: RetrievalError) -> Self {
        Self {
            records: Vec::new(),
            mode: None,
            used_fallback: true,
            error: Some(error),
        }
    }
}

/// The retrieval seam the pipeline depends on. Implemented by the
/// external-tool adapter; stubbed in tests.
#[async_trait]
pub trait MemoryRetrieval: Send + Sync {
    /// Retrieve relevant memories for `query` within `namespace`.
    ///
    /// Must never panic or return a transport error: failures are
    /// reported inside the [`RetrievalResult`].
    async fn retrieve(
        &self,
        query: &str,
        namespace: Option<&str>,
        top_k: Option<usize>,
    ) -> RetrievalResult;
}
