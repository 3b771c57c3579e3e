//! Two-stage memory retrieval over the external `qmd` tool.
//!
//! Stage one runs `qmd query` (precise, slower); if it fails for any
//! reason the adapter falls back to `qmd search` (broader, cheaper)
//! under a shorter deadline. Every call returns a [`RetrievalResult`];
//! the pipeline degrades on failure instead of aborting.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use eidolon_config::AppConfig;
use eidolon_core::{
    MemoryRecord, MemoryRetrieval, ProcessEnv, RetrievalError, RetrievalFailure, RetrievalMode,
    RetrievalResult,
};

use crate::exec::{ToolCommand, ToolRunner};

const DEFAULT_MAX_QUERY_CHARS: usize = 600;

/// Retrieval adapter for the `qmd` indexing tool.
pub struct QmdRetriever {
    binary: String,
    default_namespace: String,
    default_top_k: usize,
    query_timeout: Duration,
    fallback_timeout: Duration,
    data_home: PathBuf,
    max_query_chars: usize,
    base_env: ProcessEnv,
    runner: Arc<dyn ToolRunner>,
}

impl QmdRetriever {
    pub fn new(config: &AppConfig, base_env: ProcessEnv, runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            binary: config.memory.tool_binary.clone(),
            default_namespace: config.agent.memory_namespace.clone(),
            default_top_k: config.memory.top_k,
            query_timeout: Duration::from_secs_f64(config.memory.query_timeout_seconds),
            fallback_timeout: Duration::from_secs_f64(config.memory.fallback_timeout_seconds),
            data_home: config.runtime.data_home.clone(),
            max_query_chars: DEFAULT_MAX_QUERY_CHARS,
            base_env,
            runner,
        }
    }

    /// Child environment for one namespace. The tool's config and cache
    /// roots are pinned inside the namespace tree so state never leaks
    /// between personas.
    fn build_env(&self, namespace: &str) -> HashMap<String, String> {
        let qmd_root = self.data_home.join("agents").join(namespace).join("qmd");
        let mut env: HashMap<String, String> = self
            .base_env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        env.insert(
            "XDG_CONFIG_HOME".into(),
            qmd_root.join("xdg-config").display().to_string(),
        );
        env.insert(
            "XDG_CACHE_HOME".into(),
            qmd_root.join("xdg-cache").display().to_string(),
        );
        env
    }

    async fn attempt(
        &self,
        mode: RetrievalMode,
        query: &str,
        top_k: usize,
        timeout: Duration,
        env: &HashMap<String, String>,
    ) -> Result<Vec<MemoryRecord>, RetrievalFailure> {
        let command = ToolCommand {
            program: self.binary.clone(),
            args: vec![
                mode.as_str().to_string(),
                "--json".to_string(),
                "-n".to_string(),
                top_k.to_string(),
                query.to_string(),
            ],
            env: env.clone(),
            timeout,
        };

        let output = match self.runner.run(command).await {
            Ok(output) => output,
            Err(e) => {
                warn!(mode = %mode, error = "spawn_error", reason = %e, "retrieval_failure");
                return Err(RetrievalFailure::SpawnError);
            }
        };

        if output.timed_out {
            warn!(mode = %mode, error = "timeout", latency_ms = output.latency_ms, "retrieval_failure");
            return Err(RetrievalFailure::Timeout);
        }
        if output.exit_code != Some(0) {
            warn!(
                mode = %mode,
                error = "non_zero_exit",
                exit_code = ?output.exit_code,
                latency_ms = output.latency_ms,
                "retrieval_failure"
            );
            return Err(RetrievalFailure::NonZeroExit);
        }

        match parse_records(&output.stdout, mode) {
            Ok(records) => {
                info!(
                    mode = %mode,
                    used_fallback = (mode == RetrievalMode::Search),
                    latency_ms = output.latency_ms,
                    records = records.len(),
                    "retrieval_success"
                );
                Ok(records)
            }
            Err(()) => {
                warn!(mode = %mode, error = "parse_error", latency_ms = output.latency_ms, "retrieval_failure");
                Err(RetrievalFailure::ParseError)
            }
        }
    }
}

#[async_trait]
impl MemoryRetrieval for QmdRetriever {
    async fn retrieve(
        &self,
        query: &str,
        namespace: Option<&str>,
        top_k: Option<usize>,
    ) -> RetrievalResult {
        let normalized = normalize_query(query, self.max_query_chars);
        if normalized.is_empty() {
            return RetrievalResult::rejected(RetrievalError::invalid(
                RetrievalFailure::InvalidQuery,
                "Query must contain non-whitespace characters",
            ));
        }

        let namespace = namespace.unwrap_or(&self.default_namespace).trim();
        if namespace.is_empty() {
            return RetrievalResult::rejected(RetrievalError::invalid(
                RetrievalFailure::InvalidNamespace,
                "Namespace is empty",
            ));
        }

        let top_k = top_k.unwrap_or(self.default_top_k);
        if top_k == 0 {
            return RetrievalResult::rejected(RetrievalError::invalid(
                RetrievalFailure::InvalidTopK,
                "top_k must be > 0",
            ));
        }

        let env = self.build_env(namespace);

        let query_failure = match self
            .attempt(
                RetrievalMode::Query,
                &normalized,
                top_k,
                self.query_timeout,
                &env,
            )
            .await
        {
            Ok(records) => return RetrievalResult::success(records, RetrievalMode::Query),
            Err(failure) => failure,
        };

        let fallback_failure = match self
            .attempt(
                RetrievalMode::Search,
                &normalized,
                top_k,
                self.fallback_timeout,
                &env,
            )
            .await
        {
            Ok(records) => return RetrievalResult::success(records, RetrievalMode::Search),
            Err(failure) => failure,
        };

        warn!(
            query_error = %query_failure,
            fallback_error = %fallback_failure,
            "retrieval_exhausted"
        );
        RetrievalResult::exhausted(RetrievalError::both_failed(query_failure, fallback_failure))
    }
}

/// Trim, then hard-cap the query length before it reaches the tool.
fn normalize_query(query: &str, max_chars: usize) -> String {
    let trimmed = query.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    trimmed
        .chars()
        .take(max_chars)
        .collect::<String>()
        .trim_end()
        .to_string()
}

/// Parse tool stdout under the tolerant shape contract: a top-level
/// array, an object with an array under a conventional key, or a single
/// text-bearing object treated as one record.
fn parse_records(raw: &str, mode: RetrievalMode) -> Result<Vec<MemoryRecord>, ()> {
    let payload: Value = serde_json::from_str(raw).map_err(|_| ())?;

    let items: Vec<Value> = match payload {
        Value::Array(items) => items,
        Value::Object(ref map) => {
            let mut found = None;
            for key in ["results", "items", "hits", "data"] {
                if let Some(Value::Array(items)) = map.get(key) {
                    found = Some(items.clone());
                    break;
                }
            }
            match found {
                Some(items) => items,
                // Last resort: a single text-bearing object is one record.
                None if pick_text(&payload).is_some() => vec![payload],
                None => return Err(()),
            }
        }
        _ => return Err(()),
    };

    let mut records = Vec::new();
    for item in &items {
        if !item.is_object() {
            continue;
        }
        let Some(text) = pick_text(item) else {
            continue;
        };
        records.push(MemoryRecord {
            text,
            source: pick_source(item),
            score: pick_score(item),
            mode,
        });
    }
    Ok(records)
}

fn pick_text(item: &Value) -> Option<String> {
    for key in ["text", "content", "snippet"] {
        if let Some(text) = non_empty_str(item.get(key)) {
            return Some(text);
        }
    }
    if let Some(document) = item.get("document") {
        for key in ["text", "content"] {
            if let Some(text) = non_empty_str(document.get(key)) {
                return Some(text);
            }
        }
    }
    None
}

fn pick_source(item: &Value) -> String {
    for key in ["source", "path", "file", "uri", "id"] {
        if let Some(source) = non_empty_str(item.get(key)) {
            return source;
        }
    }
    "unknown".into()
}

fn pick_score(item: &Value) -> f64 {
    for key in ["score", "relevance", "rerank_score", "similarity"] {
        match item.get(key) {
            Some(Value::Number(n)) => {
                if let Some(score) = n.as_f64() {
                    return score;
                }
            }
            Some(Value::String(s)) => {
                if let Ok(score) = s.trim().parse() {
                    return score;
                }
            }
            _ => {}
        }
    }
    0.0
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    let text = value?.as_str()?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::ToolOutput;
    use eidolon_config::{AgentConfig, ChatConfig, MemoryConfig, ModelConfig, RuntimeConfig};
    use std::sync::Mutex;

    fn test_config() -> AppConfig {
        AppConfig {
            agent: AgentConfig {
                persona_name: "Vesper".into(),
                character_card_path: "/tmp/card.json".into(),
                memory_namespace: "vesper".into(),
                skill_ruleset: "coc7e".into(),
            },
            chat: ChatConfig {
                channel_id: 1,
                bot_token_env: "DISCORD_BOT_TOKEN".into(),
                history_size: 25,
                ignore_bot_authors: true,
            },
            model: ModelConfig {
                provider: "anthropic".into(),
                name: "claude-sonnet-4".into(),
                api_key_env: "ANTHROPIC_API_KEY".into(),
                max_tokens: 500,
                temperature: 0.7,
                timeout_seconds: 30.0,
                base_url: None,
                prompt_token_budget: 2000,
            },
            memory: MemoryConfig::default(),
            runtime: RuntimeConfig {
                log_level: "info".into(),
                data_home: "/tmp/eidolon-test".into(),
                dry_run: false,
            },
        }
    }

    /// Scripted runner: pops one canned outcome per invocation and
    /// records every command it saw.
    struct ScriptedRunner {
        outcomes: Mutex<Vec<std::io::Result<ToolOutput>>>,
        seen: Mutex<Vec<ToolCommand>>,
    }

    impl ScriptedRunner {
        fn new(outcomes: Vec<std::io::Result<ToolOutput>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn ok(stdout: &str) -> std::io::Result<ToolOutput> {
            Ok(ToolOutput {
                exit_code: Some(0),
                stdout: stdout.into(),
                stderr: String::new(),
                timed_out: false,
                latency_ms: 12,
            })
        }

        fn timeout() -> std::io::Result<ToolOutput> {
            Ok(ToolOutput {
                exit_code: None,
                stdout: String::new(),
                stderr: String::new(),
                timed_out: true,
                latency_ms: 4000,
            })
        }

        fn exit(code: i32) -> std::io::Result<ToolOutput> {
            Ok(ToolOutput {
                exit_code: Some(code),
                stdout: String::new(),
                stderr: "boom".into(),
                timed_out: false,
                latency_ms: 8,
            })
        }
    }

    #[async_trait]
    impl ToolRunner for ScriptedRunner {
        async fn run(&self, command: ToolCommand) -> std::io::Result<ToolOutput> {
            self.seen.lock().unwrap().push(command);
            self.outcomes.lock().unwrap().remove(0)
        }
    }

    fn retriever(runner: Arc<ScriptedRunner>) -> QmdRetriever {
        QmdRetriever::new(&test_config(), ProcessEnv::default(), runner)
    }

    #[tokio::test]
    async fn query_success_returns_records() {
        let runner = Arc::new(ScriptedRunner::new(vec![ScriptedRunner::ok(
            r#"[{"text": "knows the tavern keeper", "source": "MEMORY.md", "score": 0.92}]"#,
        )]));
        let result = retriever(runner.clone())
            .retrieve("tavern keeper", None, None)
            .await;

        assert!(result.error.is_none());
        assert_eq!(result.mode, Some(RetrievalMode::Query));
        assert!(!result.used_fallback);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].text, "knows the tavern keeper");
        assert_eq!(result.records[0].score, 0.92);

        let seen = runner.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].program, "qmd");
        assert_eq!(
            seen[0].args,
            vec!["query", "--json", "-n", "10", "tavern keeper"]
        );
    }

    #[tokio::test]
    async fn query_timeout_falls_back_to_search() {
        let runner = Arc::new(ScriptedRunner::new(vec![
            ScriptedRunner::timeout(),
            ScriptedRunner::ok(r#"[{"text": "broader hit", "source": "notes.md"}]"#),
        ]));
        let result = retriever(runner.clone())
            .retrieve("tavern", None, None)
            .await;

        assert!(result.error.is_none());
        assert_eq!(result.mode, Some(RetrievalMode::Search));
        assert!(result.used_fallback);
        assert_eq!(result.records[0].mode, RetrievalMode::Search);

        let seen = runner.seen.lock().unwrap();
        assert_eq!(seen[0].args[0], "query");
        assert_eq!(seen[1].args[0], "search");
        // Fallback runs under its own, shorter deadline.
        assert_eq!(seen[0].timeout, Duration::from_secs_f64(4.0));
        assert_eq!(seen[1].timeout, Duration::from_secs_f64(2.0));
    }

    #[tokio::test]
    async fn both_stages_failing_is_exhausted() {
        let runner = Arc::new(ScriptedRunner::new(vec![
            ScriptedRunner::timeout(),
            ScriptedRunner::exit(1),
        ]));
        let result = retriever(runner).retrieve("tavern", None, None).await;

        assert!(result.records.is_empty());
        assert!(result.used_fallback);
        let error = result.error.unwrap();
        assert_eq!(error.kind, RetrievalFailure::BothFailed);
        assert_eq!(error.query_failure, Some(RetrievalFailure::Timeout));
        assert_eq!(error.fallback_failure, Some(RetrievalFailure::NonZeroExit));
    }

    #[tokio::test]
    async fn spawn_error_is_classified() {
        let runner = Arc::new(ScriptedRunner::new(vec![
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no qmd")),
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no qmd")),
        ]));
        let result = retriever(runner).retrieve("tavern", None, None).await;
        let error = result.error.unwrap();
        assert_eq!(error.query_failure, Some(RetrievalFailure::SpawnError));
    }

    #[tokio::test]
    async fn blank_query_is_rejected_without_any_attempt() {
        let runner = Arc::new(ScriptedRunner::new(vec![]));
        let result = retriever(runner.clone()).retrieve("   ", None, None).await;

        let error = result.error.unwrap();
        assert_eq!(error.kind, RetrievalFailure::InvalidQuery);
        assert!(!result.used_fallback);
        assert!(runner.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_top_k_is_rejected() {
        let runner = Arc::new(ScriptedRunner::new(vec![]));
        let result = retriever(runner).retrieve("tavern", None, Some(0)).await;
        assert_eq!(result.error.unwrap().kind, RetrievalFailure::InvalidTopK);
    }

    #[tokio::test]
    async fn blank_namespace_is_rejected() {
        let runner = Arc::new(ScriptedRunner::new(vec![]));
        let result = retriever(runner).retrieve("tavern", Some("  "), None).await;
        assert_eq!(
            result.error.unwrap().kind,
            RetrievalFailure::InvalidNamespace
        );
    }

    #[tokio::test]
    async fn over_length_query_is_truncated_before_invocation() {
        let runner = Arc::new(ScriptedRunner::new(vec![ScriptedRunner::ok("[]")]));
        let long_query = "x".repeat(900);
        let _ = retriever(runner.clone())
            .retrieve(&long_query, None, None)
            .await;

        let seen = runner.seen.lock().unwrap();
        assert_eq!(seen[0].args[4].chars().count(), 600);
    }

    #[tokio::test]
    async fn namespace_env_roots_are_isolated() {
        let runner = Arc::new(ScriptedRunner::new(vec![ScriptedRunner::ok("[]")]));
        let _ = retriever(runner.clone())
            .retrieve("tavern", Some("morgana"), None)
            .await;

        let seen = runner.seen.lock().unwrap();
        assert_eq!(
            seen[0].env.get("XDG_CONFIG_HOME").unwrap(),
            "/tmp/eidolon-test/agents/morgana/qmd/xdg-config"
        );
        assert_eq!(
            seen[0].env.get("XDG_CACHE_HOME").unwrap(),
            "/tmp/eidolon-test/agents/morgana/qmd/xdg-cache"
        );
    }

    #[test]
    fn parse_accepts_object_with_results_key() {
        let records = parse_records(
            r#"{"results": [{"content": "a fact", "path": "a.md", "relevance": "0.5"}]}"#,
            RetrievalMode::Query,
        )
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text, "a fact");
        assert_eq!(records[0].source, "a.md");
        assert_eq!(records[0].score, 0.5);
    }

    #[test]
    fn parse_accepts_single_text_bearing_object() {
        let records = parse_records(
            r#"{"snippet": "lone record", "id": "mem-7"}"#,
            RetrievalMode::Search,
        )
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source, "mem-7");
    }

    #[test]
    fn parse_reads_nested_document_text() {
        let records = parse_records(
            r#"[{"document": {"text": "nested"}, "score": 2}]"#,
            RetrievalMode::Query,
        )
        .unwrap();
        assert_eq!(records[0].text, "nested");
        assert_eq!(records[0].score, 2.0);
    }

    #[test]
    fn parse_drops_textless_records_silently() {
        let records = parse_records(
            r#"[{"score": 0.9}, {"text": "kept"}]"#,
            RetrievalMode::Query,
        )
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text, "kept");
    }

    #[test]
    fn parse_defaults_source_and_score() {
        let records = parse_records(
            r#"[{"text": "fact", "score": "not-a-number"}]"#,
            RetrievalMode::Query,
        )
        .unwrap();
        assert_eq!(records[0].source, "unknown");
        assert_eq!(records[0].score, 0.0);
    }

    #[test]
    fn parse_rejects_invalid_json_and_shapes() {
        assert!(parse_records("not json", RetrievalMode::Query).is_err());
        assert!(parse_records("42", RetrievalMode::Query).is_err());
        assert!(parse_records(r#"{"nothing": true}"#, RetrievalMode::Query).is_err());
    }
}
