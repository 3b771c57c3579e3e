//! Configuration loading, validation, and path layout for Eidolon.
//!
//! Loads configuration from `~/.eidolon/config.toml` with `EIDOLON_*`
//! environment variable overrides. Validates all settings at startup.
//! Secrets are never stored in config: key fields name the environment
//! variable holding the value (`api_key_env`, `bot_token_env`).

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use eidolon_core::ProcessEnv;

/// The root configuration structure.
///
/// Maps directly to `~/.eidolon/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub agent: AgentConfig,

    pub chat: ChatConfig,

    pub model: ModelConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// Persona identity and namespace settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// The persona's display name, used as the reply prefix.
    pub persona_name: String,

    /// Path to the character card JSON file.
    pub character_card_path: PathBuf,

    /// Per-persona memory namespace. Also the directory name under
    /// `<data_home>/agents/`.
    pub memory_namespace: String,

    /// Which ruleset excerpt to embed in the prompt ("coc7e" or "dnd5e").
    #[serde(default = "default_skill_ruleset")]
    pub skill_ruleset: String,
}

fn default_skill_ruleset() -> String {
    "coc7e".into()
}

/// Chat-platform settings. The gateway client itself lives outside this
/// system; these settings parameterize history fetch and triggering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// The single channel the persona watches.
    pub channel_id: u64,

    /// Name of the environment variable holding the bot token.
    #[serde(default = "default_bot_token_env")]
    pub bot_token_env: String,

    /// How many recent messages to fetch per triggered reply.
    #[serde(default = "default_history_size")]
    pub history_size: usize,

    /// Whether messages authored by bots can trigger a reply.
    #[serde(default = "default_true")]
    pub ignore_bot_authors: bool,
}

fn default_bot_token_env() -> String {
    "DISCORD_BOT_TOKEN".into()
}
fn default_history_size() -> usize {
    25
}
fn default_true() -> bool {
    true
}

/// LLM backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// "anthropic" or "openai".
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model name passed through to the backend.
    pub name: String,

    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: f64,

    /// Override the backend base URL (required for OpenAI-compatible
    /// servers that are not api.openai.com).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Estimated-token budget for the assembled prompt.
    #[serde(default = "default_prompt_token_budget")]
    pub prompt_token_budget: usize,
}

fn default_provider() -> String {
    "anthropic".into()
}
fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".into()
}
fn default_max_tokens() -> u32 {
    500
}
fn default_temperature() -> f32 {
    0.7
}
fn default_timeout_seconds() -> f64 {
    30.0
}
fn default_prompt_token_budget() -> usize {
    2000
}

/// External retrieval tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Binary name or path of the retrieval tool.
    #[serde(default = "default_tool_binary")]
    pub tool_binary: String,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_query_timeout")]
    pub query_timeout_seconds: f64,

    #[serde(default = "default_fallback_timeout")]
    pub fallback_timeout_seconds: f64,

    /// Seconds between index refresh cycles.
    #[serde(default = "default_update_interval")]
    pub update_interval_seconds: f64,

    /// Per-step timeout inside a refresh cycle.
    #[serde(default = "default_update_timeout")]
    pub update_timeout_seconds: f64,
}

fn default_tool_binary() -> String {
    "qmd".into()
}
fn default_top_k() -> usize {
    10
}
fn default_query_timeout() -> f64 {
    4.0
}
fn default_fallback_timeout() -> f64 {
    2.0
}
fn default_update_interval() -> f64 {
    300.0
}
fn default_update_timeout() -> f64 {
    60.0
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            tool_binary: default_tool_binary(),
            top_k: default_top_k(),
            query_timeout_seconds: default_query_timeout(),
            fallback_timeout_seconds: default_fallback_timeout(),
            update_interval_seconds: default_update_interval(),
            update_timeout_seconds: default_update_timeout(),
        }
    }
}

/// Process-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Root of all per-agent state. Left empty by the file/default
    /// layer; filled from the load-time environment when unset.
    #[serde(default)]
    pub data_home: PathBuf,

    /// When set, completions run but replies are logged instead of sent.
    #[serde(default)]
    pub dry_run: bool,
}

fn default_log_level() -> String {
    "info".into()
}
impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_home: PathBuf::new(),
            dry_run: false,
        }
    }
}

const VALID_LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
const VALID_PROVIDERS: [&str; 2] = ["anthropic", "openai"];

impl AppConfig {
    /// Load configuration from the default path with environment
    /// overrides applied. `EIDOLON_CONFIG` overrides the path itself.
    pub fn load(env: &ProcessEnv) -> Result<Self, ConfigError> {
        let config_path = match env.get("EIDOLON_CONFIG") {
            Some(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => Self::config_dir(env).join("config.toml"),
        };
        Self::load_from(&config_path, env)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path, env: &ProcessEnv) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ReadError {
                path: path.to_path_buf(),
                reason: "file does not exist".into(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.apply_env_overrides(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `EIDOLON_*` environment overrides. Blank values are ignored.
    fn apply_env_overrides(&mut self, env: &ProcessEnv) -> Result<(), ConfigError> {
        let get = |key: &str| {
            env.get(key)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        if let Some(v) = get("EIDOLON_AGENT_PERSONA_NAME") {
            self.agent.persona_name = v;
        }
        if let Some(v) = get("EIDOLON_AGENT_CHARACTER_CARD_PATH") {
            self.agent.character_card_path = PathBuf::from(v);
        }
        if let Some(v) = get("EIDOLON_AGENT_MEMORY_NAMESPACE") {
            self.agent.memory_namespace = v;
        }
        if let Some(v) = get("EIDOLON_AGENT_SKILL_RULESET") {
            self.agent.skill_ruleset = v;
        }
        if let Some(v) = get("EIDOLON_CHAT_CHANNEL_ID") {
            self.chat.channel_id = parse_override("chat.channel_id", &v)?;
        }
        if let Some(v) = get("EIDOLON_CHAT_HISTORY_SIZE") {
            self.chat.history_size = parse_override("chat.history_size", &v)?;
        }
        if let Some(v) = get("EIDOLON_MODEL_PROVIDER") {
            self.model.provider = v;
        }
        if let Some(v) = get("EIDOLON_MODEL_NAME") {
            self.model.name = v;
        }
        if let Some(v) = get("EIDOLON_MODEL_API_KEY_ENV") {
            self.model.api_key_env = v;
        }
        if let Some(v) = get("EIDOLON_MODEL_BASE_URL") {
            self.model.base_url = Some(v);
        }
        if let Some(v) = get("EIDOLON_MEMORY_TOOL_BINARY") {
            self.memory.tool_binary = v;
        }
        if let Some(v) = get("EIDOLON_RUNTIME_LOG_LEVEL") {
            self.runtime.log_level = v;
        }
        if let Some(v) = get("EIDOLON_RUNTIME_DATA_HOME") {
            self.runtime.data_home = PathBuf::from(v);
        }
        if let Some(v) = get("EIDOLON_RUNTIME_DRY_RUN") {
            self.runtime.dry_run = parse_bool_override("runtime.dry_run", &v)?;
        }
        if self.runtime.data_home.as_os_str().is_empty() {
            self.runtime.data_home = home_dir(env).join(".eidolon");
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn non_empty(field: &str, value: &str) -> Result<(), ConfigError> {
            if value.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "{field} cannot be empty"
                )));
            }
            Ok(())
        }

        non_empty("agent.persona_name", &self.agent.persona_name)?;
        non_empty("agent.memory_namespace", &self.agent.memory_namespace)?;
        non_empty("agent.skill_ruleset", &self.agent.skill_ruleset)?;
        non_empty("chat.bot_token_env", &self.chat.bot_token_env)?;
        non_empty("model.name", &self.model.name)?;
        non_empty("model.api_key_env", &self.model.api_key_env)?;
        non_empty("memory.tool_binary", &self.memory.tool_binary)?;

        if self.chat.channel_id == 0 {
            return Err(ConfigError::ValidationError(
                "chat.channel_id must be a positive integer".into(),
            ));
        }
        if self.chat.history_size == 0 {
            return Err(ConfigError::ValidationError(
                "chat.history_size must be > 0".into(),
            ));
        }

        let provider = self.model.provider.trim().to_ascii_lowercase();
        if !VALID_PROVIDERS.contains(&provider.as_str()) {
            return Err(ConfigError::ValidationError(
                "model.provider must be 'anthropic' or 'openai'".into(),
            ));
        }
        if self.model.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "model.max_tokens must be > 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.model.temperature) {
            return Err(ConfigError::ValidationError(
                "model.temperature must be between 0.0 and 1.0".into(),
            ));
        }
        if self.model.timeout_seconds <= 0.0 {
            return Err(ConfigError::ValidationError(
                "model.timeout_seconds must be > 0".into(),
            ));
        }
        if self.model.prompt_token_budget == 0 {
            return Err(ConfigError::ValidationError(
                "model.prompt_token_budget must be > 0".into(),
            ));
        }

        if self.memory.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "memory.top_k must be > 0".into(),
            ));
        }
        for (field, value) in [
            ("memory.query_timeout_seconds", self.memory.query_timeout_seconds),
            ("memory.fallback_timeout_seconds", self.memory.fallback_timeout_seconds),
            ("memory.update_interval_seconds", self.memory.update_interval_seconds),
            ("memory.update_timeout_seconds", self.memory.update_timeout_seconds),
        ] {
            if value <= 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "{field} must be > 0"
                )));
            }
        }

        let level = self.runtime.log_level.trim().to_ascii_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "runtime.log_level must be one of: {}",
                VALID_LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir(env: &ProcessEnv) -> PathBuf {
        home_dir(env).join(".eidolon")
    }

    /// Root of the configured persona's state tree:
    /// `<data_home>/agents/<namespace>`.
    pub fn namespace_root(&self) -> PathBuf {
        self.runtime
            .data_home
            .join("agents")
            .join(&self.agent.memory_namespace)
    }

    /// Isolated config root handed to the retrieval tool as
    /// `XDG_CONFIG_HOME`.
    pub fn tool_config_root(&self) -> PathBuf {
        self.namespace_root().join("qmd").join("xdg-config")
    }

    /// Isolated cache root handed to the retrieval tool as
    /// `XDG_CACHE_HOME`.
    pub fn tool_cache_root(&self) -> PathBuf {
        self.namespace_root().join("qmd").join("xdg-cache")
    }

    /// Directory holding the daily memory journal files.
    pub fn journal_dir(&self) -> PathBuf {
        self.namespace_root().join("memory").join("memory")
    }

    /// Journal file for a given calendar day.
    pub fn journal_path(&self, date: NaiveDate) -> PathBuf {
        self.journal_dir()
            .join(format!("{}.md", date.format("%Y-%m-%d")))
    }

    /// Render a redacted summary for diagnostics. Secret env var *names*
    /// appear; their values never do.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "agent": {
                "persona_name": self.agent.persona_name,
                "character_card_path": self.agent.character_card_path.display().to_string(),
                "memory_namespace": self.agent.memory_namespace,
                "skill_ruleset": self.agent.skill_ruleset,
            },
            "chat": {
                "channel_id": self.chat.channel_id,
                "bot_token_env": self.chat.bot_token_env,
                "history_size": self.chat.history_size,
                "ignore_bot_authors": self.chat.ignore_bot_authors,
            },
            "model": {
                "provider": self.model.provider,
                "name": self.model.name,
                "api_key_env": self.model.api_key_env,
                "max_tokens": self.model.max_tokens,
                "temperature": self.model.temperature,
                "timeout_seconds": self.model.timeout_seconds,
                "base_url": self.model.base_url,
                "prompt_token_budget": self.model.prompt_token_budget,
            },
            "memory": {
                "tool_binary": self.memory.tool_binary,
                "top_k": self.memory.top_k,
                "query_timeout_seconds": self.memory.query_timeout_seconds,
                "fallback_timeout_seconds": self.memory.fallback_timeout_seconds,
                "update_interval_seconds": self.memory.update_interval_seconds,
                "update_timeout_seconds": self.memory.update_timeout_seconds,
            },
            "runtime": {
                "log_level": self.runtime.log_level,
                "data_home": self.runtime.data_home.display().to_string(),
                "dry_run": self.runtime.dry_run,
            },
        })
    }
}

fn parse_override<T: std::str::FromStr>(field: &str, raw: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| {
        ConfigError::ValidationError(format!("Invalid override value for {field}: '{raw}'"))
    })
}

fn parse_bool_override(field: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::ValidationError(format!(
            "Invalid override value for {field}: '{raw}'"
        ))),
    }
}

/// Home directory from the supplied environment snapshot.
fn home_dir(env: &ProcessEnv) -> PathBuf {
    env.get("HOME")
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
