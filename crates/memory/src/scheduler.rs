//! Periodic index refresh.
//!
//! Runs `qmd update` then `qmd embed` inside the namespace environment,
//! on a fixed interval. A failed or timed-out step aborts the cycle; the
//! next cycle starts fresh.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use eidolon_config::AppConfig;
use eidolon_core::ProcessEnv;

use crate::exec::{ToolCommand, ToolRunner};

const REFRESH_STEPS: [&str; 2] = ["update", "embed"];

/// Drives `update` + `embed` cycles for one namespace.
pub struct IndexScheduler {
    binary: String,
    namespace: String,
    data_home: PathBuf,
    interval: Duration,
    step_timeout: Duration,
    base_env: ProcessEnv,
    runner: Arc<dyn ToolRunner>,
}

impl IndexScheduler {
    pub fn new(config: &AppConfig, base_env: ProcessEnv, runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            binary: config.memory.tool_binary.clone(),
            namespace: config.agent.memory_namespace.clone(),
            data_home: config.runtime.data_home.clone(),
            interval: Duration::from_secs_f64(config.memory.update_interval_seconds),
            step_timeout: Duration::from_secs_f64(config.memory.update_timeout_seconds),
            base_env,
            runner,
        }
    }

    /// Run a single refresh cycle. Returns whether both steps succeeded.
    pub async fn run_once(&self) -> bool {
        let namespace = self.namespace.trim();
        if namespace.is_empty() {
            warn!(reason = "empty_namespace", "index_cycle_skipped");
            return false;
        }

        let env = self.build_env(namespace);
        for step in REFRESH_STEPS {
            let command = ToolCommand {
                program: self.binary.clone(),
                args: vec![step.to_string()],
                env: env.clone(),
                timeout: self.step_timeout,
            };

            let output = match self.runner.run(command).await {
                Ok(output) => output,
                Err(e) => {
                    warn!(step, error = "spawn_error", reason = %e, "index_step_failed");
                    return false;
                }
            };
            if output.timed_out {
                warn!(step, error = "timeout", latency_ms = output.latency_ms, "index_step_failed");
                return false;
            }
            if output.exit_code != Some(0) {
                warn!(
                    step,
                    error = "non_zero_exit",
                    exit_code = ?output.exit_code,
                    latency_ms = output.latency_ms,
                    "index_step_failed"
                );
                return false;
            }
        }

        info!(namespace, "index_cycle_success");
        true
    }

    /// Run cycles until `stop` turns true. The inter-cycle wait is
    /// interruptible, so shutdown does not block on the interval.
    pub async fn run_forever(&self, mut stop: watch::Receiver<bool>) {
        loop {
            if *stop.borrow() {
                return;
            }
            self.run_once().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = stop.changed() => {
                    // Sender dropped counts as a stop request.
                    if changed.is_err() || *stop.borrow() {
                        return;
                    }
                }
            }
        }
    }

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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::ToolOutput;
    use async_trait::async_trait;
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

    struct ScriptedRunner {
        outcomes: Mutex<Vec<ToolOutput>>,
        seen: Mutex<Vec<ToolCommand>>,
    }

    impl ScriptedRunner {
        fn new(outcomes: Vec<ToolOutput>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn ok() -> ToolOutput {
            ToolOutput {
                exit_code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
                timed_out: false,
                latency_ms: 40,
            }
        }

        fn timeout() -> ToolOutput {
            ToolOutput {
                exit_code: None,
                stdout: String::new(),
                stderr: String::new(),
                timed_out: true,
                latency_ms: 60000,
            }
        }
    }

    #[async_trait]
    impl ToolRunner for ScriptedRunner {
        async fn run(&self, command: ToolCommand) -> std::io::Result<ToolOutput> {
            self.seen.lock().unwrap().push(command);
            let mut outcomes = self.outcomes.lock().unwrap();
            if outcomes.is_empty() {
                Ok(Self::ok())
            } else {
                Ok(outcomes.remove(0))
            }
        }
    }

    fn scheduler(runner: Arc<ScriptedRunner>) -> IndexScheduler {
        IndexScheduler::new(&test_config(), ProcessEnv::default(), runner)
    }

    #[tokio::test]
    async fn cycle_runs_update_then_embed() {
        let runner = Arc::new(ScriptedRunner::new(vec![
            ScriptedRunner::ok(),
            ScriptedRunner::ok(),
        ]));
        assert!(scheduler(runner.clone()).run_once().await);

        let seen = runner.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].args, vec!["update"]);
        assert_eq!(seen[1].args, vec!["embed"]);
        assert_eq!(
            seen[0].env.get("XDG_CACHE_HOME").unwrap(),
            "/tmp/eidolon-test/agents/vesper/qmd/xdg-cache"
        );
    }

    #[tokio::test]
    async fn failed_update_aborts_the_cycle() {
        let runner = Arc::new(ScriptedRunner::new(vec![ScriptedRunner::timeout()]));
        assert!(!scheduler(runner.clone()).run_once().await);
        assert_eq!(runner.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn run_forever_stops_on_signal() {
        let runner = Arc::new(ScriptedRunner::new(vec![]));
        let sched = Arc::new(scheduler(runner));
        let (tx, rx) = watch::channel(false);

        let handle = {
            let sched = sched.clone();
            tokio::spawn(async move { sched.run_forever(rx).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("scheduler did not stop promptly")
            .unwrap();
    }

    #[tokio::test]
    async fn run_forever_with_stop_already_set_never_cycles() {
        let runner = Arc::new(ScriptedRunner::new(vec![]));
        let sched = scheduler(runner.clone());
        let (_tx, rx) = watch::channel(true);
        sched.run_forever(rx).await;
        assert!(runner.seen.lock().unwrap().is_empty());
    }
}
