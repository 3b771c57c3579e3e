//! `eidolon run` — Start the persona agent.
//!
//! The chat-platform gateway is pluggable behind the core channel
//! traits; this command wires a local console channel so the full
//! pipeline (trigger, retrieval, prompt, completion, extraction) runs
//! end to end from a terminal. Every console line is treated as a
//! message addressed to the persona.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use eidolon_agent::{
    ExtractionScheduler, PromptBuilder, RecentMessageCollector, ResponsePipeline, TriggerRouter,
};
use eidolon_config::AppConfig;
use eidolon_core::{
    ChannelError, CharacterCard, HistoryProvider, IncomingMessage, ProcessEnv, RawMessage,
    RecentMessage, ReplySender,
};
use eidolon_memory::{
    bootstrap_namespace, IndexScheduler, MemoryExtractor, QmdRetriever, TokioToolRunner,
};
use eidolon_providers::build_llm_client;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::info;

const CONSOLE_BOT_ID: u64 = 1;
const CONSOLE_USER_ID: u64 = 2;

/// In-process channel backing the console session. Keeps its own
/// history so the collector and prompt builder see a real conversation.
struct ConsoleChannel {
    channel_id: u64,
    persona_name: String,
    history: Mutex<Vec<RawMessage>>,
    next_id: AtomicU64,
}

impl ConsoleChannel {
    fn new(channel_id: u64, persona_name: String) -> Self {
        Self {
            channel_id,
            persona_name,
            history: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn record_user_line(&self, content: &str) -> IncomingMessage {
        let message_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let raw = RawMessage {
            message_id,
            channel_id: self.channel_id,
            author_id: CONSOLE_USER_ID,
            author_name: "you".into(),
            author_is_bot: false,
            content: content.to_string(),
            created_at: Utc::now(),
            mentioned_user_ids: vec![CONSOLE_BOT_ID],
        };
        self.history
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(raw);
        IncomingMessage {
            channel_id: self.channel_id,
            author_id: CONSOLE_USER_ID,
            author_is_bot: false,
            content: content.to_string(),
            mentioned_user_ids: vec![CONSOLE_BOT_ID],
        }
    }
}

#[async_trait]
impl HistoryProvider for ConsoleChannel {
    async fn recent_messages(&self, limit: usize) -> Result<Vec<RawMessage>, ChannelError> {
        let history = self.history.lock().unwrap_or_else(|p| p.into_inner());
        let start = history.len().saturating_sub(limit);
        Ok(history[start..].to_vec())
    }
}

#[async_trait]
impl ReplySender for ConsoleChannel {
    async fn send_message(&self, content: &str) -> Result<(), ChannelError> {
        println!("{content}");
        let message_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.history
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(RawMessage {
                message_id,
                channel_id: self.channel_id,
                author_id: CONSOLE_BOT_ID,
                author_name: self.persona_name.clone(),
                author_is_bot: true,
                content: content.to_string(),
                created_at: Utc::now(),
                mentioned_user_ids: vec![],
            });
        Ok(())
    }
}

/// Bridges the pipeline's extraction seam to the background extractor.
struct BackgroundExtraction {
    extractor: MemoryExtractor,
    persona_name: String,
}

impl ExtractionScheduler for BackgroundExtraction {
    fn schedule_extraction(
        &self,
        recent_messages: &[RecentMessage],
        response_text: &str,
    ) -> Result<(), String> {
        self.extractor.spawn_extraction(
            recent_messages.to_vec(),
            response_text.to_string(),
            self.persona_name.clone(),
        );
        Ok(())
    }
}

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let env = ProcessEnv::from_process();
    let config = AppConfig::load(&env).map_err(|e| format!("Failed to load config: {e}"))?;

    bootstrap_namespace(&config.runtime.data_home, &config.agent.memory_namespace)?;

    let card = CharacterCard::load(&config.agent.character_card_path)
        .map_err(|e| format!("Failed to load character card: {e}"))?;

    let llm = Arc::new(
        build_llm_client(&config.model, &env)
            .map_err(|e| format!("Failed to build LLM client: {e}"))?,
    );
    let runner = Arc::new(TokioToolRunner);
    let retriever = Arc::new(QmdRetriever::new(&config, env.clone(), runner.clone()));

    let router = Arc::new(TriggerRouter::new(
        config.chat.channel_id,
        config.chat.ignore_bot_authors,
    ));
    router.set_bot_user_id(CONSOLE_BOT_ID);

    let mut pipeline = ResponsePipeline::new(
        router,
        RecentMessageCollector::new(config.chat.history_size)?,
        retriever,
        PromptBuilder::new(config.model.prompt_token_budget)?,
        llm.clone(),
        config.agent.memory_namespace.clone(),
    )
    .with_skill_ruleset(config.agent.skill_ruleset.clone());

    if !config.runtime.dry_run {
        pipeline = pipeline.with_extractor(Arc::new(BackgroundExtraction {
            extractor: MemoryExtractor::new(llm, config.journal_dir()),
            persona_name: card.name.clone(),
        }));
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    let scheduler_handle = if config.runtime.dry_run {
        None
    } else {
        let scheduler = IndexScheduler::new(&config, env, runner);
        Some(tokio::spawn(async move {
            scheduler.run_forever(stop_rx).await;
        }))
    };

    let channel = ConsoleChannel::new(config.chat.channel_id, card.name.clone());

    if let Some(line) = message {
        let incoming = channel.record_user_line(&line);
        let outcome = pipeline.on_message(&incoming, &channel, &channel, &card).await;
        if !outcome.sent {
            return Err(format!(
                "No reply was sent (error: {})",
                outcome.error.unwrap_or("none")
            )
            .into());
        }
    } else {
        println!("Eidolon — {} is listening. Type a message, Ctrl+C to quit.", card.name);
        let stdin = BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();

        loop {
            print!("> ");
            std::io::stdout().flush()?;

            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = tokio::signal::ctrl_c() => {
                    println!();
                    break;
                }
            };
            let Some(line) = line else { break };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let incoming = channel.record_user_line(trimmed);
            let outcome = pipeline.on_message(&incoming, &channel, &channel, &card).await;
            if !outcome.sent {
                eprintln!("(no reply: {})", outcome.error.unwrap_or("declined"));
            }
        }
    }

    info!("shutting down");
    let _ = stop_tx.send(true);
    if let Some(handle) = scheduler_handle {
        let _ = handle.await;
    }

    Ok(())
}
