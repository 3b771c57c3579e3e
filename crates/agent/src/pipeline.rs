//! The mention-to-reply pipeline.
//!
//! One `on_message` call walks the full chain: trigger check, history
//! collection, memory retrieval, prompt assembly, completion, send,
//! and fire-and-forget memory extraction. Retrieval failures degrade
//! to an empty memory set; history, completion, and send failures end
//! the turn without a reply. The outcome records what happened either
//! way.

use std::sync::Arc;

use eidolon_core::{
    CharacterCard, CompletionClient, CompletionRequest, HistoryProvider, IncomingMessage,
    MemoryRetrieval, RecentMessage, ReplySender, RetrievalFailure, RetrievalMode, RetrievalResult,
};
use eidolon_telemetry::estimate_completion_cost_usd;
use tracing::{info, warn};

use crate::collector::RecentMessageCollector;
use crate::formatter::ReplyFormatter;
use crate::prompt::PromptBuilder;
use crate::query::build_scene_query;
use crate::router::TriggerRouter;
use crate::skills::{load_skill_excerpt, DEFAULT_MAX_CHARS};

/// Seam for scheduling post-reply memory extraction without blocking
/// the reply path.
pub trait ExtractionScheduler: Send + Sync {
    fn schedule_extraction(
        &self,
        recent_messages: &[RecentMessage],
        response_text: &str,
    ) -> Result<(), String>;
}

/// What one `on_message` call did.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    /// False when the trigger check declined; everything else is zeroed.
    pub handled: bool,
    pub sent: bool,
    pub retrieval_mode: Option<RetrievalMode>,
    pub retrieval_error: Option<RetrievalFailure>,
    pub prompt_tokens: usize,
    /// Stable tag of the failure that ended the turn, if any.
    pub error: Option<&'static str>,
    /// Underlying failure kind when `error` names a composite stage
    /// (history collection carries the channel error kind).
    pub error_detail: Option<&'static str>,
}

impl PipelineOutcome {
    fn not_handled() -> Self {
        Self {
            handled: false,
            sent: false,
            retrieval_mode: None,
            retrieval_error: None,
            prompt_tokens: 0,
            error: None,
            error_detail: None,
        }
    }
}

pub struct ResponsePipeline {
    router: Arc<TriggerRouter>,
    collector: RecentMessageCollector,
    retriever: Arc<dyn MemoryRetrieval>,
    prompt_builder: PromptBuilder,
    llm: Arc<dyn CompletionClient>,
    extractor: Option<Arc<dyn ExtractionScheduler>>,
    memory_namespace: String,
    skill_ruleset: Option<String>,
}

impl ResponsePipeline {
    pub fn new(
        router: Arc<TriggerRouter>,
        collector: RecentMessageCollector,
        retriever: Arc<dyn MemoryRetrieval>,
        prompt_builder: PromptBuilder,
        llm: Arc<dyn CompletionClient>,
        memory_namespace: impl Into<String>,
    ) -> Self {
        Self {
            router,
            collector,
            retriever,
            prompt_builder,
            llm,
            extractor: None,
            memory_namespace: memory_namespace.into(),
            skill_ruleset: None,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn ExtractionScheduler>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_skill_ruleset(mut self, ruleset: impl Into<String>) -> Self {
        self.skill_ruleset = Some(ruleset.into());
        self
    }

    pub async fn on_message(
        &self,
        message: &IncomingMessage,
        history_provider: &dyn HistoryProvider,
        sender: &dyn ReplySender,
        card: &CharacterCard,
    ) -> PipelineOutcome {
        let should_respond = self.router.should_respond(message);
        info!(
            should_respond,
            target_channel = self.router.target_channel_id(),
            msg_channel = message.channel_id,
            bot_user_id = self.router.bot_user_id(),
            author_id = message.author_id,
            author_is_bot = message.author_is_bot,
            "trigger_check"
        );
        if !should_respond {
            return PipelineOutcome::not_handled();
        }

        let recent_messages = match self.collector.collect(history_provider, None).await {
            Ok(messages) => messages,
            Err(error) => {
                let detail = match &error {
                    eidolon_core::Error::Channel(channel) => channel.kind(),
                    _ => "internal",
                };
                warn!(%error, kind = detail, "history_collection_failed");
                return PipelineOutcome {
                    handled: true,
                    sent: false,
                    retrieval_mode: None,
                    retrieval_error: None,
                    prompt_tokens: 0,
                    error: Some("history_collection_failed"),
                    error_detail: Some(detail),
                };
            }
        };

        let retrieval = self.retrieve_memories(&recent_messages).await;
        let retrieval_error = retrieval.error.as_ref().map(|e| e.kind);
        let memories: &[_] = if retrieval.error.is_none() {
            &retrieval.records
        } else {
            &[]
        };

        let skill_excerpt = self.resolve_skill_excerpt();

        let prompt = self
            .prompt_builder
            .build(card, &skill_excerpt, memories, &recent_messages);

        let response = match self
            .llm
            .complete(CompletionRequest::new(
                prompt.system_prompt.clone(),
                prompt.user_prompt.clone(),
            ))
            .await
        {
            Ok(response) => response,
            Err(error) => {
                warn!(%error, kind = error.kind(), "llm_completion_failed");
                return PipelineOutcome {
                    handled: true,
                    sent: false,
                    retrieval_mode: retrieval.mode,
                    retrieval_error,
                    prompt_tokens: prompt.estimated_input_tokens,
                    error: Some(error.kind()),
                    error_detail: None,
                };
            }
        };

        let formatter = ReplyFormatter::new(&card.name);
        let reply = formatter.format(&response.text);
        if let Err(error) = sender.send_message(&reply).await {
            warn!(%error, kind = error.kind(), "send_message_failed");
            return PipelineOutcome {
                handled: true,
                sent: false,
                retrieval_mode: retrieval.mode,
                retrieval_error,
                prompt_tokens: prompt.estimated_input_tokens,
                error: Some(error.kind()),
                error_detail: None,
            };
        }

        if let Some(extractor) = &self.extractor {
            if let Err(reason) = extractor.schedule_extraction(&recent_messages, &response.text) {
                warn!(%reason, "memory_extraction_schedule_failed");
            }
        }

        let estimated_cost_usd =
            estimate_completion_cost_usd(&response.model, response.input_tokens, response.output_tokens);
        info!(
            retrieval_mode = retrieval.mode.map(|m| m.as_str()),
            retrieval_error = retrieval_error.map(|k| k.as_str()),
            prompt_tokens = prompt.estimated_input_tokens,
            llm_model = %response.model,
            llm_input_tokens = response.input_tokens,
            llm_output_tokens = response.output_tokens,
            llm_estimated_cost_usd = estimated_cost_usd,
            "response_pipeline_success"
        );

        PipelineOutcome {
            handled: true,
            sent: true,
            retrieval_mode: retrieval.mode,
            retrieval_error,
            prompt_tokens: prompt.estimated_input_tokens,
            error: None,
            error_detail: None,
        }
    }

    async fn retrieve_memories(&self, recent_messages: &[RecentMessage]) -> RetrievalResult {
        let query = build_scene_query(recent_messages);
        self.retriever
            .retrieve(&query, Some(&self.memory_namespace), None)
            .await
    }

    fn resolve_skill_excerpt(&self) -> String {
        let Some(ruleset) = &self.skill_ruleset else {
            return String::new();
        };
        match load_skill_excerpt(ruleset, DEFAULT_MAX_CHARS) {
            Ok(excerpt) => excerpt,
            Err(error) => {
                warn!(%ruleset, %error, "skill_excerpt_load_failed");
                String::new()
            }
        }
    }
}
