//! Fire-and-forget memory extraction.
//!
//! After a reply is sent, a second low-temperature completion distills
//! durable facts from the exchange and appends them to the persona's
//! daily markdown journal. Extraction failures never surface to the
//! reply path.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use eidolon_core::{CompletionClient, CompletionRequest, RecentMessage};

const EXTRACTION_SYSTEM_PROMPT: &str = "Extract durable persona-specific memory facts from the \
    conversation. Return concise markdown bullet points only. Do not include transient chatter, \
    tool text, or formatting outside markdown bullets.";

const EXTRACTION_MAX_TOKENS: u32 = 220;
const EXTRACTION_TEMPERATURE: f32 = 0.0;
const EXTRACTION_HISTORY_LINES: usize = 8;

/// Extracts facts and appends them to `<journal_dir>/<YYYY-MM-DD>.md`.
#[derive(Clone)]
pub struct MemoryExtractor {
    llm: Arc<dyn CompletionClient>,
    journal_dir: PathBuf,
    now: fn() -> DateTime<Utc>,
}

impl MemoryExtractor {
    pub fn new(llm: Arc<dyn CompletionClient>, journal_dir: PathBuf) -> Self {
        Self {
            llm,
            journal_dir,
            now: Utc::now,
        }
    }

    #[cfg(test)]
    fn with_clock(mut self, now: fn() -> DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Spawn extraction in the background. The handle is returned for
    /// tests; callers in the reply path drop it.
    pub fn spawn_extraction(
        &self,
        recent_messages: Vec<RecentMessage>,
        response_text: String,
        persona_name: String,
    ) -> tokio::task::JoinHandle<bool> {
        let this = self.clone();
        tokio::spawn(async move {
            this.extract_and_append(&recent_messages, &response_text, &persona_name)
                .await
        })
    }

    /// Run one extraction and append the facts. Returns whether a journal
    /// entry was written.
    pub async fn extract_and_append(
        &self,
        recent_messages: &[RecentMessage],
        response_text: &str,
        persona_name: &str,
    ) -> bool {
        if persona_name.trim().is_empty() {
            warn!(reason = "empty_persona_name", "memory_extraction_skipped");
            return false;
        }

        let request = CompletionRequest {
            system_prompt: EXTRACTION_SYSTEM_PROMPT.into(),
            user_prompt: build_extraction_prompt(recent_messages, response_text, persona_name),
            max_tokens: Some(EXTRACTION_MAX_TOKENS),
            temperature: Some(EXTRACTION_TEMPERATURE),
        };

        let completion = match self.llm.complete(request).await {
            Ok(completion) => completion,
            Err(e) => {
                warn!(error = e.kind(), "memory_extraction_failed");
                return false;
            }
        };

        let facts = completion.text.trim().to_string();
        if facts.is_empty() {
            info!(reason = "empty_facts", "memory_extraction_skipped");
            return false;
        }

        let timestamp = (self.now)();
        let path = self
            .journal_dir
            .join(format!("{}.md", timestamp.date_naive().format("%Y-%m-%d")));
        let entry = format!("\n## {}\n{}\n", timestamp.to_rfc3339(), facts);

        if let Err(e) = append_entry(&path, &entry).await {
            warn!(error = %e, path = %path.display(), "memory_extraction_failed");
            return false;
        }

        info!(path = %path.display(), "memory_extraction_success");
        true
    }
}

fn build_extraction_prompt(
    recent_messages: &[RecentMessage],
    response_text: &str,
    persona_name: &str,
) -> String {
    let mut lines = vec![format!("Persona: {persona_name}"), String::new()];
    lines.push("Recent conversation:".into());

    let tail_start = recent_messages
        .len()
        .saturating_sub(EXTRACTION_HISTORY_LINES);
    for message in &recent_messages[tail_start..] {
        lines.push(format!(
            "- [{}][{}] {}",
            message.role, message.author_name, message.content
        ));
    }

    lines.push(String::new());
    lines.push("Persona response:".into());
    lines.push(response_text.trim().to_string());
    lines.push(String::new());
    lines.push("Extract durable memory facts about this persona as markdown bullet points.".into());
    lines.join("\n").trim().to_string()
}

async fn append_entry(path: &std::path::Path, entry: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(entry.as_bytes()).await?;
    file.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use eidolon_core::{CompletionError, CompletionResponse, Role};

    struct StubLlm {
        reply: Result<String, CompletionError>,
    }

    #[async_trait]
    impl CompletionClient for StubLlm {
        fn name(&self) -> &str {
            "stub"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, CompletionError> {
            match &self.reply {
                Ok(text) => Ok(CompletionResponse {
                    text: text.clone(),
                    model: "stub".into(),
                    stop_reason: None,
                    input_tokens: 50,
                    output_tokens: 20,
                }),
                Err(e) => Err(e.clone()),
            }
        }
    }

    fn message(author: &str, content: &str) -> RecentMessage {
        RecentMessage {
            message_id: 1,
            channel_id: 1,
            author_id: 2,
            author_name: author.into(),
            role: Role::User,
            content: content.into(),
            created_at: Utc::now(),
            mentioned_user_ids: vec![],
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-09T12:30:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[tokio::test]
    async fn appends_dated_journal_entry() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = MemoryExtractor::new(
            Arc::new(StubLlm {
                reply: Ok("- fears deep water".into()),
            }),
            dir.path().to_path_buf(),
        )
        .with_clock(fixed_now);

        let wrote = extractor
            .extract_and_append(&[message("alice", "hi")], "A reply.", "Vesper")
            .await;
        assert!(wrote);

        let content = std::fs::read_to_string(dir.path().join("2025-03-09.md")).unwrap();
        assert!(content.starts_with("\n## 2025-03-09T12:30:00"));
        assert!(content.contains("- fears deep water"));
    }

    #[tokio::test]
    async fn consecutive_entries_accumulate() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = MemoryExtractor::new(
            Arc::new(StubLlm {
                reply: Ok("- a fact".into()),
            }),
            dir.path().to_path_buf(),
        )
        .with_clock(fixed_now);

        extractor.extract_and_append(&[], "one", "Vesper").await;
        extractor.extract_and_append(&[], "two", "Vesper").await;

        let content = std::fs::read_to_string(dir.path().join("2025-03-09.md")).unwrap();
        assert_eq!(content.matches("## 2025-03-09T").count(), 2);
    }

    #[tokio::test]
    async fn empty_facts_skip_the_journal() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = MemoryExtractor::new(
            Arc::new(StubLlm {
                reply: Ok("   ".into()),
            }),
            dir.path().to_path_buf(),
        )
        .with_clock(fixed_now);

        let wrote = extractor.extract_and_append(&[], "reply", "Vesper").await;
        assert!(!wrote);
        assert!(!dir.path().join("2025-03-09.md").exists());
    }

    #[tokio::test]
    async fn completion_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = MemoryExtractor::new(
            Arc::new(StubLlm {
                reply: Err(CompletionError::Timeout("30s".into())),
            }),
            dir.path().to_path_buf(),
        );

        let wrote = extractor.extract_and_append(&[], "reply", "Vesper").await;
        assert!(!wrote);
    }

    #[tokio::test]
    async fn blank_persona_name_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = MemoryExtractor::new(
            Arc::new(StubLlm {
                reply: Ok("- a fact".into()),
            }),
            dir.path().to_path_buf(),
        );

        assert!(!extractor.extract_and_append(&[], "reply", "  ").await);
    }

    #[test]
    fn prompt_takes_only_the_trailing_history_lines() {
        let messages: Vec<RecentMessage> = (0..12)
            .map(|i| message("alice", &format!("line {i}")))
            .collect();
        let prompt = build_extraction_prompt(&messages, "reply", "Vesper");
        assert!(!prompt.contains("line 3"));
        assert!(prompt.contains("line 4"));
        assert!(prompt.contains("line 11"));
        assert!(prompt.starts_with("Persona: Vesper"));
    }
}
