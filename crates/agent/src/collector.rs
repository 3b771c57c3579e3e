//! Recent-message collection.
//!
//! Normalizes raw channel history into the chronological, role-tagged
//! window the prompt builder consumes.

use eidolon_core::{Error, HistoryProvider, RecentMessage, Result};

/// Collects and normalizes the channel context window.
#[derive(Debug, Clone, Copy)]
pub struct RecentMessageCollector {
    default_limit: usize,
}

impl RecentMessageCollector {
    pub fn new(default_limit: usize) -> Result<Self> {
        if default_limit == 0 {
            return Err(Error::Config {
                message: "history limit must be a positive integer".into(),
            });
        }
        Ok(Self { default_limit })
    }

    /// Fetch up to `limit` messages, sort by (timestamp, id), and keep
    /// the trailing window. Provider failures propagate; the pipeline
    /// treats them as fatal for this turn.
    pub async fn collect(
        &self,
        provider: &dyn HistoryProvider,
        limit: Option<usize>,
    ) -> Result<Vec<RecentMessage>> {
        let limit = limit.unwrap_or(self.default_limit);
        if limit == 0 {
            return Err(Error::Config {
                message: "limit must be a positive integer".into(),
            });
        }

        let mut raw = provider.recent_messages(limit).await?;
        raw.sort_by_key(|m| (m.created_at, m.message_id));

        let window_start = raw.len().saturating_sub(limit);
        Ok(raw
            .drain(window_start..)
            .map(RecentMessage::from_raw)
            .collect())
    }
}
