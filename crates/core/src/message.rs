//! Message value objects that flow through the reply pipeline.
//!
//! A platform message arrives as an [`IncomingMessage`] (the trigger) and
//! channel history is fetched as [`RawMessage`]s, which the collector
//! normalizes into chronologically ordered [`RecentMessage`]s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The role of a message author as seen by the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A human participant.
    User,
    /// A bot participant (including this persona).
    Assistant,
}

impl Role {
    /// Derive the role from the platform's author-is-bot flag.
    pub fn from_author_is_bot(author_is_bot: bool) -> Self {
        if author_is_bot {
            Role::Assistant
        } else {
            Role::User
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The inbound message that may trigger a reply. Transient, one per event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Platform channel the message was posted in.
    pub channel_id: u64,

    /// Platform identity of the author.
    pub author_id: u64,

    /// Whether the platform marks the author as a bot.
    pub author_is_bot: bool,

    /// Raw text content (used by the raw-pattern mention check).
    pub content: String,

    /// Identities mentioned via the platform's structured mention list.
    pub mentioned_user_ids: Vec<u64>,
}

/// A message as fetched from the channel history provider, before
/// normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    pub message_id: u64,
    pub channel_id: u64,
    pub author_id: u64,
    pub author_name: String,
    pub author_is_bot: bool,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub mentioned_user_ids: Vec<u64>,
}

/// A normalized history record. Immutable once built; ordering key is
/// `(created_at, message_id)` ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentMessage {
    pub message_id: u64,
    pub channel_id: u64,
    pub author_id: u64,
    pub author_name: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Sorted and deduplicated.
    pub mentioned_user_ids: Vec<u64>,
}

impl RecentMessage {
    /// Normalize a raw history message: derive the role and sort/dedup
    /// the mention set.
    pub fn from_raw(raw: RawMessage) -> Self {
        let mut mentions = raw.mentioned_user_ids;
        mentions.sort_unstable();
        mentions.dedup();
        Self {
            message_id: raw.message_id,
            channel_id: raw.channel_id,
            author_id: raw.author_id,
            author_name: raw.author_name,
            role: Role::from_author_is_bot(raw.author_is_bot),
            content: raw.content,
            created_at: raw.created_at,
            mentioned_user_ids: mentions,
        }
    }
}
