//! Trigger routing: which messages get a reply.
//!
//! Purely a predicate; no I/O. The persona's own platform identity is
//! not known until after connect, so it lives in an atomic the gateway
//! layer fills in later. Until then the router always declines.

use std::sync::atomic::{AtomicU64, Ordering};

use eidolon_core::IncomingMessage;

/// Channel + mention gate for one persona.
#[derive(Debug)]
pub struct TriggerRouter {
    target_channel_id: u64,
    /// 0 means "identity not yet supplied".
    bot_user_id: AtomicU64,
    ignore_bot_authors: bool,
}

impl TriggerRouter {
    pub fn new(target_channel_id: u64, ignore_bot_authors: bool) -> Self {
        Self {
            target_channel_id,
            bot_user_id: AtomicU64::new(0),
            ignore_bot_authors,
        }
    }

    /// Supply the persona's own identity after platform connect.
    pub fn set_bot_user_id(&self, bot_user_id: u64) {
        self.bot_user_id.store(bot_user_id, Ordering::SeqCst);
    }

    pub fn bot_user_id(&self) -> u64 {
        self.bot_user_id.load(Ordering::SeqCst)
    }

    pub fn target_channel_id(&self) -> u64 {
        self.target_channel_id
    }

    /// Strict check: trigger only on the platform's structured mention
    /// list.
    pub fn should_respond(&self, message: &IncomingMessage) -> bool {
        let Some(bot_id) = self.gate(message) else {
            return false;
        };
        message.mentioned_user_ids.contains(&bot_id)
    }

    /// Tolerant check: also accepts the raw textual mention encodings
    /// (`<@id>`, `<@!id>`) for platforms whose structured mention list
    /// is unreliable.
    pub fn should_respond_raw(&self, message: &IncomingMessage) -> bool {
        let Some(bot_id) = self.gate(message) else {
            return false;
        };
        if message.mentioned_user_ids.contains(&bot_id) {
            return true;
        }
        message.content.contains(&format!("<@{bot_id}>"))
            || message.content.contains(&format!("<@!{bot_id}>"))
    }

    /// Common gate; returns the resolved bot id when the message is
    /// still a candidate.
    fn gate(&self, message: &IncomingMessage) -> Option<u64> {
        if message.channel_id != self.target_channel_id {
            return None;
        }
        if self.ignore_bot_authors && message.author_is_bot {
            return None;
        }
        let bot_id = self.bot_user_id();
        if bot_id == 0 || message.author_id == bot_id {
            return None;
        }
        Some(bot_id)
    }
}
