//! Chat-platform boundary traits.
//!
//! The gateway client itself (connection lifecycle, reactions, typing
//! indicators) lives outside this system; the pipeline only needs a way
//! to read recent channel history and post one reply.

use async_trait::async_trait;

use crate::error::ChannelError;
use crate::message::RawMessage;

/// Source of raw channel history, newest-last not guaranteed — the
/// collector sorts.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Fetch up to `limit` recent messages from the channel.
    async fn recent_messages(&self, limit: usize) -> Result<Vec<RawMessage>, ChannelError>;
}

/// Sink for the single formatted reply of a triggered message.
#[async_trait]
pub trait ReplySender: Send + Sync {
    async fn send_message(&self, content: &str) -> Result<(), ChannelError>;
}
