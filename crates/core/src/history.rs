//! Session sink — the history collaborator interface.
//!
//! The agent never persists conversation state itself. After each successful
//! query it hands a snapshot to the configured sink; on startup a caller may
//! load the previous snapshot and restore it via `ConversationMemory::replace`.

use async_trait::async_trait;

use crate::error::SessionError;
use crate::message::Message;

/// Mirrors the conversation into persistent session storage.
#[async_trait]
pub trait SessionSink: Send + Sync {
    /// Persist a snapshot of the conversation.
    async fn save(&self, messages: &[Message]) -> std::result::Result<(), SessionError>;

    /// Load the most recent snapshot, or an empty list if none exists.
    async fn load(&self) -> std::result::Result<Vec<Message>, SessionError>;
}
