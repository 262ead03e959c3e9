//! Collaborator contracts consumed by the delivery core.
//!
//! The SQLite implementations live in `courier-database`; the core only
//! depends on these traits so sessions and delivery can be exercised against
//! in-memory stores in tests.

use async_trait::async_trait;

use crate::entities::{Chat, ChatType, Message};
use crate::types::ChatResult;

/// Durable record of chats and their member sets.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn create_chat(
        &self,
        name: &str,
        chat_type: ChatType,
        creator_id: i64,
    ) -> ChatResult<Chat>;

    /// Fails with `ChatError::ChatNotFound` for unknown ids.
    async fn get_chat(&self, chat_id: i64) -> ChatResult<Chat>;

    /// Every chat id known to persistent storage, for startup reconciliation.
    async fn all_chat_ids(&self) -> ChatResult<Vec<i64>>;
}

/// Durable, ordered log of messages per chat.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message; the store assigns the id.
    async fn save_message(
        &self,
        chat_id: i64,
        sender_id: i64,
        text: &str,
        timestamp: i64,
    ) -> ChatResult<Message>;

    /// Flip the read flag. False -> true only, never reversed.
    async fn mark_read(&self, message_id: i64) -> ChatResult<()>;

    /// Full, unpaginated history in send order. Used only for session replay.
    async fn get_history(&self, chat_id: i64) -> ChatResult<Vec<Message>>;
}
