//! Error types for the chat system.

use thiserror::Error;

use crate::connection::TransportError;

/// Result type alias for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

/// Main error type for the chat system
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat not found: {id}")]
    ChatNotFound { id: i64 },

    #[error("user {user_id} is not a member of chat {chat_id}")]
    NotMember { chat_id: i64, user_id: i64 },

    #[error("user not found: {id}")]
    UserNotFound { id: i64 },

    #[error("only the chat creator can manage members")]
    NotCreator,

    #[error("private chats cannot have more than two members")]
    PrivateChatFull,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ChatError {
    pub fn chat_not_found(id: i64) -> Self {
        Self::ChatNotFound { id }
    }

    pub fn not_member(chat_id: i64, user_id: i64) -> Self {
        Self::NotMember { chat_id, user_id }
    }

    pub fn user_not_found(id: i64) -> Self {
        Self::UserNotFound { id }
    }
}
