//! Rows owned by the persistence layer. Chat and message entities live in
//! `courier-chats`; only the account record is private to this crate.

use serde::{Deserialize, Serialize};

/// A registered account. The password hash never leaves this layer; API
/// responses use projections that omit it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Unix seconds at registration.
    pub created_at: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("user not found: {id}")]
    NotFound { id: i64 },

    #[error("user name already taken: {0}")]
    NameTaken(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type UserResult<T> = Result<T, UserError>;
