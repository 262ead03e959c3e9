//! Repository for the durable message log.

use async_trait::async_trait;
use courier_chats::{ChatError, ChatResult, Message, MessageStore};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use tracing::debug;

pub struct MessageRepository {
    pool: SqlitePool,
}

/// One page of history plus the chat-wide total, for the paginated endpoint.
#[derive(Debug, Serialize)]
pub struct MessageHistory {
    pub total: i64,
    pub messages: Vec<Message>,
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Paginated history in send order. Unlike the replay path this caps the
    /// result set, so clients can walk arbitrarily long logs.
    pub async fn history_page(
        &self,
        chat_id: i64,
        limit: i64,
        offset: i64,
    ) -> ChatResult<MessageHistory> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages WHERE chat_id = ?")
            .bind(chat_id)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(
            "SELECT id, chat_id, sender_id, text, timestamp, read
             FROM messages WHERE chat_id = ? ORDER BY id LIMIT ? OFFSET ?",
        )
        .bind(chat_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let messages = rows
            .iter()
            .map(message_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MessageHistory {
            total: total.0,
            messages,
        })
    }
}

#[async_trait]
impl MessageStore for MessageRepository {
    async fn save_message(
        &self,
        chat_id: i64,
        sender_id: i64,
        text: &str,
        timestamp: i64,
    ) -> ChatResult<Message> {
        let result = sqlx::query(
            "INSERT INTO messages (chat_id, sender_id, text, timestamp, read)
             VALUES (?, ?, ?, ?, 0)",
        )
        .bind(chat_id)
        .bind(sender_id)
        .bind(text)
        .bind(timestamp)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!(message_id = id, chat_id, "message persisted");

        Ok(Message {
            id,
            chat_id,
            sender_id,
            text: text.to_string(),
            timestamp,
            read: false,
        })
    }

    async fn mark_read(&self, message_id: i64) -> ChatResult<()> {
        sqlx::query("UPDATE messages SET read = 1 WHERE id = ?")
            .bind(message_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_history(&self, chat_id: i64) -> ChatResult<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT id, chat_id, sender_id, text, timestamp, read
             FROM messages WHERE chat_id = ? ORDER BY id",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| message_from_row(row).map_err(ChatError::from))
            .collect()
    }
}

fn message_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Message, sqlx::Error> {
    Ok(Message {
        id: row.try_get("id")?,
        chat_id: row.try_get("chat_id")?,
        sender_id: row.try_get("sender_id")?,
        text: row.try_get("text")?,
        timestamp: row.try_get("timestamp")?,
        read: row.try_get::<i64, _>("read")? != 0,
    })
}
