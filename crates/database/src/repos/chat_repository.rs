//! Repository for chat and membership data access operations.

use async_trait::async_trait;
use courier_chats::{Chat, ChatError, ChatResult, ChatType, MembershipStore};
use sqlx::{Row, SqlitePool};
use tracing::info;

pub struct ChatRepository {
    pool: SqlitePool,
}

impl ChatRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Add a user to a chat. Only the creator may manage membership, and a
    /// private chat never grows past two members. Creators are not members
    /// until they add themselves through this same path.
    pub async fn add_member(
        &self,
        chat_id: i64,
        user_id: i64,
        acting_user_id: i64,
    ) -> ChatResult<Chat> {
        let chat = self.get_chat(chat_id).await?;
        if chat.creator_id != acting_user_id {
            return Err(ChatError::NotCreator);
        }

        let user_exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        if user_exists.is_none() {
            return Err(ChatError::user_not_found(user_id));
        }

        if chat.chat_type.is_private() && chat.member_ids.len() >= 2 {
            return Err(ChatError::PrivateChatFull);
        }

        sqlx::query("INSERT OR IGNORE INTO chat_members (chat_id, user_id) VALUES (?, ?)")
            .bind(chat_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        info!(chat_id, user_id, "member added to chat");
        self.get_chat(chat_id).await
    }

    /// Remove a user from a chat. Creator-only, and removing an absent
    /// member is a no-op.
    pub async fn remove_member(
        &self,
        chat_id: i64,
        user_id: i64,
        acting_user_id: i64,
    ) -> ChatResult<Chat> {
        let chat = self.get_chat(chat_id).await?;
        if chat.creator_id != acting_user_id {
            return Err(ChatError::NotCreator);
        }

        sqlx::query("DELETE FROM chat_members WHERE chat_id = ? AND user_id = ?")
            .bind(chat_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        info!(chat_id, user_id, "member removed from chat");
        self.get_chat(chat_id).await
    }

    async fn member_ids(&self, chat_id: i64) -> ChatResult<Vec<i64>> {
        let rows = sqlx::query(
            "SELECT user_id FROM chat_members WHERE chat_id = ? ORDER BY rowid",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get("user_id").map_err(ChatError::from))
            .collect()
    }
}

#[async_trait]
impl MembershipStore for ChatRepository {
    async fn create_chat(
        &self,
        name: &str,
        chat_type: ChatType,
        creator_id: i64,
    ) -> ChatResult<Chat> {
        let result = sqlx::query(
            "INSERT INTO chats (name, chat_type, creator_id) VALUES (?, ?, ?)",
        )
        .bind(name)
        .bind(chat_type.as_str())
        .bind(creator_id)
        .execute(&self.pool)
        .await?;

        let chat_id = result.last_insert_rowid();
        info!(chat_id, chat_type = chat_type.as_str(), "created new chat");

        Ok(Chat {
            id: chat_id,
            name: name.to_string(),
            chat_type,
            creator_id,
            member_ids: Vec::new(),
        })
    }

    async fn get_chat(&self, chat_id: i64) -> ChatResult<Chat> {
        let row = sqlx::query("SELECT id, name, chat_type, creator_id FROM chats WHERE id = ?")
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ChatError::chat_not_found(chat_id))?;

        let chat_type: String = row.try_get("chat_type")?;

        Ok(Chat {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            chat_type: ChatType::from(chat_type.as_str()),
            creator_id: row.try_get("creator_id")?,
            member_ids: self.member_ids(chat_id).await?,
        })
    }

    async fn all_chat_ids(&self) -> ChatResult<Vec<i64>> {
        let rows = sqlx::query("SELECT id FROM chats ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get("id").map_err(ChatError::from))
            .collect()
    }
}
