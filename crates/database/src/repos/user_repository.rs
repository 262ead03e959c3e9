//! Repository for account records.

use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::entities::{User, UserError, UserResult};

#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new account. Names are unique; a collision surfaces as
    /// [`UserError::NameTaken`] rather than a raw constraint error.
    pub async fn create(
        &self,
        name: &str,
        password_hash: &str,
        created_at: i64,
    ) -> UserResult<User> {
        let result = sqlx::query(
            "INSERT INTO users (name, password_hash, created_at) VALUES (?, ?, ?)",
        )
        .bind(name)
        .bind(password_hash)
        .bind(created_at)
        .execute(&self.pool)
        .await;

        let result = match result {
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(UserError::NameTaken(name.to_string()));
            }
            other => other?,
        };

        let id = result.last_insert_rowid();
        info!(user_id = id, "user registered");

        Ok(User {
            id,
            name: name.to_string(),
            password_hash: password_hash.to_string(),
            created_at,
        })
    }

    pub async fn find_by_id(&self, id: i64) -> UserResult<User> {
        let row =
            sqlx::query("SELECT id, name, password_hash, created_at FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => Ok(user_from_row(&row)?),
            None => Err(UserError::NotFound { id }),
        }
    }

    pub async fn find_by_name(&self, name: &str) -> UserResult<Option<User>> {
        let row =
            sqlx::query("SELECT id, name, password_hash, created_at FROM users WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|row| Ok(user_from_row(&row)?)).transpose()
    }
}

fn user_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        password_hash: row.try_get("password_hash")?,
        created_at: row.try_get("created_at")?,
    })
}
