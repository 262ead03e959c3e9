//! Courier Database Crate
//!
//! SQLite persistence for Courier: connection management, migrations, and the
//! repository implementations backing the `courier-chats` store traits.

use anyhow::Result;
use courier_config::DatabaseConfig;
use sqlx::SqlitePool;

pub mod connection;
pub mod entities;
pub mod migrations;
pub mod repos;

pub use connection::prepare_database;
pub use entities::{User, UserError, UserResult};
pub use migrations::run_migrations;
pub use repos::{ChatRepository, MessageHistory, MessageRepository, UserRepository};

/// Connect and bring the schema up to date in one call.
pub async fn initialize_database(config: &DatabaseConfig) -> Result<SqlitePool> {
    let pool = prepare_database(config).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}
