//! Repository implementations over the SQLite pool.

pub mod chat_repository;
pub mod message_repository;
pub mod user_repository;

pub use chat_repository::ChatRepository;
pub use message_repository::{MessageHistory, MessageRepository};
pub use user_repository::UserRepository;
