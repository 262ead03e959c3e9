//! Domain entities shared by the delivery core and the storage layer.

pub mod chat;
pub mod message;

pub use chat::{Chat, ChatType};
pub use message::Message;
