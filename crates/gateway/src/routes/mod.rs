pub mod auth;
pub mod chats;
pub mod history;
pub mod users;
pub mod websocket;
