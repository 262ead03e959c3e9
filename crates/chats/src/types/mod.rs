//! Shared types for the chat system.

pub mod errors;

pub use errors::{ChatError, ChatResult};
