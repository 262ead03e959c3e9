use serde::{Deserialize, Serialize};

/// A persisted chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Assigned by the message store on insert.
    pub id: i64,
    pub chat_id: i64,
    pub sender_id: i64,
    pub text: String,
    /// Seconds since epoch, taken when the message was accepted.
    pub timestamp: i64,
    /// Flips false -> true once every member has received the message;
    /// never reversed.
    pub read: bool,
}
