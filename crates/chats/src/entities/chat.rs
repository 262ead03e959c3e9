use serde::{Deserialize, Serialize};

/// A chat and its durable membership, as read from the membership store.
///
/// The connection registry never duplicates this data; it is re-fetched
/// whenever the member list decides a fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub name: String,
    pub chat_type: ChatType,
    pub creator_id: i64,
    /// Member ids in join order. The creator is only listed here once
    /// explicitly added as a member.
    pub member_ids: Vec<i64>,
}

impl Chat {
    pub fn is_member(&self, user_id: i64) -> bool {
        self.member_ids.contains(&user_id)
    }
}

/// Chat type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChatType {
    /// Never more than two members.
    Private,
    /// Unbounded membership.
    Group,
}

impl ChatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatType::Private => "PRIVATE",
            ChatType::Group => "GROUP",
        }
    }

    pub fn is_private(&self) -> bool {
        matches!(self, ChatType::Private)
    }
}

impl From<&str> for ChatType {
    fn from(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "PRIVATE" => ChatType::Private,
            _ => ChatType::Group,
        }
    }
}
