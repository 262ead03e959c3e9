//! In-memory bookkeeping of live connections and undelivered messages.
//!
//! The registry is the only shared mutable structure in the delivery core.
//! It is reachable from every session and every delivery task, so all state
//! sits behind one coarse mutex; every critical section is a plain map
//! operation and nothing is awaited while the lock is held.

use std::collections::{HashMap, HashSet};

use tokio::sync::Mutex;

use crate::connection::ConnectionHandle;

#[derive(Default)]
struct ChatEntry {
    /// member id -> live connection handle
    connections: HashMap<i64, ConnectionHandle>,
    /// member id -> message ids queued for delivery but not yet confirmed
    fresh: HashMap<i64, HashSet<i64>>,
}

/// Process-wide map from (chat, member) to connection handle and fresh-message
/// set. Constructed once at startup and injected into every consumer; never a
/// global.
#[derive(Default)]
pub struct ConnectionRegistry {
    chats: Mutex<HashMap<i64, ChatEntry>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a chat with no connections and no pending messages.
    /// Re-registering silently resets the entry; callers only do that for a
    /// freshly created chat id.
    pub async fn create_chat(&self, chat_id: i64) {
        self.chats.lock().await.insert(chat_id, ChatEntry::default());
    }

    /// Additive variant used by startup reconciliation: registers the chat if
    /// missing and never touches an already-initialized entry. Returns whether
    /// a new entry was created.
    pub async fn ensure_chat(&self, chat_id: i64) -> bool {
        let mut chats = self.chats.lock().await;
        if chats.contains_key(&chat_id) {
            return false;
        }
        chats.insert(chat_id, ChatEntry::default());
        true
    }

    pub async fn contains_chat(&self, chat_id: i64) -> bool {
        self.chats.lock().await.contains_key(&chat_id)
    }

    /// Bind a handle for (chat, member), replacing any previous one so
    /// reconnects take over seamlessly. The member's fresh-message set is
    /// created empty if absent but an existing one is never cleared.
    pub async fn add_connection(&self, chat_id: i64, user_id: i64, handle: ConnectionHandle) {
        let mut chats = self.chats.lock().await;
        let entry = chats.entry(chat_id).or_default();
        entry.connections.insert(user_id, handle);
        entry.fresh.entry(user_id).or_default();
    }

    /// Unbind the handle for (chat, member). Silently ignores pairs that are
    /// already gone; a double disconnect is not an error.
    pub async fn remove_connection(&self, chat_id: i64, user_id: i64) {
        if let Some(entry) = self.chats.lock().await.get_mut(&chat_id) {
            entry.connections.remove(&user_id);
        }
    }

    /// Non-blocking lookup of the live handle for (chat, member).
    pub async fn get_connection(&self, chat_id: i64, user_id: i64) -> Option<ConnectionHandle> {
        self.chats
            .lock()
            .await
            .get(&chat_id)
            .and_then(|entry| entry.connections.get(&user_id))
            .cloned()
    }

    /// Record that a delivery attempt for `message_id` has begun for the
    /// member. The entry survives disconnects; it is only removed once the
    /// send actually succeeds.
    pub async fn add_fresh_message(&self, message_id: i64, chat_id: i64, user_id: i64) {
        let mut chats = self.chats.lock().await;
        let entry = chats.entry(chat_id).or_default();
        entry.fresh.entry(user_id).or_default().insert(message_id);
    }

    /// Drop the pending marker after a successful delivery.
    pub async fn clear_fresh_message(&self, message_id: i64, chat_id: i64, user_id: i64) {
        if let Some(entry) = self.chats.lock().await.get_mut(&chat_id) {
            if let Some(fresh) = entry.fresh.get_mut(&user_id) {
                fresh.remove(&message_id);
            }
        }
    }

    /// Message ids still pending for (chat, member). Session replay uses this
    /// to skip history items a delivery task is about to resend anyway.
    pub async fn fresh_messages(&self, chat_id: i64, user_id: i64) -> HashSet<i64> {
        self.chats
            .lock()
            .await
            .get(&chat_id)
            .and_then(|entry| entry.fresh.get(&user_id))
            .cloned()
            .unwrap_or_default()
    }
}
