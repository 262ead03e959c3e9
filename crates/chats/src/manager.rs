//! The single entry point the gateway talks to.
//!
//! `ChatManager` wires the registry, the delivery engine and the session
//! coordinator together over one pair of stores, and owns the startup
//! reconciliation pass that re-registers persisted chats after a restart.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::connection::ConnectionHandle;
use crate::delivery::DeliveryEngine;
use crate::registry::ConnectionRegistry;
use crate::repositories::{MembershipStore, MessageStore};
use crate::session::SessionCoordinator;
use crate::types::ChatResult;
use crate::{Chat, ChatType};

pub struct ChatManager {
    registry: Arc<ConnectionRegistry>,
    chats: Arc<dyn MembershipStore>,
    delivery: Arc<DeliveryEngine>,
    sessions: SessionCoordinator,
}

impl ChatManager {
    pub fn new(chats: Arc<dyn MembershipStore>, messages: Arc<dyn MessageStore>) -> Self {
        Self::with_retry_interval(chats, messages, crate::delivery::DEFAULT_RETRY_INTERVAL)
    }

    /// Tests shrink the delivery backoff to keep reconnect scenarios fast.
    pub fn with_retry_interval(
        chats: Arc<dyn MembershipStore>,
        messages: Arc<dyn MessageStore>,
        retry_interval: Duration,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let delivery = Arc::new(DeliveryEngine::with_retry_interval(
            Arc::clone(&registry),
            Arc::clone(&chats),
            Arc::clone(&messages),
            retry_interval,
        ));
        let sessions = SessionCoordinator::new(
            Arc::clone(&registry),
            Arc::clone(&chats),
            Arc::clone(&messages),
            Arc::clone(&delivery),
        );
        Self {
            registry,
            chats,
            delivery,
            sessions,
        }
    }

    /// Create a chat in persistent storage and register it for live delivery
    /// in the same call.
    pub async fn create_chat(
        &self,
        name: &str,
        chat_type: ChatType,
        creator_id: i64,
    ) -> ChatResult<Chat> {
        let chat = self.chats.create_chat(name, chat_type, creator_id).await?;
        self.registry.create_chat(chat.id).await;
        info!(chat_id = chat.id, chat_type = chat.chat_type.as_str(), "chat created");
        Ok(chat)
    }

    /// Run a member's session until their connection closes. See
    /// [`SessionCoordinator::run`] for the exact lifecycle.
    pub async fn connect_to_chat(
        &self,
        chat_id: i64,
        user_id: i64,
        connection: ConnectionHandle,
    ) -> ChatResult<()> {
        self.sessions.run(chat_id, user_id, connection).await
    }

    /// Unbind a member's connection out of band. Sessions clean up after
    /// themselves; this exists for callers that tear down a transport without
    /// letting the session observe the disconnect.
    pub async fn disconnect_from_chat(&self, chat_id: i64, user_id: i64) {
        self.registry.remove_connection(chat_id, user_id).await;
    }

    /// Re-register every persisted chat in the in-memory registry. Additive
    /// and idempotent: live connections and pending deliveries in chats that
    /// are already registered are untouched. Runs at startup before the
    /// server accepts connections.
    pub async fn sync_persistent_and_memory_chat_storage(&self) -> ChatResult<usize> {
        let chat_ids = self.chats.all_chat_ids().await?;

        let mut registered = 0usize;
        for chat_id in chat_ids {
            if self.registry.ensure_chat(chat_id).await {
                registered += 1;
            }
        }
        info!(registered, "chat registry reconciled with persistent storage");
        Ok(registered)
    }

    /// Cancel all pending delivery tasks. Called once during process shutdown.
    pub fn shutdown(&self) {
        self.delivery.shutdown();
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }
}
