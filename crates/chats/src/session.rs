//! Lifecycle of one member's connection to one chat.
//!
//! A session runs strictly in sequence: authorize, register the connection,
//! replay history, then pump inbound messages until the peer goes away. The
//! same coordinator also guarantees the registry is cleaned up no matter how
//! the session ends.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::connection::ConnectionHandle;
use crate::delivery::DeliveryEngine;
use crate::registry::ConnectionRegistry;
use crate::repositories::{MembershipStore, MessageStore};
use crate::types::{ChatError, ChatResult};

pub struct SessionCoordinator {
    registry: Arc<ConnectionRegistry>,
    chats: Arc<dyn MembershipStore>,
    messages: Arc<dyn MessageStore>,
    delivery: Arc<DeliveryEngine>,
}

impl SessionCoordinator {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        chats: Arc<dyn MembershipStore>,
        messages: Arc<dyn MessageStore>,
        delivery: Arc<DeliveryEngine>,
    ) -> Self {
        Self {
            registry,
            chats,
            messages,
            delivery,
        }
    }

    /// Drive a member's session from connect to disconnect.
    ///
    /// Authorization happens before the registry is touched, so a rejected
    /// connection leaves no trace. Returns once the connection is gone; a
    /// clean peer disconnect is a normal return, not an error.
    pub async fn run(
        &self,
        chat_id: i64,
        user_id: i64,
        connection: ConnectionHandle,
    ) -> ChatResult<()> {
        let chat = self.chats.get_chat(chat_id).await?;
        if !chat.is_member(user_id) {
            return Err(ChatError::not_member(chat_id, user_id));
        }

        self.registry
            .add_connection(chat_id, user_id, Arc::clone(&connection))
            .await;
        info!(chat_id, user_id, "member connected");

        let result = async {
            self.replay_history(chat_id, user_id, &connection).await?;
            self.receive_loop(chat_id, user_id, &connection).await
        }
        .await;

        // Cleanup is unconditional; a failed replay still unbinds the handle.
        self.registry.remove_connection(chat_id, user_id).await;
        info!(chat_id, user_id, "member disconnected");

        match result {
            Err(ChatError::Transport(error)) => {
                if !error.is_disconnect() {
                    warn!(chat_id, user_id, %error, "session ended on transport failure");
                }
                Ok(())
            }
            other => other,
        }
    }

    /// Send the chat's stored history to a just-connected member, skipping
    /// messages a pending delivery task is about to resend anyway. Pending
    /// deliveries notice the new handle on their next poll, so the member
    /// still receives those exactly once.
    async fn replay_history(
        &self,
        chat_id: i64,
        user_id: i64,
        connection: &ConnectionHandle,
    ) -> ChatResult<()> {
        let history = self.messages.get_history(chat_id).await?;
        let pending = self.registry.fresh_messages(chat_id, user_id).await;

        let mut replayed = 0usize;
        for message in &history {
            if pending.contains(&message.id) {
                continue;
            }
            connection.send_text(&message.text).await?;
            replayed += 1;
        }
        debug!(chat_id, user_id, replayed, "history replay complete");

        Ok(())
    }

    /// Pump inbound text until the peer disconnects. Each payload is stamped
    /// and persisted before fan-out starts, so delivery always works from a
    /// message that has an id.
    async fn receive_loop(
        &self,
        chat_id: i64,
        user_id: i64,
        connection: &ConnectionHandle,
    ) -> ChatResult<()> {
        loop {
            let text = connection.receive_text().await?;
            let outbound = format!("User {user_id}: {text}");

            let message = self
                .messages
                .save_message(chat_id, user_id, &outbound, Utc::now().timestamp())
                .await?;
            debug!(chat_id, user_id, message_id = message.id, "message accepted");

            self.delivery.spawn_deliver(message);
        }
    }
}
