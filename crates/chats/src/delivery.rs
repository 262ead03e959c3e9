//! Fan-out delivery of persisted messages to every chat member.
//!
//! Delivery is not best-effort: a member who is offline at send time keeps a
//! pending delivery task that polls the registry until they next connect.
//! There is deliberately no timeout and no retry cap; within one process
//! lifetime a delivery task only ends in success or shutdown. There is also
//! no ordering guarantee across members, only per member per connection.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::registry::ConnectionRegistry;
use crate::repositories::{MembershipStore, MessageStore};
use crate::types::ChatResult;
use crate::Message;

/// How long a delivery task sleeps between registry polls while its target
/// member is offline.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(3);

pub struct DeliveryEngine {
    registry: Arc<ConnectionRegistry>,
    chats: Arc<dyn MembershipStore>,
    messages: Arc<dyn MessageStore>,
    retry_interval: Duration,
    shutdown: watch::Sender<bool>,
}

impl DeliveryEngine {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        chats: Arc<dyn MembershipStore>,
        messages: Arc<dyn MessageStore>,
    ) -> Self {
        Self::with_retry_interval(registry, chats, messages, DEFAULT_RETRY_INTERVAL)
    }

    pub fn with_retry_interval(
        registry: Arc<ConnectionRegistry>,
        chats: Arc<dyn MembershipStore>,
        messages: Arc<dyn MessageStore>,
        retry_interval: Duration,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            registry,
            chats,
            messages,
            retry_interval,
            shutdown,
        }
    }

    /// Cancel every pending delivery task. The no-timeout contract holds for
    /// the lifetime of the process; this is the one internal escape hatch so
    /// shutdown and tests do not hang on offline members.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Fire-and-forget entry point used by the session receive loop, which
    /// must not block on fan-out completion. Failures are logged instead of
    /// silently vanishing with the task.
    pub fn spawn_deliver(self: &Arc<Self>, message: Message) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let chat_id = message.chat_id;
            let message_id = message.id;
            if let Err(error) = engine.deliver(message).await {
                error!(chat_id, message_id, %error, "message fan-out failed");
            }
        });
    }

    /// Deliver one persisted message to all current chat members, then mark
    /// it read and notify the sender.
    ///
    /// Every member gets an independent delivery future; the read transition
    /// happens only after all of them have completed (every member was online
    /// at least once since the message was created). Sibling deliveries are
    /// never aborted by one member staying offline.
    pub async fn deliver(self: &Arc<Self>, message: Message) -> ChatResult<()> {
        let chat = self.chats.get_chat(message.chat_id).await?;

        let deliveries = chat.member_ids.iter().map(|&member_id| {
            self.deliver_to_member(message.chat_id, member_id, message.id, message.text.clone())
        });
        let outcomes = futures::future::join_all(deliveries).await;

        if outcomes.iter().any(|&delivered| !delivered) {
            // Shutdown interrupted the fan-in; leave the read flag untouched.
            return Ok(());
        }

        // Delivered and read are eventually consistent, not atomic: per-member
        // deliveries are never rolled back if this write fails.
        self.messages.mark_read(message.id).await?;
        debug!(message_id = message.id, "message read by all chat members");

        let confirmation = format!("{}: Message was read by all chat participants.", message.text);
        self.spawn_notify(message.chat_id, message.sender_id, message.id, confirmation);

        Ok(())
    }

    /// Confirmation back to the sender reuses the same deliver-with-retry
    /// primitive, addressed at the sender, and is not awaited: it happens
    /// after mark-read is issued, not after it commits.
    fn spawn_notify(self: &Arc<Self>, chat_id: i64, sender_id: i64, message_id: i64, text: String) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            if engine
                .deliver_to_member(chat_id, sender_id, message_id, text)
                .await
            {
                debug!(message_id, sender_id, "read confirmation delivered to sender");
            }
        });
    }

    /// Mark the message fresh for the member, then poll the registry until a
    /// live connection accepts the send. Returns false only when shutdown
    /// cancels the wait; the fresh entry is left in place on every failure so
    /// replay logic can tell pending from delivered.
    async fn deliver_to_member(
        &self,
        chat_id: i64,
        user_id: i64,
        message_id: i64,
        text: String,
    ) -> bool {
        self.registry
            .add_fresh_message(message_id, chat_id, user_id)
            .await;

        let mut shutdown = self.shutdown.subscribe();
        loop {
            if *shutdown.borrow() {
                debug!(message_id, user_id, "delivery cancelled by shutdown");
                return false;
            }

            if let Some(connection) = self.registry.get_connection(chat_id, user_id).await {
                match connection.send_text(&text).await {
                    Ok(()) => {
                        self.registry
                            .clear_fresh_message(message_id, chat_id, user_id)
                            .await;
                        info!(message_id, user_id, "message successfully delivered");
                        return true;
                    }
                    Err(error) => {
                        // Stale handle; the owning session will unbind it and
                        // the member will be retried like any offline target.
                        debug!(message_id, user_id, %error, "send failed, will retry");
                    }
                }
            }

            tokio::select! {
                _ = sleep(self.retry_interval) => {}
                _ = shutdown.changed() => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Connection, ConnectionHandle, TransportError};
    use crate::repositories::{MockMembershipStore, MockMessageStore};
    use crate::{Chat, ChatType};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    struct RecordingConnection {
        sent: StdMutex<Vec<String>>,
    }

    impl RecordingConnection {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: StdMutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Connection for RecordingConnection {
        async fn send_text(&self, text: &str) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn receive_text(&self) -> Result<String, TransportError> {
            Err(TransportError::Disconnected)
        }
    }

    fn message(id: i64, chat_id: i64, sender_id: i64, text: &str) -> Message {
        Message {
            id,
            chat_id,
            sender_id,
            text: text.to_string(),
            timestamp: 0,
            read: false,
        }
    }

    fn group_chat(id: i64, members: Vec<i64>) -> Chat {
        Chat {
            id,
            name: "test".to_string(),
            chat_type: ChatType::Group,
            creator_id: members.first().copied().unwrap_or(0),
            member_ids: members,
        }
    }

    #[tokio::test]
    async fn delivers_to_connected_members_and_marks_read() {
        let registry = Arc::new(ConnectionRegistry::new());
        registry.create_chat(1).await;

        let conn_a = RecordingConnection::new();
        let conn_b = RecordingConnection::new();
        registry
            .add_connection(1, 10, Arc::clone(&conn_a) as ConnectionHandle)
            .await;
        registry
            .add_connection(1, 20, Arc::clone(&conn_b) as ConnectionHandle)
            .await;

        let mut chats = MockMembershipStore::new();
        chats
            .expect_get_chat()
            .returning(|id| Ok(group_chat(id, vec![10, 20])));

        let mut messages = MockMessageStore::new();
        messages
            .expect_mark_read()
            .times(1)
            .returning(|_| Ok(()));

        let engine = Arc::new(DeliveryEngine::with_retry_interval(
            Arc::clone(&registry),
            Arc::new(chats),
            Arc::new(messages),
            Duration::from_millis(5),
        ));

        engine
            .deliver(message(7, 1, 10, "User 10: hi"))
            .await
            .expect("fan-out should complete");

        assert_eq!(conn_a.sent(), vec!["User 10: hi".to_string()]);
        assert_eq!(conn_b.sent(), vec!["User 10: hi".to_string()]);
        assert!(registry.fresh_messages(1, 10).await.is_empty());
        assert!(registry.fresh_messages(1, 20).await.is_empty());

        engine.shutdown();
    }

    #[tokio::test]
    async fn offline_member_blocks_read_transition_until_shutdown() {
        let registry = Arc::new(ConnectionRegistry::new());
        registry.create_chat(1).await;

        let conn_a = RecordingConnection::new();
        registry
            .add_connection(1, 10, Arc::clone(&conn_a) as ConnectionHandle)
            .await;
        // Member 20 never connects.

        let mut chats = MockMembershipStore::new();
        chats
            .expect_get_chat()
            .returning(|id| Ok(group_chat(id, vec![10, 20])));

        let mut messages = MockMessageStore::new();
        // The barrier never completes, so the read flag must never flip.
        messages.expect_mark_read().times(0);

        let engine = Arc::new(DeliveryEngine::with_retry_interval(
            Arc::clone(&registry),
            Arc::new(chats),
            Arc::new(messages),
            Duration::from_millis(5),
        ));

        let pending = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.deliver(message(7, 1, 10, "User 10: hi")).await })
        };

        // The online member still receives the message while the fan-in waits.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(conn_a.sent(), vec!["User 10: hi".to_string()]);
        assert!(registry.fresh_messages(1, 20).await.contains(&7));

        engine.shutdown();
        pending
            .await
            .expect("task should join")
            .expect("cancelled fan-out is not an error");

        // Cancellation never clears pending state.
        assert!(registry.fresh_messages(1, 20).await.contains(&7));
    }

    #[tokio::test]
    async fn membership_lookup_failure_propagates() {
        let registry = Arc::new(ConnectionRegistry::new());

        let mut chats = MockMembershipStore::new();
        chats
            .expect_get_chat()
            .returning(|id| Err(crate::ChatError::ChatNotFound { id }));

        let messages = MockMessageStore::new();

        let engine = Arc::new(DeliveryEngine::with_retry_interval(
            registry,
            Arc::new(chats),
            Arc::new(messages),
            Duration::from_millis(5),
        ));

        let result = engine.deliver(message(7, 99, 10, "hi")).await;
        assert!(matches!(
            result,
            Err(crate::ChatError::ChatNotFound { id: 99 })
        ));
    }
}
