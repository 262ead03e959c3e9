//! End-to-end scenarios for the delivery core: live fan-out, offline
//! retries across reconnects, history replay, and startup reconciliation,
//! all over in-memory stores and channel-backed connections.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::time::timeout;

use courier_chats::{
    Chat, ChatError, ChatManager, ChatResult, ChatType, Connection, ConnectionHandle,
    MembershipStore, Message, MessageStore, TransportError,
};

const RETRY: Duration = Duration::from_millis(10);
const WAIT: Duration = Duration::from_secs(2);

#[derive(Default)]
struct MemoryMembershipStore {
    chats: StdMutex<HashMap<i64, Chat>>,
    next_id: StdMutex<i64>,
}

impl MemoryMembershipStore {
    fn with_chat(chat: Chat) -> Arc<Self> {
        let store = Self::default();
        *store.next_id.lock().unwrap() = chat.id;
        store.chats.lock().unwrap().insert(chat.id, chat);
        Arc::new(store)
    }
}

#[async_trait]
impl MembershipStore for MemoryMembershipStore {
    async fn create_chat(
        &self,
        name: &str,
        chat_type: ChatType,
        creator_id: i64,
    ) -> ChatResult<Chat> {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let chat = Chat {
            id: *next_id,
            name: name.to_string(),
            chat_type,
            creator_id,
            member_ids: Vec::new(),
        };
        self.chats.lock().unwrap().insert(chat.id, chat.clone());
        Ok(chat)
    }

    async fn get_chat(&self, chat_id: i64) -> ChatResult<Chat> {
        self.chats
            .lock()
            .unwrap()
            .get(&chat_id)
            .cloned()
            .ok_or(ChatError::ChatNotFound { id: chat_id })
    }

    async fn all_chat_ids(&self) -> ChatResult<Vec<i64>> {
        let mut ids: Vec<i64> = self.chats.lock().unwrap().keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

#[derive(Default)]
struct MemoryMessageStore {
    messages: StdMutex<Vec<Message>>,
}

impl MemoryMessageStore {
    fn message(&self, message_id: i64) -> Option<Message> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id == message_id)
            .cloned()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn save_message(
        &self,
        chat_id: i64,
        sender_id: i64,
        text: &str,
        timestamp: i64,
    ) -> ChatResult<Message> {
        let mut messages = self.messages.lock().unwrap();
        let message = Message {
            id: messages.len() as i64 + 1,
            chat_id,
            sender_id,
            text: text.to_string(),
            timestamp,
            read: false,
        };
        messages.push(message.clone());
        Ok(message)
    }

    async fn mark_read(&self, message_id: i64) -> ChatResult<()> {
        let mut messages = self.messages.lock().unwrap();
        if let Some(message) = messages.iter_mut().find(|m| m.id == message_id) {
            message.read = true;
        }
        Ok(())
    }

    async fn get_history(&self, chat_id: i64) -> ChatResult<Vec<Message>> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect())
    }
}

/// Server-side half of a duplex text channel. The matching [`TestPeer`]
/// plays the remote client.
struct TestConnection {
    outgoing: mpsc::UnboundedSender<String>,
    incoming: Mutex<mpsc::UnboundedReceiver<String>>,
}

struct TestPeer {
    to_server: mpsc::UnboundedSender<String>,
    from_server: mpsc::UnboundedReceiver<String>,
}

fn connection_pair() -> (ConnectionHandle, TestPeer) {
    let (to_server, server_incoming) = mpsc::unbounded_channel();
    let (server_outgoing, from_server) = mpsc::unbounded_channel();
    let connection = Arc::new(TestConnection {
        outgoing: server_outgoing,
        incoming: Mutex::new(server_incoming),
    });
    let peer = TestPeer {
        to_server,
        from_server,
    };
    (connection, peer)
}

#[async_trait]
impl Connection for TestConnection {
    async fn send_text(&self, text: &str) -> Result<(), TransportError> {
        self.outgoing
            .send(text.to_string())
            .map_err(|_| TransportError::Disconnected)
    }

    async fn receive_text(&self) -> Result<String, TransportError> {
        self.incoming
            .lock()
            .await
            .recv()
            .await
            .ok_or(TransportError::Disconnected)
    }
}

impl TestPeer {
    fn say(&self, text: &str) {
        self.to_server
            .send(text.to_string())
            .expect("session should still be receiving");
    }

    async fn next(&mut self) -> String {
        timeout(WAIT, self.from_server.recv())
            .await
            .expect("expected a message before the deadline")
            .expect("connection closed unexpectedly")
    }
}

fn group_chat(id: i64, members: Vec<i64>) -> Chat {
    Chat {
        id,
        name: "room".to_string(),
        chat_type: ChatType::Group,
        creator_id: members.first().copied().unwrap_or(0),
        member_ids: members,
    }
}

async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached before the deadline");
}

fn connect(
    manager: &Arc<ChatManager>,
    chat_id: i64,
    user_id: i64,
    connection: ConnectionHandle,
) -> tokio::task::JoinHandle<ChatResult<()>> {
    let manager = Arc::clone(manager);
    tokio::spawn(async move { manager.connect_to_chat(chat_id, user_id, connection).await })
}

#[tokio::test]
async fn message_reaches_offline_member_after_reconnect() {
    let chats = MemoryMembershipStore::with_chat(group_chat(1, vec![10, 20]));
    let messages = Arc::new(MemoryMessageStore::default());
    let manager = Arc::new(ChatManager::with_retry_interval(
        Arc::clone(&chats) as Arc<dyn MembershipStore>,
        Arc::clone(&messages) as Arc<dyn MessageStore>,
        RETRY,
    ));
    manager.registry().create_chat(1).await;

    // Only the sender is online.
    let (conn_a, mut peer_a) = connection_pair();
    let session_a = connect(&manager, 1, 10, conn_a);

    peer_a.say("hello");

    // The sender receives their own message back as a chat member.
    assert_eq!(peer_a.next().await, "User 10: hello");

    // The message is persisted but unread while member 20 stays offline.
    wait_until(|| messages.message(1).is_some()).await;
    assert!(!messages.message(1).map(|m| m.read).unwrap_or(true));

    // Member 20 connects; the pending delivery finds the new handle.
    let (conn_b, mut peer_b) = connection_pair();
    let session_b = connect(&manager, 1, 20, conn_b);
    assert_eq!(peer_b.next().await, "User 10: hello");

    // With everyone delivered, the read flag flips and the sender is told.
    wait_until(|| messages.message(1).map(|m| m.read).unwrap_or(false)).await;
    assert_eq!(
        peer_a.next().await,
        "User 10: hello: Message was read by all chat participants."
    );

    drop(peer_a);
    drop(peer_b);
    session_a.await.unwrap().unwrap();
    session_b.await.unwrap().unwrap();
    manager.shutdown();
}

#[tokio::test]
async fn replay_after_reconnect_skips_pending_deliveries() {
    let chats = MemoryMembershipStore::with_chat(group_chat(1, vec![10, 20]));
    let messages = Arc::new(MemoryMessageStore::default());
    let manager = Arc::new(ChatManager::with_retry_interval(
        Arc::clone(&chats) as Arc<dyn MembershipStore>,
        Arc::clone(&messages) as Arc<dyn MessageStore>,
        RETRY,
    ));
    manager.registry().create_chat(1).await;

    let (conn_a, mut peer_a) = connection_pair();
    let session_a = connect(&manager, 1, 10, conn_a);

    // First message is fully delivered while member 20 is online.
    let (conn_b, mut peer_b) = connection_pair();
    let session_b = connect(&manager, 1, 20, conn_b);
    peer_a.say("first");
    assert_eq!(peer_a.next().await, "User 10: first");
    assert_eq!(peer_b.next().await, "User 10: first");
    wait_until(|| messages.message(1).map(|m| m.read).unwrap_or(false)).await;
    assert_eq!(
        peer_a.next().await,
        "User 10: first: Message was read by all chat participants."
    );

    // Member 20 drops, then a second message arrives.
    drop(peer_b);
    session_b.await.unwrap().unwrap();
    peer_a.say("second");
    assert_eq!(peer_a.next().await, "User 10: second");
    timeout(WAIT, async {
        while !manager.registry().fresh_messages(1, 20).await.contains(&2) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("delivery for the offline member should be pending");

    // On reconnect the replay covers the first message only; the pending
    // delivery task resends the second itself, so it arrives exactly once.
    let (conn_b, mut peer_b) = connection_pair();
    let session_b = connect(&manager, 1, 20, conn_b);
    assert_eq!(peer_b.next().await, "User 10: first");
    assert_eq!(peer_b.next().await, "User 10: second");
    wait_until(|| messages.message(2).map(|m| m.read).unwrap_or(false)).await;

    drop(peer_a);
    drop(peer_b);
    session_a.await.unwrap().unwrap();
    session_b.await.unwrap().unwrap();
    manager.shutdown();
}

#[tokio::test]
async fn non_member_is_rejected_without_side_effects() {
    let chats = MemoryMembershipStore::with_chat(group_chat(1, vec![10]));
    let messages = Arc::new(MemoryMessageStore::default());
    let manager = Arc::new(ChatManager::with_retry_interval(
        Arc::clone(&chats) as Arc<dyn MembershipStore>,
        Arc::clone(&messages) as Arc<dyn MessageStore>,
        RETRY,
    ));
    manager.registry().create_chat(1).await;

    let (conn, _peer) = connection_pair();
    let result = manager.connect_to_chat(1, 99, conn).await;

    assert!(matches!(
        result,
        Err(ChatError::NotMember {
            chat_id: 1,
            user_id: 99
        })
    ));
    assert!(manager.registry().get_connection(1, 99).await.is_none());
    manager.shutdown();
}

#[tokio::test]
async fn unknown_chat_is_rejected() {
    let chats = Arc::new(MemoryMembershipStore::default());
    let messages = Arc::new(MemoryMessageStore::default());
    let manager = Arc::new(ChatManager::with_retry_interval(
        chats as Arc<dyn MembershipStore>,
        messages as Arc<dyn MessageStore>,
        RETRY,
    ));

    let (conn, _peer) = connection_pair();
    let result = manager.connect_to_chat(42, 10, conn).await;

    assert!(matches!(result, Err(ChatError::ChatNotFound { id: 42 })));
    manager.shutdown();
}

#[tokio::test]
async fn restart_reconciliation_recovers_persisted_chats() {
    let chats = MemoryMembershipStore::with_chat(group_chat(1, vec![10, 20]));
    let messages = Arc::new(MemoryMessageStore::default());

    // First process lifetime: the chat exists and collects a message.
    {
        let manager = Arc::new(ChatManager::with_retry_interval(
            Arc::clone(&chats) as Arc<dyn MembershipStore>,
            Arc::clone(&messages) as Arc<dyn MessageStore>,
            RETRY,
        ));
        manager.sync_persistent_and_memory_chat_storage().await.unwrap();

        let (conn_a, mut peer_a) = connection_pair();
        let session_a = connect(&manager, 1, 10, conn_a);
        peer_a.say("before restart");
        assert_eq!(peer_a.next().await, "User 10: before restart");

        drop(peer_a);
        session_a.await.unwrap().unwrap();
        manager.shutdown();
    }

    // Second lifetime: a fresh manager over the same stores. The registry
    // starts empty, so reconciliation must re-register the chat before
    // members can connect.
    let manager = Arc::new(ChatManager::with_retry_interval(
        Arc::clone(&chats) as Arc<dyn MembershipStore>,
        Arc::clone(&messages) as Arc<dyn MessageStore>,
        RETRY,
    ));
    let registered = manager.sync_persistent_and_memory_chat_storage().await.unwrap();
    assert_eq!(registered, 1);

    // The in-memory fresh sets died with the old process, so the stored
    // message replays to the reconnecting member from history.
    let (conn_b, mut peer_b) = connection_pair();
    let session_b = connect(&manager, 1, 20, conn_b);
    assert_eq!(peer_b.next().await, "User 10: before restart");

    drop(peer_b);
    session_b.await.unwrap().unwrap();
    manager.shutdown();
}
