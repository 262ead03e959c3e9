use std::sync::Arc;

use courier_auth::Authenticator;
use courier_chats::ChatManager;
use courier_database::{ChatRepository, MessageRepository, UserRepository};
use sqlx::SqlitePool;

use crate::ApiError;

#[derive(Clone)]
pub struct AppState {
    users: Arc<UserRepository>,
    chats: Arc<ChatRepository>,
    messages: Arc<MessageRepository>,
    authenticator: Authenticator,
    manager: Arc<ChatManager>,
}

impl AppState {
    /// Wire the shared state over one pool. The delivery core reuses the same
    /// repositories the REST handlers read through.
    pub fn new(pool: SqlitePool, authenticator: Authenticator) -> Self {
        let chats = Arc::new(ChatRepository::new(pool.clone()));
        let messages = Arc::new(MessageRepository::new(pool.clone()));
        let manager = Arc::new(ChatManager::new(
            Arc::clone(&chats) as Arc<dyn courier_chats::MembershipStore>,
            Arc::clone(&messages) as Arc<dyn courier_chats::MessageStore>,
        ));

        Self {
            users: Arc::new(UserRepository::new(pool)),
            chats,
            messages,
            authenticator,
            manager,
        }
    }

    pub fn users(&self) -> &UserRepository {
        &self.users
    }

    pub fn chats(&self) -> &ChatRepository {
        &self.chats
    }

    pub fn messages(&self) -> &MessageRepository {
        &self.messages
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    pub fn manager(&self) -> &Arc<ChatManager> {
        &self.manager
    }

    /// Resolve a bearer token to the user id it names.
    pub fn authenticate(&self, token: &str) -> Result<i64, ApiError> {
        self.authenticator
            .authenticate_token(token)
            .map_err(ApiError::from)
    }
}
