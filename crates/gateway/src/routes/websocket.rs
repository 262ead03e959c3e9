//! The WebSocket endpoint and the adapter that turns an upgraded socket into
//! a `courier_chats::Connection`.
//!
//! Authorization failures are reported through close frames rather than HTTP
//! status codes: the upgrade always succeeds, then the socket closes with
//! 3003 (forbidden), 1000 + "CHAT NOT FOUND", or 1011 for internal faults.

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use courier_chats::{ChatError, Connection, ConnectionHandle, TransportError};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::AppState;

const CLOSE_NORMAL: u16 = 1000;
const CLOSE_INTERNAL: u16 = 1011;
const CLOSE_FORBIDDEN: u16 = 3003;

pub async fn connect_to_chat(
    ws: WebSocketUpgrade,
    Path((chat_id, token)): Path<(i64, String)>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, chat_id, token))
}

async fn handle_socket(socket: WebSocket, state: AppState, chat_id: i64, token: String) {
    let connection = Arc::new(WsConnection::new(socket));

    let user_id = match state.authenticator().authenticate_token(&token) {
        Ok(user_id) => user_id,
        Err(error) => {
            debug!(chat_id, %error, "websocket rejected, bad token");
            connection.close(CLOSE_FORBIDDEN, "ACCESS FORBIDDEN").await;
            return;
        }
    };

    let result = state
        .manager()
        .connect_to_chat(
            chat_id,
            user_id,
            Arc::clone(&connection) as ConnectionHandle,
        )
        .await;

    match result {
        Ok(()) => connection.close(CLOSE_NORMAL, "").await,
        Err(ChatError::ChatNotFound { .. }) => {
            connection.close(CLOSE_NORMAL, "CHAT NOT FOUND").await;
        }
        Err(ChatError::NotMember { .. }) => {
            connection.close(CLOSE_FORBIDDEN, "ACCESS FORBIDDEN").await;
        }
        Err(error) => {
            warn!(chat_id, user_id, %error, "websocket session failed");
            connection.close(CLOSE_INTERNAL, "internal error").await;
        }
    }
}

/// Adapter from an upgraded axum socket to the delivery core's channel
/// capability. Sink and stream are locked independently so a slow receive
/// never blocks delivery sends.
struct WsConnection {
    sink: Mutex<SplitSink<WebSocket, Message>>,
    stream: Mutex<SplitStream<WebSocket>>,
}

impl WsConnection {
    fn new(socket: WebSocket) -> Self {
        let (sink, stream) = socket.split();
        Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        }
    }

    async fn close(&self, code: u16, reason: &str) {
        // The peer may already be gone; nothing to do about a failed close.
        let frame = CloseFrame {
            code,
            reason: Cow::Owned(reason.to_string()),
        };
        let _ = self
            .sink
            .lock()
            .await
            .send(Message::Close(Some(frame)))
            .await;
    }
}

#[async_trait]
impl Connection for WsConnection {
    async fn send_text(&self, text: &str) -> Result<(), TransportError> {
        self.sink
            .lock()
            .await
            .send(Message::Text(text.to_string()))
            .await
            .map_err(|error| TransportError::Transport(error.to_string()))
    }

    async fn receive_text(&self) -> Result<String, TransportError> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text),
                Some(Ok(Message::Close(_))) | None => return Err(TransportError::Disconnected),
                // Ping/pong are handled by axum; binary frames are ignored.
                Some(Ok(_)) => continue,
                Some(Err(error)) => return Err(TransportError::Transport(error.to_string())),
            }
        }
    }
}
