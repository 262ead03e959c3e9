//! The bidirectional text channel capability the core runs sessions over.
//!
//! The gateway supplies the concrete implementation (a WebSocket adapter);
//! tests supply channel-backed doubles. The registry only ever holds a shared
//! handle, the session coordinator owns the lifecycle.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Shared handle to one live connection, bound to a single (chat, member) pair.
pub type ConnectionHandle = Arc<dyn Connection>;

/// An opaque bidirectional text channel.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Push one text payload to the remote end.
    async fn send_text(&self, text: &str) -> Result<(), TransportError>;

    /// Wait for the next text payload from the remote end.
    async fn receive_text(&self) -> Result<String, TransportError>;
}

/// Transport-level failures. A disconnect is an expected signal, not an
/// alarm-worthy error; it triggers session cleanup.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("connection closed by peer")]
    Disconnected,

    #[error("transport failure: {0}")]
    Transport(String),
}

impl TransportError {
    pub fn is_disconnect(&self) -> bool {
        matches!(self, TransportError::Disconnected)
    }
}
