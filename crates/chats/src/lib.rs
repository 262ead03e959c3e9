//! # Courier Chats Crate
//!
//! This crate provides the real-time delivery core of Courier: tracking which
//! members are connected to which chats, fanning persisted messages out to
//! every member with reconnect-surviving retries, and reconciling the
//! in-memory connection registry with persistent storage after a restart.
//!
//! ## Architecture
//!
//! - **Entities**: Domain models (Chat, Message)
//! - **Registry**: In-memory connection and pending-delivery bookkeeping
//! - **Delivery**: Per-member fan-out with retry and the read barrier
//! - **Session**: Connect/replay/receive lifecycle for one member
//! - **Manager**: Facade wiring the above over a pair of store traits
//!
//! Persistence lives behind the [`repositories`] traits; the SQLite
//! implementations are in `courier-database`.

pub mod connection;
pub mod delivery;
pub mod entities;
pub mod manager;
pub mod registry;
pub mod repositories;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use connection::{Connection, ConnectionHandle, TransportError};
pub use delivery::{DeliveryEngine, DEFAULT_RETRY_INTERVAL};
pub use entities::{Chat, ChatType, Message};
pub use manager::ChatManager;
pub use registry::ConnectionRegistry;
pub use repositories::{MembershipStore, MessageStore};
pub use session::SessionCoordinator;
pub use types::{ChatError, ChatResult};
