//! Courier Gateway Crate
//!
//! The HTTP and WebSocket surface: account registration, login, chat and
//! membership management, paginated history, and the real-time chat socket.

mod error;
mod state;
mod util;

pub mod routes;

pub use error::ApiError;
pub use state::AppState;

use axum::{
    http::header::{AUTHORIZATION, CONTENT_TYPE},
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Accounts
        .route("/user", post(routes::users::create_user))
        .route("/user/:user_id", get(routes::users::get_user))
        // Auth
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/logout", post(routes::auth::logout))
        // Chats and membership
        .route("/chat", post(routes::chats::create_chat))
        .route("/chat/sync/persistent", get(routes::chats::sync_persistent))
        .route("/chat/:chat_id", get(routes::chats::get_chat))
        .route(
            "/chat/add_user/:user_id/:chat_id",
            post(routes::chats::add_user),
        )
        .route(
            "/chat/add_user/:user_id/:chat_id",
            delete(routes::chats::remove_user),
        )
        // History
        .route("/history/:chat_id", get(routes::history::chat_history))
        // WebSocket route
        .route(
            "/connect_to_chat/:chat_id/:token",
            get(routes::websocket::connect_to_chat),
        )
        .with_state(state)
        .layer(cors_layer())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
}
