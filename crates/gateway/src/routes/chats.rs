use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use courier_chats::{Chat, ChatType, MembershipStore};
use serde::{Deserialize, Serialize};

use crate::util::require_bearer;
use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateChatRequest {
    pub name: String,
    pub chat_type: ChatType,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub registered: usize,
}

pub async fn create_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateChatRequest>,
) -> Result<(StatusCode, Json<Chat>), ApiError> {
    let token = require_bearer(&headers)?;
    let user_id = state.authenticate(&token)?;

    if request.name.trim().is_empty() {
        return Err(ApiError::bad_request("chat name must not be empty"));
    }

    let chat = state
        .manager()
        .create_chat(&request.name, request.chat_type, user_id)
        .await?;

    Ok((StatusCode::CREATED, Json(chat)))
}

pub async fn get_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(chat_id): Path<i64>,
) -> Result<Json<Chat>, ApiError> {
    let token = require_bearer(&headers)?;
    state.authenticate(&token)?;

    let chat = state.chats().get_chat(chat_id).await?;
    Ok(Json(chat))
}

/// Membership management is creator-only; the acting user comes from the
/// token, never the body.
pub async fn add_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((user_id, chat_id)): Path<(i64, i64)>,
) -> Result<Json<Chat>, ApiError> {
    let token = require_bearer(&headers)?;
    let acting_user_id = state.authenticate(&token)?;

    let chat = state.chats().add_member(chat_id, user_id, acting_user_id).await?;
    Ok(Json(chat))
}

pub async fn remove_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((user_id, chat_id)): Path<(i64, i64)>,
) -> Result<Json<Chat>, ApiError> {
    let token = require_bearer(&headers)?;
    let acting_user_id = state.authenticate(&token)?;

    let chat = state
        .chats()
        .remove_member(chat_id, user_id, acting_user_id)
        .await?;
    Ok(Json(chat))
}

/// Re-register persisted chats in the live registry. Normally run once at
/// startup; exposed so an operator can force a pass without restarting.
pub async fn sync_persistent(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SyncResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    state.authenticate(&token)?;

    let registered = state
        .manager()
        .sync_persistent_and_memory_chat_storage()
        .await?;
    Ok(Json(SyncResponse { registered }))
}
