use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use courier_chats::{ChatError, MembershipStore};
use courier_database::MessageHistory;
use serde::Deserialize;

use crate::util::require_bearer;
use crate::{ApiError, AppState};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Paginated message history, members only.
pub async fn chat_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(chat_id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<MessageHistory>, ApiError> {
    let token = require_bearer(&headers)?;
    let user_id = state.authenticate(&token)?;

    let chat = state.chats().get_chat(chat_id).await?;
    if !chat.is_member(user_id) {
        return Err(ApiError::from(ChatError::not_member(chat_id, user_id)));
    }

    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);

    let page = state.messages().history_page(chat_id, limit, offset).await?;
    Ok(Json(page))
}
