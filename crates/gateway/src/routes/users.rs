use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use courier_database::User;
use serde::{Deserialize, Serialize};

use crate::util::require_bearer;
use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub password: String,
}

/// Public projection of an account; the password hash stays server-side.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    pub created_at: i64,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            created_at: user.created_at,
        }
    }
}

/// Registration is the one unauthenticated write.
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    if request.name.trim().is_empty() {
        return Err(ApiError::bad_request("user name must not be empty"));
    }

    let user = state
        .authenticator()
        .register_with_password(&request.name, &request.password)
        .await?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn get_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
) -> Result<Json<UserResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    state.authenticate(&token)?;

    let user = state.users().find_by_id(user_id).await?;
    Ok(Json(user.into()))
}
