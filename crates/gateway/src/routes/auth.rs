use axum::extract::State;
use axum::http::HeaderMap;
use axum::{Form, Json};
use serde::{Deserialize, Serialize};

use crate::util::require_bearer;
use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

pub async fn login(
    State(state): State<AppState>,
    Form(request): Form<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let session = state
        .authenticator()
        .login_with_password(&request.username, &request.password)
        .await?;

    Ok(Json(TokenResponse {
        access_token: session.access_token,
        token_type: "bearer",
    }))
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub detail: &'static str,
}

/// Tokens are stateless, so logout only confirms the token was valid; the
/// client discards it and it lapses at expiry.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<LogoutResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    state.authenticate(&token)?;

    Ok(Json(LogoutResponse {
        detail: "logged out",
    }))
}
