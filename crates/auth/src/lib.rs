//! Password verification and stateless bearer tokens.
//!
//! Tokens are signed JWTs rather than database sessions, so authenticating a
//! request never touches the pool; logout is therefore client-side only and
//! tokens stay valid until they expire.

use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use chrono::{Duration, Utc};
use courier_config::AuthConfig;
use courier_database::{User, UserError, UserRepository};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;

#[derive(Clone)]
pub struct Authenticator {
    users: UserRepository,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl: Duration,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user already exists")]
    UserExists,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("token expired")]
    TokenExpired,
    #[error("invalid token")]
    InvalidToken,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("password hashing failed: {0}")]
    PasswordHash(#[from] argon2::password_hash::Error),
}

impl From<UserError> for AuthError {
    fn from(error: UserError) -> Self {
        match error {
            UserError::NameTaken(_) => AuthError::UserExists,
            // A login for a user the token claims to name but the store lost.
            UserError::NotFound { .. } => AuthError::InvalidCredentials,
            UserError::Database(e) => AuthError::Database(e),
        }
    }
}

/// What a token asserts: who, and until when.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub access_token: String,
    pub user_id: i64,
}

impl Authenticator {
    pub fn new(pool: SqlitePool, config: &AuthConfig) -> Self {
        Self {
            users: UserRepository::new(pool),
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            token_ttl: Duration::seconds(config.token_ttl_seconds as i64),
        }
    }

    pub async fn register_with_password(
        &self,
        name: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let password_hash = self.hash_password(password)?;
        let user = self
            .users
            .create(name, &password_hash, Utc::now().timestamp())
            .await?;
        Ok(user)
    }

    pub async fn login_with_password(
        &self,
        name: &str,
        password: &str,
    ) -> Result<AuthSession, AuthError> {
        let Some(user) = self.users.find_by_name(name).await? else {
            return Err(AuthError::InvalidCredentials);
        };

        let stored_hash = PasswordHash::new(&user.password_hash)?;
        Argon2::default()
            .verify_password(password.as_bytes(), &stored_hash)
            .map_err(|_| AuthError::InvalidCredentials)?;

        let access_token = self.issue_token(user.id)?;
        info!(user_id = user.id, "user logged in");

        Ok(AuthSession {
            access_token,
            user_id: user.id,
        })
    }

    /// Mint a signed token for an already-verified user id.
    pub fn issue_token(&self, user_id: i64) -> Result<String, AuthError> {
        let claims = Claims {
            sub: user_id,
            exp: (Utc::now() + self.token_ttl).timestamp(),
        };

        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|_| AuthError::InvalidToken)
    }

    /// Verify a token's signature and expiry and return the user id it names.
    pub fn authenticate_token(&self, token: &str) -> Result<i64, AuthError> {
        let data =
            jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &Validation::default())
                .map_err(|error| match error.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    _ => AuthError::InvalidToken,
                })?;

        Ok(data.claims.sub)
    }

    fn hash_password(&self, password: &str) -> Result<String, argon2::password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
        Ok(hash.to_string())
    }
}
