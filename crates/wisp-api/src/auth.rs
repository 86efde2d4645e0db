use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::HeaderMap, http::StatusCode, response::IntoResponse};
use uuid::Uuid;

use wisp_db::Database;
use wisp_types::api::{
    ExtendResponse, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
};

use crate::error::ApiError;
use crate::middleware::bearer_token;
use crate::session;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    /// Application-wide Argon2 salt for token-derived content keys.
    pub kdf_salt: Vec<u8>,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate input
    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(ApiError::Validation("username must be 3..=32 characters"));
    }
    if req.password.len() < 8 {
        return Err(ApiError::Validation("password must be at least 8 characters"));
    }

    // Check if username is taken
    if state.db.get_user_by_username(&req.username)?.is_some() {
        return Err(ApiError::Validation("username is taken"));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hash failed: {}", e)))?
        .to_string();

    let user_id = Uuid::new_v4();

    state
        .db
        .create_user(&user_id.to_string(), &req.username, &password_hash)?;

    let token = session::issue(user_id, &req.username, &state.jwt_secret)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { user_id, token }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .get_user_by_username(&req.username)?
        .ok_or(ApiError::Auth)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("stored hash unreadable: {}", e)))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Auth)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt user id: {}", e)))?;

    let token = session::issue(user_id, &user.username, &state.jwt_secret)?;

    Ok(Json(LoginResponse {
        user_id,
        username: user.username,
        token,
    }))
}

/// Slide the session window. A null token in the response means the session
/// is past its age ceiling and the client must log in again.
pub async fn extend(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = bearer_token(&headers)?;
    let token = session::extend(token, &state.jwt_secret)?;

    Ok(Json(ExtendResponse { token }))
}
