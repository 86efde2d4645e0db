use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- JWT Claims --

/// Session claims shared between wisp-api (sign/verify/extend) and the auth
/// middleware. Canonical definition lives here in wisp-types to eliminate
/// duplication.
///
/// `iat` is fixed at first issuance and preserved verbatim across extends;
/// `exp` slides forward on every extend. Total session age is bounded by the
/// extend limit regardless of how often the token is renewed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub iat: usize,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

/// `token` is None when the session is past its extend limit and the caller
/// must re-authenticate.
#[derive(Debug, Serialize)]
pub struct ExtendResponse {
    pub token: Option<String>,
}

// -- Messages (creator side) --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMessageRequest {
    /// Emoji / GIF-id sequence, 1..=100 elements.
    pub content: Vec<String>,
    /// Hours until expiry, clamped to 1..=168. Defaults to 7 days.
    #[serde(default)]
    pub expires_in_hours: Option<u32>,
    /// Secret messages are sealed under a token-derived key; the share token
    /// is the only thing that can ever decrypt them.
    #[serde(default)]
    pub secret: bool,
}

#[derive(Debug, Serialize)]
pub struct CreateMessageResponse {
    pub id: Uuid,
    pub share_token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MessageSummary {
    pub id: Uuid,
    /// None for secret messages: the server only holds a digest, never a
    /// token that could be shared again.
    pub share_token: Option<String>,
    pub secret: bool,
    pub viewed_at: Option<DateTime<Utc>>,
    pub response: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MessageDetail {
    pub id: Uuid,
    /// None for secret messages: content is recoverable only with the share
    /// token the creator received at creation time.
    pub content: Option<Vec<String>>,
    pub share_token: Option<String>,
    pub secret: bool,
    pub viewed_at: Option<DateTime<Utc>>,
    pub response: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateMessageRequest {
    #[serde(default)]
    pub content: Option<Vec<String>>,
    #[serde(default)]
    pub expires_in_hours: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct UpdateMessageResponse {
    pub id: Uuid,
    /// Some when the content of a secret message was replaced: the old share
    /// link is dead and this is the fresh one.
    pub share_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

// -- Viewing (recipient side) --

#[derive(Debug, Serialize)]
pub struct ViewMessageResponse {
    pub content: Vec<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RespondRequest {
    pub response: String,
}
