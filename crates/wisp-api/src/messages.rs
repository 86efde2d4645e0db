use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use wisp_db::models::{MessageRow, parse_ts};
use wisp_types::api::{
    Claims, CreateMessageRequest, CreateMessageResponse, MessageDetail, MessageSummary,
    UpdateMessageRequest, UpdateMessageResponse,
};

use crate::auth::AppState;
use crate::error::{ApiError, join_error};
use crate::lifecycle::{self, MessageUpdate, NewMessage};

pub async fn create_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let msg = NewMessage {
        creator_id: claims.sub,
        content: req.content,
        expires_in_hours: req.expires_in_hours,
        secret: req.secret,
    };

    // Run blocking DB work off the async runtime
    let db = state.clone();
    let created = tokio::task::spawn_blocking(move || {
        lifecycle::create_message(&db.db, &db.kdf_salt, &msg, Utc::now())
    })
    .await
    .map_err(join_error)??;

    Ok((
        StatusCode::CREATED,
        Json(CreateMessageResponse {
            id: created.id,
            share_token: created.share_token,
            expires_at: created.expires_at,
            created_at: created.created_at,
        }),
    ))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let creator = claims.sub.to_string();
    let rows = tokio::task::spawn_blocking(move || db.db.list_by_creator(&creator))
        .await
        .map_err(join_error)??;

    let messages: Vec<MessageSummary> = rows.into_iter().map(summary).collect();
    Ok(Json(messages))
}

/// Creator-only detail view. Never decrypts: secret content is recoverable
/// only with the share token.
pub async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let row = tokio::task::spawn_blocking(move || db.db.get_message(&id.to_string()))
        .await
        .map_err(join_error)??
        .ok_or(ApiError::NotFound)?;

    if row.creator_id != claims.sub.to_string() {
        return Err(ApiError::NotFound);
    }

    let content = if row.secret {
        None
    } else {
        serde_json::from_str(&row.content)
            .map_err(|e| warn!("Corrupt content on message '{}': {}", row.id, e))
            .ok()
    };

    Ok(Json(MessageDetail {
        id: parse_id(&row.id),
        content,
        share_token: (!row.secret).then(|| row.view_token.clone()),
        secret: row.secret,
        viewed_at: row.viewed_at.as_deref().map(parse_ts),
        response: row.response,
        expires_at: parse_ts(&row.expires_at),
        created_at: parse_ts(&row.created_at),
    }))
}

pub async fn update_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let update = MessageUpdate {
        content: req.content,
        expires_in_hours: req.expires_in_hours,
    };

    let db = state.clone();
    let updated = tokio::task::spawn_blocking(move || {
        lifecycle::update_message(&db.db, &db.kdf_salt, claims.sub, id, &update, Utc::now())
    })
    .await
    .map_err(join_error)??;

    Ok(Json(UpdateMessageResponse {
        id: updated.id,
        share_token: updated.share_token,
        expires_at: updated.expires_at,
    }))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    tokio::task::spawn_blocking(move || lifecycle::delete_message(&db.db, claims.sub, id))
        .await
        .map_err(join_error)??;

    Ok(Json(serde_json::json!({ "deleted": true })))
}

fn summary(row: MessageRow) -> MessageSummary {
    MessageSummary {
        id: parse_id(&row.id),
        // Secret messages only have a digest on file, nothing shareable.
        share_token: (!row.secret).then(|| row.view_token.clone()),
        secret: row.secret,
        viewed_at: row.viewed_at.as_deref().map(parse_ts),
        response: row.response,
        expires_at: parse_ts(&row.expires_at),
        created_at: parse_ts(&row.created_at),
    }
}

fn parse_id(id: &str) -> Uuid {
    id.parse().unwrap_or_else(|e| {
        warn!("Corrupt message id '{}': {}", id, e);
        Uuid::default()
    })
}
