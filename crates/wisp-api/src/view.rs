use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;

use wisp_types::api::{RespondRequest, ViewMessageResponse};

use crate::auth::AppState;
use crate::error::{ApiError, join_error};
use crate::lifecycle;

/// The one-time view. No bearer auth here: the token in the path is the
/// whole credential.
pub async fn view_message(
    State(state): State<AppState>,
    Path(vtoken): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let viewed = tokio::task::spawn_blocking(move || {
        lifecycle::view_message(&db.db, &db.kdf_salt, &vtoken, Utc::now())
    })
    .await
    .map_err(join_error)??;

    Ok(Json(ViewMessageResponse {
        content: viewed.content,
        expires_at: viewed.expires_at,
        created_at: viewed.created_at,
    }))
}

pub async fn respond(
    State(state): State<AppState>,
    Path(vtoken): Path<String>,
    Json(req): Json<RespondRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    tokio::task::spawn_blocking(move || {
        lifecycle::respond_to_message(&db.db, &vtoken, &req.response, Utc::now())
    })
    .await
    .map_err(join_error)??;

    Ok(Json(serde_json::json!({ "responded": true })))
}
