use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

/// API-level error taxonomy.
///
/// Missing, expired and already-viewed messages all surface as `NotFound`,
/// and signature/tag failures all surface as `Auth`; neither ever says
/// which underlying check failed.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("message not found")]
    NotFound,
    #[error("authentication failed")]
    Auth,
    #[error("view token allocation exhausted")]
    AllocationExhausted,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, *msg),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "message not found"),
            ApiError::Auth => (StatusCode::UNAUTHORIZED, "authentication failed"),
            ApiError::AllocationExhausted => {
                error!("view token allocation exhausted");
                (StatusCode::INTERNAL_SERVER_ERROR, "server error")
            }
            ApiError::Internal(e) => {
                error!("internal error: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "server error")
            }
        };

        (
            status,
            Json(serde_json::json!({ "success": false, "error": message })),
        )
            .into_response()
    }
}

pub(crate) fn join_error(e: tokio::task::JoinError) -> ApiError {
    ApiError::Internal(anyhow::anyhow!("spawn_blocking join error: {}", e))
}
