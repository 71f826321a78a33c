use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use courier_types::api::{VerifyRequest, VerifyResponse};

use crate::AppState;

/// Membership gate for new clients. The directory stores handles with their
/// `@` prefix; the client supplies the bare id.
pub async fn verify_member(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<Response, StatusCode> {
    let handle = format!("@{}", req.telegram_id);

    let db = state.db.clone();
    let found = tokio::task::spawn_blocking(move || db.member_exists(&handle))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("member lookup failed: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    if !found {
        return Ok((
            StatusCode::FORBIDDEN,
            Json(json!({"error": "Access denied: Not a member."})),
        )
            .into_response());
    }

    Ok(Json(VerifyResponse { ok: true }).into_response())
}
