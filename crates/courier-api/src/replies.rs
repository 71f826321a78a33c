use axum::{
    Json,
    extract::State,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{error, info};

use courier_types::api::{ReplyWebhookRequest, StatusResponse};

use crate::{AppState, deliver};

/// Direct reply path: an external caller already knows the message id, so
/// no correlation is needed — persist and attempt delivery.
///
/// Any malformed payload (bad JSON, missing or mistyped fields) answers
/// 400, so the extractor rejection is handled here instead of letting it
/// pick the status.
pub async fn webhook_reply(
    State(state): State<AppState>,
    payload: Result<Json<ReplyWebhookRequest>, JsonRejection>,
) -> Result<impl IntoResponse, StatusCode> {
    let Json(req) = payload.map_err(|_| StatusCode::BAD_REQUEST)?;
    if req.reply.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let reply_at = courier_db::current_timestamp();

    // Run blocking DB insert off the async runtime
    let db = state.db.clone();
    let message_id = req.message_id;
    let content = req.reply.clone();
    let at = reply_at.clone();
    tokio::task::spawn_blocking(move || db.insert_reply(message_id, &content, &at))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("reply insert failed for message {}: {:#}", message_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    // Best-effort push; offline is fine, the row is already durable.
    match deliver::dispatch_reply(state.db.clone(), &state.presence, message_id, req.reply, reply_at)
        .await
    {
        Ok(outcome) => info!("webhook reply for message {}: {:?}", message_id, outcome),
        Err(e) => error!("webhook reply delivery failed for message {}: {:#}", message_id, e),
    }

    Ok(Json(StatusResponse::ok()))
}
