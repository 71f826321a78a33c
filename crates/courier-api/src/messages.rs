use std::collections::HashMap;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::error;

use courier_types::api::{MessageResponse, ReplyResponse};

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    20
}

/// Pull-based history: the page is fetched newest-first, then reversed so
/// clients render oldest-first, with each message carrying its replies in
/// reply-time order. This is how offline users catch up on replies that
/// missed them live.
pub async fn get_messages(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let Some(user_id) = query.user_id.filter(|id| !id.is_empty()) else {
        return Err(StatusCode::BAD_REQUEST);
    };

    // Run all blocking DB queries off the async runtime
    let db = state.db.clone();
    let limit = query.limit;
    let offset = query.offset;

    let (mut rows, reply_rows) = tokio::task::spawn_blocking(move || {
        let rows = db
            .messages_for_user(&user_id, limit, offset)
            .map_err(|e| {
                error!("message page query failed: {:#}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            })?;

        let message_ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let reply_rows = db.replies_for_messages(&message_ids).map_err(|e| {
            error!("reply batch query failed: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

        Ok::<_, StatusCode>((rows, reply_rows))
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })??;

    // Oldest-first within the fetched page
    rows.reverse();

    // Group replies by message_id; the batch query already ordered them by
    // reply time.
    let mut replies_by_message: HashMap<i64, Vec<ReplyResponse>> = HashMap::new();
    for r in reply_rows {
        replies_by_message
            .entry(r.message_id)
            .or_default()
            .push(ReplyResponse {
                id: r.id,
                message_id: r.message_id,
                reply_content: r.reply_content,
                reply_at: r.reply_at,
            });
    }

    let messages: Vec<MessageResponse> = rows
        .into_iter()
        .map(|row| MessageResponse {
            replies: replies_by_message.remove(&row.id).unwrap_or_default(),
            id: row.id,
            user_id: row.user_id,
            content: row.content,
            created_at: row.created_at,
        })
        .collect();

    Ok(Json(messages))
}
