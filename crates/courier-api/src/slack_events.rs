use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde_json::json;
use tracing::{info, warn};

use courier_slack::events::{ChannelEvent, EventEnvelope};
use courier_slack::parse::parse_thread_root;
use courier_slack::signature;
use courier_types::api::StatusResponse;

use crate::{AppStateInner, AppState, deliver};

/// Why a thread event produced no reply. Every variant is terminal for the
/// event; Slack is answered 200 so it does not re-deliver.
#[derive(Debug, thiserror::Error)]
pub enum CorrelationError {
    #[error("parent message not found")]
    ThreadNotFound,
    #[error("message reference unresolved")]
    UnresolvedReference,
    #[error("collaborator failure")]
    Collaborator(#[from] anyhow::Error),
}

const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
const SIGNATURE_HEADER: &str = "x-slack-signature";

/// Signed event webhook. The signature gate runs over the raw body bytes
/// before any JSON parsing; a failed gate is the only non-2xx answer this
/// endpoint gives for well-formed traffic.
pub async fn slack_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let timestamp = headers
        .get(TIMESTAMP_HEADER)
        .and_then(|v| v.to_str().ok());
    let sig = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let now = chrono::Utc::now().timestamp();

    if !signature::verify(&state.signing_secret, timestamp, sig, &body, now) {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"error": "invalid signature"})),
        )
            .into_response();
    }

    let envelope: EventEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("unparseable event payload: {}", e);
            return (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid payload"})))
                .into_response();
        }
    };

    match envelope.kind.as_str() {
        // One-time handshake: echo the challenge token verbatim.
        "url_verification" => {
            Json(json!({"challenge": envelope.challenge})).into_response()
        }

        "event_callback" => {
            let Some(event) = envelope.event else {
                return Json(StatusResponse::ignored()).into_response();
            };
            if !event.is_threaded_reply(state.slack.channel()) {
                return Json(StatusResponse::ok()).into_response();
            }

            match correlate_and_deliver(&state, &event).await {
                Ok(()) => Json(StatusResponse::ok()).into_response(),
                Err(e) => {
                    warn!("thread event dropped: {:#}", e);
                    Json(json!({"status": "error", "reason": e.to_string()})).into_response()
                }
            }
        }

        other => {
            info!("ignoring event envelope type {}", other);
            Json(StatusResponse::ignored()).into_response()
        }
    }
}

/// External-thread path of the reply correlator.
///
/// Resolves the thread to its root text, scrapes identity + original
/// content out of it, finds the newest matching stored message, persists
/// the reply, then hands it to the delivery dispatcher. Every failure drops
/// the event; nothing here retries.
async fn correlate_and_deliver(
    state: &AppStateInner,
    event: &ChannelEvent,
) -> Result<(), CorrelationError> {
    let Some(thread_ts) = event.thread_ts.as_deref() else {
        return Err(CorrelationError::ThreadNotFound);
    };

    let root_text = state
        .slack
        .thread_root_text(thread_ts)
        .await?
        .ok_or(CorrelationError::ThreadNotFound)?;

    apply_thread_reply(state, &root_text, &event.text).await
}

/// Everything after the thread lookup: parse the root text, resolve the
/// stored message, persist the reply, dispatch.
async fn apply_thread_reply(
    state: &AppStateInner,
    root_text: &str,
    reply_text: &str,
) -> Result<(), CorrelationError> {
    let parsed = parse_thread_root(root_text);

    // A missing identity marker matches no rows, same as an unknown user.
    let message_id = match parsed.tg_id {
        Some(tg_id) => {
            let db = state.db.clone();
            let content = parsed.core_text.clone();
            tokio::task::spawn_blocking(move || db.latest_message_id(&content, &tg_id))
                .await
                .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))??
        }
        None => None,
    };

    let Some(message_id) = message_id else {
        return Err(CorrelationError::UnresolvedReference);
    };

    let reply_at = courier_db::current_timestamp();
    {
        let db = state.db.clone();
        let content = reply_text.to_string();
        let at = reply_at.clone();
        tokio::task::spawn_blocking(move || db.insert_reply(message_id, &content, &at))
            .await
            .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))??;
    }

    let outcome = deliver::dispatch_reply(
        state.db.clone(),
        &state.presence,
        message_id,
        reply_text.to_string(),
        reply_at,
    )
    .await?;

    if outcome == deliver::Outcome::UnknownMessage {
        // Resolved a moment ago, gone now — report it like any other miss.
        return Err(CorrelationError::UnresolvedReference);
    }

    info!("thread reply correlated to message {}: {:?}", message_id, outcome);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_db::Database;
    use courier_gateway::presence::Presence;
    use courier_slack::client::SlackClient;
    use courier_types::events::GatewayEvent;
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    fn state() -> AppStateInner {
        AppStateInner {
            db: Arc::new(Database::open_in_memory().unwrap()),
            presence: Presence::new(),
            slack: SlackClient::new("xoxb-test".into(), "C1".into()),
            signing_secret: "secret".into(),
        }
    }

    #[tokio::test]
    async fn thread_reply_reaches_the_online_sender() {
        let state = state();
        state
            .db
            .insert_message("u1", "ping", "2025-01-01 00:00:00")
            .unwrap();
        let mid = state
            .db
            .insert_message("u1", "ping", "2025-01-01 00:05:00")
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        state.presence.register("u1", Uuid::new_v4(), tx).await;

        apply_thread_reply(&state, "New request (TGID [u1]) [ping]", "pong")
            .await
            .unwrap();

        // MAX-id tie-break: the duplicate resolves to the newer message
        match rx.recv().await {
            Some(GatewayEvent::Reply { message_id, reply, .. }) => {
                assert_eq!(message_id, mid);
                assert_eq!(reply, "pong");
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let replies = state.db.replies_for_messages(&[mid]).unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].reply_content, "pong");
    }

    #[tokio::test]
    async fn offline_sender_still_gets_a_stored_reply() {
        let state = state();
        let mid = state
            .db
            .insert_message("u1", "ping", "2025-01-01 00:00:00")
            .unwrap();

        apply_thread_reply(&state, "(TGID [u1]) [ping]", "pong")
            .await
            .unwrap();

        let replies = state.db.replies_for_messages(&[mid]).unwrap();
        assert_eq!(replies.len(), 1);
    }

    #[tokio::test]
    async fn unmatched_content_drops_the_event_without_a_row() {
        let state = state();
        let mid = state
            .db
            .insert_message("u1", "ping", "2025-01-01 00:00:00")
            .unwrap();

        let err = apply_thread_reply(&state, "(TGID [u1]) [different text]", "pong")
            .await
            .unwrap_err();

        assert!(matches!(err, CorrelationError::UnresolvedReference));
        assert!(state.db.replies_for_messages(&[mid]).unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_identity_marker_is_an_unresolved_reference() {
        let state = state();
        state
            .db
            .insert_message("u1", "ping", "2025-01-01 00:00:00")
            .unwrap();

        let err = apply_thread_reply(&state, "Hello [ping]", "pong")
            .await
            .unwrap_err();

        assert!(matches!(err, CorrelationError::UnresolvedReference));
    }
}
