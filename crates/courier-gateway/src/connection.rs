use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use courier_types::api::ForwardPayload;
use courier_types::events::{GatewayCommand, GatewayEvent};

use crate::GatewayState;

/// Heartbeat interval: server sends a Ping every 10 seconds.
/// A connection that misses 2 consecutive Pongs is dropped, 20-30s after
/// it last answered.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// First part of a raw frame for log context, cut on a char boundary.
fn log_snippet(text: &str) -> &str {
    let mut end = text.len().min(200);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Handle a single WebSocket connection from connect to disconnect.
///
/// The connection gets a transient id and an outbound event channel. All
/// server-to-client traffic (acks, reply pushes) funnels through that
/// channel, so events reach the socket in the order they were produced.
/// Presence is only established once the client sends a register command.
pub async fn handle_connection(socket: WebSocket, state: GatewayState) {
    let conn_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<GatewayEvent>();

    info!("connection {} opened", conn_id);

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward queued events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = rx.recv() => {
                    let event = match result {
                        Some(event) => event,
                        None => break,
                    };
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            error!("event serialization failed: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from the client. Commands are awaited inline so one
    // connection's register/message sequence is processed in submission
    // order.
    let recv_state = state.clone();
    let recv_tx = tx.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(&recv_state, conn_id, &recv_tx, cmd).await;
                    }
                    Err(e) => {
                        warn!(
                            "connection {} bad command: {} -- raw: {}",
                            conn_id,
                            e,
                            log_snippet(&text)
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.presence.unregister(conn_id).await;
    info!(
        "connection {} closed ({} online)",
        conn_id,
        state.presence.online_count().await
    );
}

async fn handle_command(
    state: &GatewayState,
    conn_id: Uuid,
    tx: &mpsc::UnboundedSender<GatewayEvent>,
    cmd: GatewayCommand,
) {
    match cmd {
        GatewayCommand::Register { user_id } => {
            if user_id.is_empty() {
                return;
            }
            state.presence.register(&user_id, conn_id, tx.clone()).await;
            info!(
                "connection {} registered as {} ({} online)",
                conn_id,
                user_id,
                state.presence.online_count().await
            );
        }

        GatewayCommand::Message {
            user_id,
            content,
            destination,
        } => {
            // Fire-and-forget policy: a message without a sender gets no
            // row and no ack.
            if user_id.is_empty() {
                return;
            }
            relay_message(state, tx, user_id, content, destination).await;
        }
    }
}

/// Persist an inbound message, forward it to the outbound webhook, and ack
/// the sender. The row is durable even when the forward fails; only the ack
/// reports the failure.
async fn relay_message(
    state: &GatewayState,
    tx: &mpsc::UnboundedSender<GatewayEvent>,
    user_id: String,
    content: String,
    destination: Option<String>,
) {
    let created_at = courier_db::current_timestamp();

    // Run blocking DB insert off the async runtime
    let db = state.db.clone();
    let uid = user_id.clone();
    let body = content.clone();
    let ts = created_at.clone();
    let inserted =
        tokio::task::spawn_blocking(move || db.insert_message(&uid, &body, &ts)).await;

    let message_id = match inserted {
        Ok(Ok(id)) => id,
        Ok(Err(e)) => {
            error!("message insert failed for {}: {:#}", user_id, e);
            let _ = tx.send(GatewayEvent::ack_err("message not stored".into()));
            return;
        }
        Err(e) => {
            error!("spawn_blocking join error: {}", e);
            let _ = tx.send(GatewayEvent::ack_err("message not stored".into()));
            return;
        }
    };

    let payload = ForwardPayload {
        message_id,
        user_id,
        content: content.clone(),
        destination,
    };

    let event = match state.forwarder.post(&payload).await {
        Ok(()) => GatewayEvent::ack_ok(content, created_at),
        Err(e) => {
            error!("forward failed for message {}: {:#}", message_id, e);
            GatewayEvent::ack_err("forward failed".into())
        }
    };
    let _ = tx.send(event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forward::Forwarder;
    use crate::presence::Presence;
    use courier_db::Database;
    use std::sync::Arc;

    fn state() -> GatewayState {
        GatewayState {
            presence: Presence::new(),
            db: Arc::new(Database::open_in_memory().unwrap()),
            // Nothing listens here; every forward attempt fails fast.
            forwarder: Forwarder::new("http://127.0.0.1:1/hook".into()),
        }
    }

    #[test]
    fn log_snippet_cuts_on_char_boundaries() {
        let frame = "€".repeat(100); // 300 bytes, boundary at 200 splits a char
        let snippet = log_snippet(&frame);
        assert!(snippet.len() <= 200);
        assert!(frame.starts_with(snippet));

        assert_eq!(log_snippet("short"), "short");
    }

    #[tokio::test]
    async fn failed_forward_keeps_the_row_and_acks_failure() {
        let state = state();
        let (tx, mut rx) = mpsc::unbounded_channel();

        relay_message(&state, &tx, "u1".into(), "ping".into(), None).await;

        // The message is durable even though the forward never arrived
        let page = state.db.messages_for_user("u1", 10, 0).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].content, "ping");

        match rx.recv().await {
            Some(GatewayEvent::Ack { success, error, .. }) => {
                assert!(!success);
                assert!(error.is_some());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn message_without_sender_is_dropped_silently() {
        let state = state();
        let (tx, mut rx) = mpsc::unbounded_channel();

        handle_command(
            &state,
            Uuid::new_v4(),
            &tx,
            GatewayCommand::Message {
                user_id: String::new(),
                content: "ping".into(),
                destination: None,
            },
        )
        .await;

        // No row, no ack
        assert!(state.db.messages_for_user("", 10, 0).unwrap().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn register_command_binds_presence() {
        let state = state();
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn_id = Uuid::new_v4();

        handle_command(
            &state,
            conn_id,
            &tx,
            GatewayCommand::Register {
                user_id: "u1".into(),
            },
        )
        .await;

        assert_eq!(state.presence.lookup("u1").await, Some(conn_id));
    }
}
