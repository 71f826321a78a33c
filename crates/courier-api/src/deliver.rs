use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use courier_db::Database;
use courier_gateway::presence::Presence;
use courier_types::events::GatewayEvent;

/// What happened to a delivery attempt. Only one push is ever attempted;
/// `Offline` is an expected outcome, not a failure — the reply stays in the
/// store and surfaces through the history endpoint when the user returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Delivered,
    Offline,
    /// The reply references a message this store has never seen.
    UnknownMessage,
}

/// Push a stored reply to the owning user's live connection, if any.
pub async fn dispatch_reply(
    db: Arc<Database>,
    presence: &Presence,
    message_id: i64,
    reply: String,
    replied_at: String,
) -> Result<Outcome> {
    let owner = tokio::task::spawn_blocking(move || db.message_owner(message_id))
        .await
        .context("spawn_blocking join error")??;

    let Some(user_id) = owner else {
        return Ok(Outcome::UnknownMessage);
    };

    let delivered = presence
        .send_to_user(
            &user_id,
            GatewayEvent::Reply {
                message_id,
                reply,
                replied_at,
            },
        )
        .await;

    if delivered {
        debug!("reply to message {} pushed to {}", message_id, user_id);
        Ok(Outcome::Delivered)
    } else {
        debug!("reply to message {}: {} offline, kept for history", message_id, user_id);
        Ok(Outcome::Offline)
    }
}
