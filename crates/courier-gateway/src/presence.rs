use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use courier_types::events::GatewayEvent;

/// In-memory registry of which live connection belongs to which user.
///
/// At most one connection per user: a fresh registration for the same user
/// silently supersedes the old entry. A connection id maps to at most one
/// user because registration overwrites by user and unregistration removes
/// by connection. One lock over the whole map; the registry is small and
/// mutations are rare (connect/disconnect only).
#[derive(Clone)]
pub struct Presence {
    inner: Arc<PresenceInner>,
}

struct PresenceInner {
    entries: RwLock<HashMap<String, Entry>>,
}

struct Entry {
    conn_id: Uuid,
    tx: mpsc::UnboundedSender<GatewayEvent>,
}

impl Presence {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PresenceInner {
                entries: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Bind a user to a connection. Last registration wins.
    pub async fn register(
        &self,
        user_id: &str,
        conn_id: Uuid,
        tx: mpsc::UnboundedSender<GatewayEvent>,
    ) {
        self.inner
            .entries
            .write()
            .await
            .insert(user_id.to_string(), Entry { conn_id, tx });
    }

    /// Connection currently bound to a user, if any.
    pub async fn lookup(&self, user_id: &str) -> Option<Uuid> {
        self.inner
            .entries
            .read()
            .await
            .get(user_id)
            .map(|e| e.conn_id)
    }

    /// Drop whichever entry points at this connection. No-op when the
    /// connection was never registered or was already superseded by a newer
    /// registration for the same user.
    pub async fn unregister(&self, conn_id: Uuid) {
        let mut entries = self.inner.entries.write().await;
        entries.retain(|_, e| e.conn_id != conn_id);
    }

    /// Push an event to the user's live connection. Returns whether a
    /// connection was there to take it; false means the user is offline,
    /// which is not an error.
    pub async fn send_to_user(&self, user_id: &str, event: GatewayEvent) -> bool {
        let entries = self.inner.entries.read().await;
        match entries.get(user_id) {
            Some(e) => e.tx.send(event).is_ok(),
            None => false,
        }
    }

    pub async fn online_count(&self) -> usize {
        self.inner.entries.read().await.len()
    }
}

impl Default for Presence {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (
        mpsc::UnboundedSender<GatewayEvent>,
        mpsc::UnboundedReceiver<GatewayEvent>,
    ) {
        mpsc::unbounded_channel()
    }

    #[tokio::test]
    async fn register_then_lookup_returns_connection() {
        let presence = Presence::new();
        let conn = Uuid::new_v4();
        let (tx, _rx) = channel();

        presence.register("u1", conn, tx).await;
        assert_eq!(presence.lookup("u1").await, Some(conn));
        assert_eq!(presence.online_count().await, 1);
    }

    #[tokio::test]
    async fn newer_registration_wins() {
        let presence = Presence::new();
        let old_conn = Uuid::new_v4();
        let new_conn = Uuid::new_v4();
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();

        presence.register("u1", old_conn, tx1).await;
        presence.register("u1", new_conn, tx2).await;
        assert_eq!(presence.lookup("u1").await, Some(new_conn));

        // The superseded connection's disconnect must not evict the new one
        presence.unregister(old_conn).await;
        assert_eq!(presence.lookup("u1").await, Some(new_conn));
    }

    #[tokio::test]
    async fn unregister_removes_the_owning_entry() {
        let presence = Presence::new();
        let conn = Uuid::new_v4();
        let (tx, _rx) = channel();

        presence.register("u1", conn, tx).await;
        presence.unregister(conn).await;
        assert_eq!(presence.lookup("u1").await, None);
    }

    #[tokio::test]
    async fn unregister_unknown_connection_is_a_noop() {
        let presence = Presence::new();
        let conn = Uuid::new_v4();
        let (tx, _rx) = channel();

        presence.register("u1", conn, tx).await;
        presence.unregister(Uuid::new_v4()).await;
        assert_eq!(presence.lookup("u1").await, Some(conn));
    }

    #[tokio::test]
    async fn send_to_online_user_lands_on_their_channel() {
        let presence = Presence::new();
        let conn = Uuid::new_v4();
        let (tx, mut rx) = channel();
        presence.register("u1", conn, tx).await;

        let delivered = presence
            .send_to_user(
                "u1",
                GatewayEvent::Reply {
                    message_id: 42,
                    reply: "pong".into(),
                    replied_at: "2025-01-01 00:00:00".into(),
                },
            )
            .await;

        assert!(delivered);
        match rx.recv().await {
            Some(GatewayEvent::Reply { message_id, .. }) => assert_eq!(message_id, 42),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn send_to_offline_user_reports_not_delivered() {
        let presence = Presence::new();
        let delivered = presence
            .send_to_user(
                "ghost",
                GatewayEvent::Reply {
                    message_id: 1,
                    reply: "hi".into(),
                    replied_at: "2025-01-01 00:00:00".into(),
                },
            )
            .await;
        assert!(!delivered);
    }
}
