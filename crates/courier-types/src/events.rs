use serde::{Deserialize, Serialize};

/// Commands sent by a client over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GatewayCommand {
    /// Bind this connection to a logical user. Last registration wins.
    Register { user_id: String },

    /// Relay a chat message to the external channel.
    Message {
        user_id: String,
        content: String,
        #[serde(default)]
        destination: Option<String>,
    },
}

/// Events pushed by the server over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// Synchronous acknowledgment of a `Message` command. Echoes the content
    /// and the persisted timestamp on success.
    Ack {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        request: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// A reply to one of the user's messages arrived from the channel.
    Reply {
        message_id: i64,
        reply: String,
        replied_at: String,
    },
}

impl GatewayEvent {
    pub fn ack_ok(request: String, timestamp: String) -> Self {
        Self::Ack {
            success: true,
            request: Some(request),
            timestamp: Some(timestamp),
            error: None,
        }
    }

    pub fn ack_err(error: String) -> Self {
        Self::Ack {
            success: false,
            request: None,
            timestamp: None,
            error: Some(error),
        }
    }
}
