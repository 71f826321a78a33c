use serde::{Deserialize, Serialize};

// -- Direct reply webhook --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyWebhookRequest {
    pub message_id: i64,
    pub reply: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self { status: "ok" }
    }

    pub fn ignored() -> Self {
        Self { status: "ignored" }
    }
}

// -- Message history --

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: i64,
    pub user_id: String,
    pub content: String,
    pub created_at: String,
    pub replies: Vec<ReplyResponse>,
}

#[derive(Debug, Serialize)]
pub struct ReplyResponse {
    pub id: i64,
    pub message_id: i64,
    pub reply_content: String,
    pub reply_at: String,
}

// -- Membership check --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub telegram_id: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub ok: bool,
}

// -- Outbound webhook forward --

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardPayload {
    pub message_id: i64,
    pub user_id: String,
    pub content: String,
    pub destination: Option<String>,
}
