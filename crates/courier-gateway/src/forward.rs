use anyhow::{Context, Result};
use tracing::warn;

use courier_types::api::ForwardPayload;

/// Forwards persisted messages to the fixed outbound webhook. At most one
/// attempt per message; a failure is reported to the sender but the message
/// row is already durable and is not rolled back.
#[derive(Clone)]
pub struct Forwarder {
    http: reqwest::Client,
    url: String,
}

impl Forwarder {
    pub fn new(url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
        }
    }

    pub async fn post(&self, payload: &ForwardPayload) -> Result<()> {
        let resp = self
            .http
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .context("webhook forward failed")?;

        if let Err(e) = resp.error_for_status_ref() {
            warn!("webhook forward rejected message {}: {}", payload.message_id, e);
            return Err(e).context("webhook forward rejected");
        }

        Ok(())
    }
}
