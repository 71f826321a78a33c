use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

const REPLIES_API_URL: &str = "https://slack.com/api/conversations.replies";

/// Thin client for the one Slack Web API call courier makes:
/// fetching the root message of a thread during reply correlation.
#[derive(Clone)]
pub struct SlackClient {
    http: reqwest::Client,
    bot_token: String,
    channel: String,
}

#[derive(Debug, Deserialize)]
struct RepliesResponse {
    ok: bool,
    error: Option<String>,
    #[serde(default)]
    messages: Vec<ThreadMessage>,
}

#[derive(Debug, Deserialize)]
struct ThreadMessage {
    #[serde(default)]
    text: String,
}

impl SlackClient {
    pub fn new(bot_token: String, channel: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            bot_token,
            channel,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Text of the thread's root message, or None if the thread has no
    /// messages. Network and API errors surface as Err; the caller drops
    /// the event either way, no retry.
    pub async fn thread_root_text(&self, thread_ts: &str) -> Result<Option<String>> {
        let resp = self
            .http
            .get(REPLIES_API_URL)
            .bearer_auth(&self.bot_token)
            .query(&[
                ("channel", self.channel.as_str()),
                ("ts", thread_ts),
                ("limit", "1"),
            ])
            .send()
            .await
            .context("conversations.replies request failed")?;

        let body: RepliesResponse = resp
            .json()
            .await
            .context("conversations.replies returned non-JSON body")?;

        if !body.ok {
            let reason = body.error.unwrap_or_else(|| "unknown".into());
            warn!("conversations.replies not ok: {}", reason);
            anyhow::bail!("slack api error: {}", reason);
        }

        Ok(body.messages.into_iter().next().map(|m| m.text))
    }
}
