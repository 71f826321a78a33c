use serde::Deserialize;

/// Top-level payload posted to the events webhook.
#[derive(Debug, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub challenge: Option<String>,
    pub event: Option<ChannelEvent>,
}

/// Inner event for `event_callback` envelopes. Only the fields the
/// correlator inspects are kept.
#[derive(Debug, Deserialize)]
pub struct ChannelEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub subtype: Option<String>,
    pub channel: Option<String>,
    #[serde(default)]
    pub text: String,
    pub ts: Option<String>,
    pub thread_ts: Option<String>,
}

impl ChannelEvent {
    /// True for a plain message posted *inside* a thread in the target
    /// channel. Thread roots (ts == thread_ts), edits/joins (subtype set)
    /// and other channels are all ignored.
    pub fn is_threaded_reply(&self, target_channel: &str) -> bool {
        self.kind == "message"
            && self.subtype.is_none()
            && self.channel.as_deref() == Some(target_channel)
            && match (&self.ts, &self.thread_ts) {
                (Some(ts), Some(thread_ts)) => ts != thread_ts,
                _ => false,
            }
    }
}
