//! Inbound chat events as the handlers see them.

use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NestedMessage {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub thread_ts: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
/// A channel `message` event, including the subtypes the transcript records.
pub struct MessageEvent {
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    /// Edited or replied-to message for `message_changed` / `message_replied`.
    #[serde(default)]
    pub message: Option<NestedMessage>,
    #[serde(default)]
    pub previous_message: Option<NestedMessage>,
}

impl MessageEvent {
    pub fn mentions(&self, user_id: &str) -> bool {
        self.text
            .as_deref()
            .is_some_and(|text| text.contains(&format!("<@{user_id}>")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A button press from an interactive message.
pub struct BlockActionEvent {
    pub action_id: String,
    pub trigger_id: String,
    pub user_id: String,
    pub channel_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Message(MessageEvent),
    BlockAction(BlockActionEvent),
}
