use flare_commands::help_flare_channel;
use serde_json::{json, Value};

use super::flare_documents::{flare_doc_url, history_doc_url};
use crate::directory_cache::INTRO_MESSAGE_PREFIX;
use crate::interactive_lookups::{OPEN_ALERTS_ACTION_ID, RECENT_DEPLOYS_ACTION_ID};

pub struct IntroMessage<'a> {
    pub bot_user_id: &'a str,
    pub ticket_key: &'a str,
    pub ticket_url: &'a str,
    pub flare_doc_id: Option<&'a str>,
    pub history_doc_id: Option<&'a str>,
}

fn section(text: String) -> Value {
    json!({ "type": "section", "text": { "type": "mrkdwn", "text": text } })
}

fn action_button(text: &str, action_id: &str) -> Value {
    json!({
        "type": "button",
        "text": { "type": "plain_text", "text": text, "emoji": true },
        "action_id": action_id,
    })
}

fn link_button(text: &str, url: String) -> Value {
    json!({
        "type": "button",
        "text": { "type": "plain_text", "text": text, "emoji": true },
        "url": url,
    })
}

impl IntroMessage<'_> {
    /// Block Kit layout of the pinned intro message. The transcript URL must stay in
    /// the last section: that is where it is recovered from after a restart.
    pub fn blocks(&self) -> Vec<Value> {
        let mut links = Vec::new();
        if let Some(flare_doc_id) = self.flare_doc_id {
            links.push(link_button("Flare Doc", flare_doc_url(flare_doc_id)));
        }
        if let Some(history_doc_id) = self.history_doc_id {
            links.push(link_button("Slack History", history_doc_url(history_doc_id)));
        }
        links.push(link_button(self.ticket_key, self.ticket_url.to_string()));

        let mut closing = format!(
            "Finally, once the flare is mitigated, fill out the <{}|jira ticket> to capture what we know and sign up for the flare followup.",
            self.ticket_url
        );
        if let Some(flare_doc_id) = self.flare_doc_id {
            closing.push_str(&format!(
                " Optionally use the <{}|Flare doc> and schedule a full post-mortem if there was high impact.",
                flare_doc_url(flare_doc_id)
            ));
        }
        if let Some(history_doc_id) = self.history_doc_id {
            closing.push_str(&format!(
                " You can also find the slack history stored <{}|here>",
                history_doc_url(history_doc_id)
            ));
        }

        vec![
            section(format!(
                "{INTRO_MESSAGE_PREFIX}! I am here to help you manage this flare and help solve it as soon as possible. This message is pinned so you can always access it easily from the top of the channel."
            )),
            section(help_flare_channel(self.bot_user_id)),
            section(
                "I can also help you quickly look up a few things. Click on any of the buttons below to get some information that might help debug this flare faster."
                    .to_string(),
            ),
            json!({
                "type": "actions",
                "elements": [
                    action_button("Recent Deploys", RECENT_DEPLOYS_ACTION_ID),
                    action_button("Open Alerts", OPEN_ALERTS_ACTION_ID),
                ],
            }),
            json!({ "type": "actions", "elements": links }),
            section(closing),
        ]
    }
}

/// Notification text for a block message: the first section's text.
pub fn fallback_text(blocks: &[Value]) -> String {
    blocks
        .first()
        .and_then(|block| block.pointer("/text/text"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
