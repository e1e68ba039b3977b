//! Best-effort transcript logging of flare-channel messages into the history spreadsheet.

use std::sync::OnceLock;

use anyhow::Result;
use flare_core::{format_reference_time, parse_slack_ts};
use flare_integrations::TranscriptRow;
use regex::Regex;
use tracing::debug;

use crate::flare_context::FlareContext;
use crate::message_event::MessageEvent;

pub const TRANSCRIPT_SHEET_NAME: &str = "Sheet1";

const MENTION_PATTERN: &str = r"<@([A-Z0-9]+)>";

fn mention_regex() -> Option<&'static Regex> {
    static MENTION_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    MENTION_REGEX
        .get_or_init(|| Regex::new(MENTION_PATTERN).ok())
        .as_ref()
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Transcript text and author id extracted from an event.
pub struct TranscriptEntry {
    pub user_id: String,
    pub message: String,
}

/// Picks the text worth recording for each supported message form.
pub fn transcript_entry(event: &MessageEvent) -> Option<TranscriptEntry> {
    let (user, message) = match event.subtype.as_deref() {
        None => {
            let text = event.text.clone().unwrap_or_default();
            let message = match event.thread_ts.as_deref() {
                Some(thread_ts) => format!("(message_replied {thread_ts}) {text}"),
                None => text,
            };
            (event.user.clone(), message)
        }
        Some("message_replied") => {
            let nested = event.message.as_ref()?;
            let text = nested.text.as_deref().filter(|text| !text.is_empty())?;
            let thread_ts = nested.thread_ts.as_deref().unwrap_or_default();
            (
                nested.user.clone(),
                format!("(message_replied {thread_ts}): {text}"),
            )
        }
        Some("message_changed") => {
            let nested = event.message.as_ref()?;
            let previous = event.previous_message.as_ref()?;
            let text = nested.text.as_deref().filter(|text| !text.is_empty())?;
            let previous_text = previous.text.as_deref().filter(|text| !text.is_empty())?;
            if text == previous_text {
                return None;
            }
            let ts = nested.ts.as_deref().unwrap_or_default();
            (nested.user.clone(), format!("(message_changed {ts}): {text}"))
        }
        Some("message_deleted") => {
            let previous = event.previous_message.as_ref()?;
            let ts = previous.ts.as_deref().unwrap_or_default();
            (
                previous.user.clone(),
                format!("(message_deleted {ts}): Message deleted"),
            )
        }
        Some("channel_join") | Some("channel_leave") => {
            (event.user.clone(), event.text.clone().unwrap_or_default())
        }
        Some(_) => return None,
    };
    let user_id = user.filter(|user| !user.is_empty())?;
    if message.is_empty() {
        return None;
    }
    Some(TranscriptEntry { user_id, message })
}

/// Appends `event` to its channel's transcript. Returns whether a row was written.
pub async fn record_message(context: &FlareContext, event: &MessageEvent) -> Result<bool> {
    let Some(channel_id) = event.channel.as_deref() else {
        return Ok(false);
    };
    let Some(doc_id) = context
        .channels
        .transcript_doc_id(
            context.messaging.as_ref(),
            channel_id,
            &context.config.bot_user_id,
        )
        .await?
    else {
        return Ok(false);
    };
    let Some(entry) = transcript_entry(event) else {
        debug!(channel_id, ts = event.ts.as_str(), "message-not-recorded");
        return Ok(false);
    };

    let message = replace_mentions(context, &entry.message).await;
    let author = match context
        .users
        .get_user(context.messaging.as_ref(), &entry.user_id)
        .await
    {
        Ok(user) => user.display_name().to_string(),
        Err(_) => entry.user_id.clone(),
    };
    let localized_time = parse_slack_ts(&event.ts)
        .map(format_reference_time)
        .unwrap_or_default();

    context
        .spreadsheets
        .append_row(
            &doc_id,
            TRANSCRIPT_SHEET_NAME,
            TranscriptRow {
                ts: event.ts.clone(),
                localized_time,
                author,
                message,
            },
        )
        .await?;
    Ok(true)
}

/// Rewrites `<@U123>` mentions as `@Display Name`; unknown users keep the raw mention.
async fn replace_mentions(context: &FlareContext, message: &str) -> String {
    let Some(regex) = mention_regex() else {
        return message.to_string();
    };
    let mut rendered = message.to_string();
    let user_ids = regex
        .captures_iter(message)
        .filter_map(|captures| captures.get(1).map(|id| id.as_str().to_string()))
        .collect::<Vec<_>>();
    for user_id in user_ids {
        if let Ok(user) = context
            .users
            .get_user(context.messaging.as_ref(), &user_id)
            .await
        {
            rendered = rendered.replacen(
                &format!("<@{user_id}>"),
                &format!("@{}", user.display_name()),
                1,
            );
        }
    }
    rendered
}
