//! Lazily populated user and channel directories.

use std::collections::HashMap;
use std::sync::OnceLock;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use flare_integrations::{ChatChannel, ChatUser, MessagingClient, PinnedMessage};
use regex::Regex;
use serde_json::Value;
use tokio::sync::RwLock;

/// Text the pinned intro message starts with.
pub const INTRO_MESSAGE_PREFIX: &str = "Thank you for firing a flare";

const TRANSCRIPT_URL_PATTERN: &str = r"docs\.google\.com/spreadsheets/d/([a-zA-Z0-9_-]+)";

fn transcript_url_regex() -> Option<&'static Regex> {
    static TRANSCRIPT_URL_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    TRANSCRIPT_URL_REGEX
        .get_or_init(|| Regex::new(TRANSCRIPT_URL_PATTERN).ok())
        .as_ref()
}

#[derive(Default)]
struct UsersState {
    users: HashMap<String, ChatUser>,
    last_updated: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct UsersCache {
    state: RwLock<UsersState>,
}

impl UsersCache {
    pub async fn get_user(&self, client: &dyn MessagingClient, user_id: &str) -> Result<ChatUser> {
        if user_id.trim().is_empty() {
            bail!("user id is empty");
        }
        if let Some(user) = self.state.read().await.users.get(user_id) {
            return Ok(user.clone());
        }
        let user = client.lookup_user(user_id).await?;
        self.state
            .write()
            .await
            .users
            .insert(user.id.clone(), user.clone());
        Ok(user)
    }

    /// Replaces the directory with the full paginated user list.
    pub async fn refresh(&self, client: &dyn MessagingClient) -> Result<usize> {
        let mut users = HashMap::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = client.list_users(cursor.as_deref()).await?;
            for member in page.members {
                users.insert(member.id.clone(), member);
            }
            cursor = page.next_cursor;
            if cursor.is_none() {
                break;
            }
        }
        let count = users.len();
        let mut state = self.state.write().await;
        state.users = users;
        state.last_updated = Some(Utc::now());
        Ok(count)
    }

    pub async fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.last_updated
    }
}

#[derive(Debug, Clone)]
struct ChannelEntry {
    info: ChatChannel,
    transcript_doc_id: Option<String>,
    /// Set once the pins were read or the id was assigned, so a miss sticks.
    transcript_checked: bool,
}

pub struct ChannelsCache {
    flare_channel_prefix: String,
    channels: RwLock<HashMap<String, ChannelEntry>>,
}

impl ChannelsCache {
    pub fn new(flare_channel_prefix: &str) -> Self {
        Self {
            flare_channel_prefix: flare_channel_prefix.to_string(),
            channels: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get_channel(
        &self,
        client: &dyn MessagingClient,
        channel_id: &str,
    ) -> Result<ChatChannel> {
        if let Some(entry) = self.channels.read().await.get(channel_id) {
            return Ok(entry.info.clone());
        }
        let info = client.lookup_channel(channel_id).await?;
        self.channels
            .write()
            .await
            .entry(channel_id.to_string())
            .or_insert(ChannelEntry {
                info: info.clone(),
                transcript_doc_id: None,
                transcript_checked: false,
            });
        Ok(info)
    }

    /// Transcript spreadsheet id for a flare channel, recovered from the bot's pinned
    /// intro message on a cache miss. Non-flare channels never have one.
    pub async fn transcript_doc_id(
        &self,
        client: &dyn MessagingClient,
        channel_id: &str,
        bot_user_id: &str,
    ) -> Result<Option<String>> {
        if let Some(entry) = self.channels.read().await.get(channel_id) {
            if entry.transcript_checked {
                return Ok(entry.transcript_doc_id.clone());
            }
        }

        let info = self.get_channel(client, channel_id).await?;
        if self.flare_channel_prefix.is_empty()
            || !info.name.starts_with(&self.flare_channel_prefix)
        {
            return Ok(None);
        }

        let pins = client.list_pins(channel_id).await?;
        let doc_id = pins
            .iter()
            .find_map(|pin| transcript_doc_id_from_pin(pin, bot_user_id));
        self.set_channel(info, doc_id.clone()).await;
        Ok(doc_id)
    }

    pub async fn set_channel(&self, info: ChatChannel, transcript_doc_id: Option<String>) {
        self.channels.write().await.insert(
            info.id.clone(),
            ChannelEntry {
                info,
                transcript_doc_id,
                transcript_checked: true,
            },
        );
    }
}

fn transcript_doc_id_from_pin(pin: &PinnedMessage, bot_user_id: &str) -> Option<String> {
    if pin.item_type != "message" || pin.created_by.as_deref() != Some(bot_user_id) {
        return None;
    }
    if !pin.text.starts_with(INTRO_MESSAGE_PREFIX) {
        return None;
    }
    let last_block = pin.blocks.last()?;
    if last_block.get("type").and_then(Value::as_str) != Some("section") {
        return None;
    }
    let text = last_block.pointer("/text/text").and_then(Value::as_str)?;
    transcript_doc_id_from_text(text)
}

/// Extracts the spreadsheet id from a `docs.google.com/spreadsheets/d/{id}` URL.
pub fn transcript_doc_id_from_text(text: &str) -> Option<String> {
    let captures = transcript_url_regex()?.captures(text)?;
    Some(captures.get(1)?.as_str().to_string())
}
