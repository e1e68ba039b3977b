//! Slack Web API client backing [`MessagingClient`] and the socket-mode handshake.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use flare_core::truncate_for_error;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::collaborators::{
    ChatChannel, ChatUser, MessagingClient, OutboundMessage, PinnedMessage, PostedMessage,
    ScheduledMessage, UserPage,
};
use crate::http_client::{HttpClientSettings, RetryingHttpClient};

const USERS_LIST_PAGE_SIZE: &str = "200";

#[derive(Debug, Deserialize)]
struct SlackEnvelope<T> {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    body: T,
}

#[derive(Debug, Default, Deserialize)]
struct SlackEmpty {}

#[derive(Debug, Default, Deserialize)]
struct SlackResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

impl SlackResponseMetadata {
    fn cursor(self) -> Option<String> {
        self.next_cursor.filter(|cursor| !cursor.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct SlackAuthTestBody {
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlackOpenSocketBody {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlackChatMessageBody {
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    channel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlackScheduleMessageBody {
    #[serde(default)]
    scheduled_message_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlackScheduledMessagesBody {
    #[serde(default)]
    scheduled_messages: Vec<ScheduledMessage>,
    #[serde(default)]
    response_metadata: SlackResponseMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct SlackChannelRecord {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct SlackChannelBody {
    #[serde(default)]
    channel: Option<SlackChannelRecord>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackProfile {
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackUserRecord {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    is_bot: bool,
    #[serde(default)]
    profile: SlackProfile,
}

impl From<SlackUserRecord> for ChatUser {
    fn from(record: SlackUserRecord) -> Self {
        let real_name = record
            .real_name
            .filter(|value| !value.trim().is_empty())
            .or(record.profile.real_name);
        Self {
            id: record.id,
            name: record.name,
            real_name,
            email: record.profile.email,
            is_bot: record.is_bot,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SlackUserBody {
    #[serde(default)]
    user: Option<SlackUserRecord>,
}

#[derive(Debug, Deserialize)]
struct SlackUsersListBody {
    #[serde(default)]
    members: Vec<SlackUserRecord>,
    #[serde(default)]
    response_metadata: SlackResponseMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPinnedMessageRecord {
    #[serde(default)]
    text: String,
    #[serde(default)]
    blocks: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct SlackPinItem {
    #[serde(rename = "type", default)]
    item_type: String,
    #[serde(default)]
    created_by: Option<String>,
    #[serde(default)]
    message: Option<SlackPinnedMessageRecord>,
}

#[derive(Debug, Deserialize)]
struct SlackPinsBody {
    #[serde(default)]
    items: Vec<SlackPinItem>,
}

#[derive(Debug, Deserialize)]
struct SlackViewRecord {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlackViewBody {
    #[serde(default)]
    view: Option<SlackViewRecord>,
}

#[derive(Debug, Deserialize)]
struct SlackFileRecord {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlackFilesListBody {
    #[serde(default)]
    files: Vec<SlackFileRecord>,
}

#[derive(Debug, Deserialize)]
struct SlackGetUploadUrlBody {
    #[serde(default)]
    upload_url: Option<String>,
    #[serde(default)]
    file_id: Option<String>,
}

#[derive(Clone, Copy)]
enum SlackToken {
    Bot,
    App,
}

#[derive(Clone)]
/// Slack Web API client. Bot-token calls back [`MessagingClient`]; the app token
/// is only used to open socket-mode connections.
pub struct SlackApiClient {
    client: RetryingHttpClient,
    api_base: String,
    app_token: String,
    bot_token: String,
}

impl SlackApiClient {
    pub fn new(
        api_base: &str,
        app_token: &str,
        bot_token: &str,
        settings: HttpClientSettings,
    ) -> Result<Self> {
        Ok(Self {
            client: RetryingHttpClient::new("slack", "flarebot-slack", settings)?,
            api_base: api_base.trim_end_matches('/').to_string(),
            app_token: app_token.trim().to_string(),
            bot_token: bot_token.trim().to_string(),
        })
    }

    /// User id of the bot behind the bot token (`auth.test`).
    pub async fn resolve_bot_user_id(&self) -> Result<String> {
        let body: SlackAuthTestBody = self.post_api("auth.test", SlackToken::Bot, None).await?;
        body.user_id
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow!("slack auth.test did not return user_id"))
    }

    /// Fresh websocket URL for socket mode (`apps.connections.open`).
    pub async fn open_socket_connection(&self) -> Result<String> {
        let body: SlackOpenSocketBody = self
            .post_api("apps.connections.open", SlackToken::App, None)
            .await?;
        body.url
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow!("slack apps.connections.open did not return url"))
    }

    fn token(&self, token: SlackToken) -> &str {
        match token {
            SlackToken::Bot => &self.bot_token,
            SlackToken::App => &self.app_token,
        }
    }

    async fn post_api<T>(&self, method: &str, token: SlackToken, payload: Option<&Value>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}/{method}", self.api_base);
        let envelope: SlackEnvelope<T> = self
            .client
            .request_json(method, || {
                let request = self.client.http().post(&url).bearer_auth(self.token(token));
                match payload {
                    Some(payload) => request.json(payload),
                    None => request,
                }
            })
            .await?;
        unwrap_envelope(method, envelope)
    }

    async fn get_api<T>(&self, method: &str, query: &[(&str, &str)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}/{method}", self.api_base);
        let envelope: SlackEnvelope<T> = self
            .client
            .request_json(method, || {
                self.client
                    .http()
                    .get(&url)
                    .bearer_auth(&self.bot_token)
                    .query(query)
            })
            .await?;
        unwrap_envelope(method, envelope)
    }
}

fn unwrap_envelope<T>(method: &str, envelope: SlackEnvelope<T>) -> Result<T> {
    if !envelope.ok {
        bail!(
            "slack {method} failed: {}",
            envelope
                .error
                .unwrap_or_else(|| "unknown error".to_string())
        );
    }
    Ok(envelope.body)
}

#[async_trait]
impl MessagingClient for SlackApiClient {
    async fn post_message(&self, message: OutboundMessage) -> Result<PostedMessage> {
        let payload = serde_json::to_value(&message).context("failed to encode slack message")?;
        let body: SlackChatMessageBody = self
            .post_api("chat.postMessage", SlackToken::Bot, Some(&payload))
            .await?;
        Ok(PostedMessage {
            channel: body.channel.unwrap_or(message.channel),
            ts: body
                .ts
                .ok_or_else(|| anyhow!("slack chat.postMessage response missing ts"))?,
        })
    }

    async fn schedule_message(&self, channel: &str, text: &str, post_at: i64) -> Result<String> {
        let payload = json!({
            "channel": channel,
            "text": text,
            "post_at": post_at,
        });
        let body: SlackScheduleMessageBody = self
            .post_api("chat.scheduleMessage", SlackToken::Bot, Some(&payload))
            .await?;
        body.scheduled_message_id
            .ok_or_else(|| anyhow!("slack chat.scheduleMessage response missing id"))
    }

    async fn list_scheduled_messages(&self, channel: &str) -> Result<Vec<ScheduledMessage>> {
        let mut messages = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut payload = json!({ "channel": channel });
            if let Some(cursor) = cursor.as_deref() {
                payload["cursor"] = Value::String(cursor.to_string());
            }
            let body: SlackScheduledMessagesBody = self
                .post_api("chat.scheduledMessages.list", SlackToken::Bot, Some(&payload))
                .await?;
            messages.extend(body.scheduled_messages);
            cursor = body.response_metadata.cursor();
            if cursor.is_none() {
                return Ok(messages);
            }
        }
    }

    async fn delete_scheduled_message(
        &self,
        channel: &str,
        scheduled_message_id: &str,
    ) -> Result<()> {
        let payload = json!({
            "channel": channel,
            "scheduled_message_id": scheduled_message_id,
        });
        let _: SlackEmpty = self
            .post_api("chat.deleteScheduledMessage", SlackToken::Bot, Some(&payload))
            .await?;
        Ok(())
    }

    async fn create_channel(&self, name: &str) -> Result<String> {
        let payload = json!({ "name": name });
        let body: SlackChannelBody = self
            .post_api("conversations.create", SlackToken::Bot, Some(&payload))
            .await?;
        body.channel
            .map(|channel| channel.id)
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| anyhow!("slack conversations.create response missing channel id"))
    }

    async fn set_topic(&self, channel_id: &str, topic: &str) -> Result<()> {
        let payload = json!({ "channel": channel_id, "topic": topic });
        let _: SlackEmpty = self
            .post_api("conversations.setTopic", SlackToken::Bot, Some(&payload))
            .await?;
        Ok(())
    }

    async fn pin_message(&self, channel_id: &str, ts: &str) -> Result<()> {
        let payload = json!({ "channel": channel_id, "timestamp": ts });
        let _: SlackEmpty = self
            .post_api("pins.add", SlackToken::Bot, Some(&payload))
            .await?;
        Ok(())
    }

    async fn list_pins(&self, channel_id: &str) -> Result<Vec<PinnedMessage>> {
        let body: SlackPinsBody = self.get_api("pins.list", &[("channel", channel_id)]).await?;
        Ok(body
            .items
            .into_iter()
            .map(|item| {
                let message = item.message.unwrap_or_default();
                PinnedMessage {
                    item_type: item.item_type,
                    created_by: item.created_by,
                    text: message.text,
                    blocks: message.blocks,
                }
            })
            .collect())
    }

    async fn invite_users(&self, channel_id: &str, user_ids: &[String]) -> Result<()> {
        if user_ids.is_empty() {
            return Ok(());
        }
        let payload = json!({ "channel": channel_id, "users": user_ids.join(",") });
        let _: SlackEmpty = self
            .post_api("conversations.invite", SlackToken::Bot, Some(&payload))
            .await?;
        Ok(())
    }

    async fn lookup_user(&self, user_id: &str) -> Result<ChatUser> {
        let body: SlackUserBody = self.get_api("users.info", &[("user", user_id)]).await?;
        body.user
            .map(ChatUser::from)
            .ok_or_else(|| anyhow!("slack users.info response missing user"))
    }

    async fn list_users(&self, cursor: Option<&str>) -> Result<UserPage> {
        let mut query = vec![("limit", USERS_LIST_PAGE_SIZE)];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }
        let body: SlackUsersListBody = self.get_api("users.list", &query).await?;
        Ok(UserPage {
            members: body.members.into_iter().map(ChatUser::from).collect(),
            next_cursor: body.response_metadata.cursor(),
        })
    }

    async fn lookup_channel(&self, channel_id: &str) -> Result<ChatChannel> {
        let body: SlackChannelBody = self
            .get_api("conversations.info", &[("channel", channel_id)])
            .await?;
        let record = body
            .channel
            .ok_or_else(|| anyhow!("slack conversations.info response missing channel"))?;
        Ok(ChatChannel {
            id: record.id,
            name: record.name,
        })
    }

    async fn open_view(&self, trigger_id: &str, view: Value) -> Result<String> {
        let payload = json!({ "trigger_id": trigger_id, "view": view });
        let body: SlackViewBody = self
            .post_api("views.open", SlackToken::Bot, Some(&payload))
            .await?;
        body.view
            .and_then(|view| view.id)
            .ok_or_else(|| anyhow!("slack views.open response missing view id"))
    }

    async fn update_view(&self, view_id: &str, view: Value) -> Result<()> {
        let payload = json!({ "view_id": view_id, "view": view });
        let _: SlackEmpty = self
            .post_api("views.update", SlackToken::Bot, Some(&payload))
            .await?;
        Ok(())
    }

    async fn list_bot_files(&self, bot_user_id: &str) -> Result<Vec<String>> {
        let body: SlackFilesListBody = self
            .get_api("files.list", &[("user", bot_user_id), ("types", "images")])
            .await?;
        Ok(body.files.into_iter().filter_map(|file| file.name).collect())
    }

    async fn upload_file(&self, filename: &str, bytes: Vec<u8>) -> Result<()> {
        if filename.trim().is_empty() {
            bail!("slack files upload requires non-empty filename");
        }
        if bytes.is_empty() {
            bail!("slack files upload requires non-empty payload");
        }

        let request = json!({ "filename": filename, "length": bytes.len() });
        let upload: SlackGetUploadUrlBody = self
            .post_api("files.getUploadURLExternal", SlackToken::Bot, Some(&request))
            .await?;
        let upload_url = upload
            .upload_url
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow!("slack files.getUploadURLExternal missing upload_url"))?;
        let file_id = upload
            .file_id
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow!("slack files.getUploadURLExternal missing file_id"))?;

        let response = self
            .client
            .http()
            .post(upload_url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .context("failed to upload file payload to slack external upload URL")?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!(
                "slack external upload failed: status={} body={}",
                status,
                truncate_for_error(&body, 320)
            );
        }

        let complete = json!({ "files": [{ "id": file_id, "title": filename }] });
        let _: SlackEmpty = self
            .post_api("files.completeUploadExternal", SlackToken::Bot, Some(&complete))
            .await?;
        Ok(())
    }
}
