//! Socket Mode frames and their translation into [`InboundEvent`]s.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::message_event::{BlockActionEvent, InboundEvent, MessageEvent};

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SocketEnvelope {
    /// Absent on `hello` and `disconnect` frames, which need no ack.
    #[serde(default)]
    pub(crate) envelope_id: String,
    #[serde(rename = "type")]
    pub(crate) envelope_type: String,
    #[serde(default)]
    pub(crate) payload: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SocketDirective {
    Dispatch(InboundEvent),
    Reconnect,
    Skip,
}

#[derive(Debug, Deserialize)]
struct EventCallback {
    #[serde(rename = "type")]
    callback_type: String,
    #[serde(default)]
    event: Value,
}

#[derive(Debug, Deserialize)]
struct InteractivePayload {
    #[serde(rename = "type")]
    interaction_type: String,
    #[serde(default)]
    trigger_id: String,
    #[serde(default)]
    user: Option<IdRef>,
    #[serde(default)]
    channel: Option<IdRef>,
    #[serde(default)]
    actions: Vec<ActionRef>,
}

#[derive(Debug, Deserialize)]
struct IdRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ActionRef {
    action_id: String,
}

pub(crate) fn parse_socket_envelope(message: WsMessage) -> Result<Option<SocketEnvelope>> {
    let text = match message {
        WsMessage::Text(text) => text.to_string(),
        WsMessage::Binary(bytes) => {
            String::from_utf8(bytes.to_vec()).context("invalid utf-8 socket payload")?
        }
        WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Close(_) | WsMessage::Frame(_) => {
            return Ok(None)
        }
    };
    let envelope =
        serde_json::from_str::<SocketEnvelope>(&text).context("failed to parse socket envelope")?;
    Ok(Some(envelope))
}

pub(crate) fn normalize_socket_envelope(envelope: &SocketEnvelope) -> Result<SocketDirective> {
    match envelope.envelope_type.as_str() {
        "disconnect" => Ok(SocketDirective::Reconnect),
        "events_api" => {
            let callback = serde_json::from_value::<EventCallback>(envelope.payload.clone())
                .context("failed to decode event callback payload")?;
            if callback.callback_type != "event_callback"
                || callback.event.get("type").and_then(Value::as_str) != Some("message")
            {
                return Ok(SocketDirective::Skip);
            }
            let event = serde_json::from_value::<MessageEvent>(callback.event)
                .context("failed to decode message event")?;
            Ok(SocketDirective::Dispatch(InboundEvent::Message(event)))
        }
        "interactive" => {
            let payload = serde_json::from_value::<InteractivePayload>(envelope.payload.clone())
                .context("failed to decode interactive payload")?;
            if payload.interaction_type != "block_actions" {
                return Ok(SocketDirective::Skip);
            }
            let (Some(user), Some(action)) = (payload.user, payload.actions.into_iter().next())
            else {
                return Ok(SocketDirective::Skip);
            };
            Ok(SocketDirective::Dispatch(InboundEvent::BlockAction(
                BlockActionEvent {
                    action_id: action.action_id,
                    trigger_id: payload.trigger_id,
                    user_id: user.id,
                    channel_id: payload.channel.map(|channel| channel.id),
                },
            )))
        }
        _ => Ok(SocketDirective::Skip),
    }
}
