//! Socket Mode connection loop that feeds inbound events to [`dispatch_inbound_event`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use flare_integrations::SlackApiClient;
use futures_util::{Sink, SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, info, warn};

use crate::dispatch::dispatch_inbound_event;
use crate::flare_context::FlareContext;

mod socket_envelope;

use socket_envelope::{normalize_socket_envelope, parse_socket_envelope, SocketDirective};

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Shutdown,
    Reconnect,
}

/// Runs the bot until ctrl-c, reconnecting after every dropped or refreshed socket.
pub async fn run_flare_bot(
    context: Arc<FlareContext>,
    slack: SlackApiClient,
    reconnect_delay: Duration,
) -> Result<()> {
    loop {
        match slack.open_socket_connection().await {
            Ok(socket_url) => {
                info!("socket-connected");
                match run_socket_session(&context, &socket_url).await {
                    Ok(SessionEnd::Shutdown) => {
                        info!("shutdown-requested");
                        return Ok(());
                    }
                    Ok(SessionEnd::Reconnect) => info!("socket-refresh-requested"),
                    Err(error) => warn!(error = %format!("{error:#}"), "socket-session-error"),
                }
            }
            Err(error) => {
                warn!(error = %format!("{error:#}"), "socket-open-failed");
            }
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown-requested");
                return Ok(());
            }
            _ = tokio::time::sleep(reconnect_delay) => {}
        }
    }
}

async fn run_socket_session(context: &Arc<FlareContext>, socket_url: &str) -> Result<SessionEnd> {
    let (stream, _response) = connect_async(socket_url)
        .await
        .context("failed to connect socket mode websocket")?;
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                return Ok(SessionEnd::Shutdown);
            }
            maybe_message = source.next() => {
                let Some(message_result) = maybe_message else {
                    return Ok(SessionEnd::Reconnect);
                };
                let message = message_result.context("failed reading socket message")?;
                let Some(envelope) = parse_socket_envelope(message)? else {
                    continue;
                };
                if !envelope.envelope_id.is_empty() {
                    ack_envelope(&mut sink, &envelope.envelope_id).await?;
                }
                match normalize_socket_envelope(&envelope) {
                    Ok(SocketDirective::Dispatch(event)) => {
                        tokio::spawn(dispatch_inbound_event(context.clone(), event));
                    }
                    Ok(SocketDirective::Reconnect) => return Ok(SessionEnd::Reconnect),
                    Ok(SocketDirective::Skip) => {
                        debug!(envelope_type = envelope.envelope_type.as_str(), "envelope-skipped");
                    }
                    Err(error) => {
                        warn!(
                            envelope_type = envelope.envelope_type.as_str(),
                            error = %format!("{error:#}"),
                            "envelope-decode-failed"
                        );
                    }
                }
            }
        }
    }
}

async fn ack_envelope<S>(sink: &mut S, envelope_id: &str) -> Result<()>
where
    S: Sink<WsMessage> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    let ack = json!({ "envelope_id": envelope_id }).to_string();
    sink.send(WsMessage::Text(ack.into()))
        .await
        .context("failed to send socket ack")
}
