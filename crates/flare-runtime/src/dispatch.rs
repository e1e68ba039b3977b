//! Routes inbound chat events to the command handlers.
//!
//! Handlers report their own failures to the requester; an `Err` from one only
//! marks the request as failed for `request-finished`.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use flare_commands::{
    help_all, help_for_scope, parse_flare_command, unrecognized_command_reply, CommandScope,
    ParsedCommand,
};
use flare_integrations::{ChatChannel, ChatUser, OutboundMessage};
use tracing::{error, info, warn};

use crate::flare_context::FlareContext;
use crate::incident_workflow::{run_incident_workflow, FireRequest};
use crate::interactive_lookups::handle_block_action;
use crate::lifecycle::{handle_transition, TransitionRequest};
use crate::message_event::{InboundEvent, MessageEvent};
use crate::role_assignment::{handle_role_claim, FlareRole, RoleClaim};
use crate::transcript_recorder::record_message;

pub const STATUS_OK: u16 = 200;
pub const STATUS_OUT_OF_SCOPE: u16 = 400;
pub const STATUS_FAILED: u16 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Not addressed to the bot, or a subtype the bot does not answer.
    Ignored,
    Handled { status_code: u16 },
}

/// Entry point for one socket event; runs inside its own task.
pub async fn dispatch_inbound_event(context: Arc<FlareContext>, event: InboundEvent) {
    match event {
        InboundEvent::Message(message) => {
            handle_message_event(&context, message).await;
        }
        InboundEvent::BlockAction(action) => {
            if let Err(error) = handle_block_action(&context, &action).await {
                error!(
                    action_id = action.action_id.as_str(),
                    user_id = action.user_id.as_str(),
                    error = %error,
                    "block-action-failed"
                );
            }
        }
    }
}

pub async fn handle_message_event(context: &FlareContext, event: MessageEvent) -> DispatchOutcome {
    if let Err(error) = record_message(context, &event).await {
        warn!(
            channel_id = event.channel.as_deref().unwrap_or("unknown"),
            ts = event.ts.as_str(),
            error = %error,
            "record-message-error"
        );
    }

    let bot_user_id = context.config.bot_user_id.as_str();
    // Text-less events still pass through so a missing user or channel is reported.
    if event.subtype.is_some()
        || event.user.as_deref() == Some(bot_user_id)
        || (event.text.is_some() && !event.mentions(bot_user_id))
    {
        return DispatchOutcome::Ignored;
    }

    let started = Instant::now();
    let (Some(user_id), Some(channel_id)) = (event.user.as_deref(), event.channel.as_deref())
    else {
        if let Some(channel_id) = event.channel.as_deref() {
            post_best_effort(
                context,
                OutboundMessage::text(
                    channel_id,
                    "Sorry! Missing user or channel information in the event payload.",
                ),
            )
            .await;
        }
        return DispatchOutcome::Handled {
            status_code: STATUS_OUT_OF_SCOPE,
        };
    };

    let resolved = resolve_participants(context, user_id, channel_id).await;
    let (user, channel) = match resolved {
        Ok(resolved) => resolved,
        Err(lookup_error) => {
            error!(
                channel_id,
                user_id,
                status_code = STATUS_FAILED,
                response_time_ms = started.elapsed().as_millis() as u64,
                error = %lookup_error,
                "request-finished"
            );
            post_best_effort(
                context,
                OutboundMessage::text(
                    channel_id,
                    format!("Sorry! I'm having trouble processing your request. {lookup_error}"),
                ),
            )
            .await;
            return DispatchOutcome::Handled {
                status_code: STATUS_FAILED,
            };
        }
    };

    let status_code = match context.config.command_scope(&channel) {
        Some(scope) => match route_command(context, &event, scope, user, &channel).await {
            Ok(()) => STATUS_OK,
            Err(route_error) => {
                warn!(channel_id, user_id, error = %route_error, "command-failed");
                STATUS_FAILED
            }
        },
        None => {
            let config = &context.config;
            post_best_effort(
                context,
                OutboundMessage::text(
                    channel_id,
                    format!(
                        "Sorry! I can't help you with that. I am only allowed to reply to messages in the <#{}> channel or a flare channel. {}",
                        config.flares_channel_id,
                        help_all(&config.bot_user_id, &config.flares_channel_id)
                    ),
                ),
            )
            .await;
            STATUS_OUT_OF_SCOPE
        }
    };

    info!(
        channel_id,
        user_id,
        status_code,
        response_time_ms = started.elapsed().as_millis() as u64,
        "request-finished"
    );
    DispatchOutcome::Handled { status_code }
}

async fn resolve_participants(
    context: &FlareContext,
    user_id: &str,
    channel_id: &str,
) -> Result<(ChatUser, ChatChannel)> {
    let messaging = context.messaging.as_ref();
    let user = context.users.get_user(messaging, user_id).await?;
    let channel = context.channels.get_channel(messaging, channel_id).await?;
    Ok((user, channel))
}

async fn route_command(
    context: &FlareContext,
    event: &MessageEvent,
    scope: CommandScope,
    requester: ChatUser,
    channel: &ChatChannel,
) -> Result<()> {
    let config = &context.config;
    let Some(text) = event.text.as_deref() else {
        return Ok(());
    };
    match parse_flare_command(text, scope) {
        ParsedCommand::Fire(command) => {
            let request = FireRequest {
                command,
                requester,
                origin_channel: channel.id.clone(),
                message_ts: event.ts.clone(),
            };
            run_incident_workflow(context, &request, Utc::now()).await?;
        }
        ParsedCommand::Transition { kind, .. } => {
            let request = TransitionRequest {
                kind,
                channel: channel.clone(),
                requester,
                message_ts: event.ts.clone(),
            };
            handle_transition(context, &request, Utc::now()).await?;
        }
        ParsedCommand::Help(help_scope) => {
            let text = help_for_scope(
                help_scope,
                scope,
                &config.bot_user_id,
                &config.flares_channel_id,
            );
            context
                .messaging
                .post_message(OutboundMessage::text(&channel.id, text))
                .await?;
        }
        ParsedCommand::ClaimIncidentLead => {
            let claim = role_claim(FlareRole::IncidentLead, event, requester, channel);
            handle_role_claim(context, &claim).await?;
        }
        ParsedCommand::ClaimCommsLead => {
            let claim = role_claim(FlareRole::CommsLead, event, requester, channel);
            handle_role_claim(context, &claim).await?;
        }
        ParsedCommand::Unrecognized => {
            let text =
                unrecognized_command_reply(scope, &config.bot_user_id, &config.flares_channel_id);
            context
                .messaging
                .post_message(OutboundMessage::text(&channel.id, text))
                .await?;
        }
    }
    Ok(())
}

fn role_claim(
    role: FlareRole,
    event: &MessageEvent,
    requester: ChatUser,
    channel: &ChatChannel,
) -> RoleClaim {
    RoleClaim {
        role,
        channel: channel.clone(),
        requester,
        message_ts: event.ts.clone(),
    }
}

async fn post_best_effort(context: &FlareContext, message: OutboundMessage) {
    let channel_id = message.channel.clone();
    if let Err(error) = context.messaging.post_message(message).await {
        warn!(channel_id = channel_id.as_str(), error = %error, "reply-failed");
    }
}
