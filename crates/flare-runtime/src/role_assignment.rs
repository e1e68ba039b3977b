//! Incident-lead and comms-lead claims made inside a flare channel.

use anyhow::{anyhow, Result};
use flare_integrations::{ChatChannel, ChatUser, OutboundMessage};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::flare_context::{ticket_key_for_channel, FlareContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlareRole {
    IncidentLead,
    CommsLead,
}

impl FlareRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IncidentLead => "incident lead",
            Self::CommsLead => "comms lead",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleClaim {
    pub role: FlareRole,
    pub channel: ChatChannel,
    pub requester: ChatUser,
    pub message_ts: String,
}

fn role_fields(context: &FlareContext, role: FlareRole, account_id: &str) -> Value {
    match role {
        FlareRole::IncidentLead => json!({ "assignee": { "id": account_id } }),
        FlareRole::CommsLead => {
            let mut fields = serde_json::Map::new();
            fields.insert(
                context.config.comms_lead_field.clone(),
                json!({ "id": account_id }),
            );
            Value::Object(fields)
        }
    }
}

fn success_text(role: FlareRole, user_id: &str) -> String {
    match role {
        FlareRole::IncidentLead => format!(
            "Oh Captain My Captain! <@{user_id}> is now incident lead. Please confirm all actions with them."
        ),
        FlareRole::CommsLead => format!(
            "Comms lead assigned! <@{user_id}> is now responsible for external communications."
        ),
    }
}

/// Records the requester as incident or comms lead on the channel's ticket.
///
/// Incident-lead replies go to the channel, comms-lead replies to the thread.
pub async fn handle_role_claim(context: &FlareContext, claim: &RoleClaim) -> Result<()> {
    let messaging = context.messaging.as_ref();
    let reply = |text: String| {
        let message = OutboundMessage::text(&claim.channel.id, text);
        match claim.role {
            FlareRole::IncidentLead => message,
            FlareRole::CommsLead => message.in_thread(claim.message_ts.as_str()),
        }
    };

    let prefix = &context.config.flare_channel_prefix;
    if prefix.is_empty() || !claim.channel.name.starts_with(prefix.as_str()) {
        messaging
            .post_message(reply(format!(
                "Sorry, I can only assign {}s in a channel that corresponds to a Flare issue in JIRA.",
                claim.role.as_str()
            )))
            .await?;
        return Ok(());
    }

    messaging
        .post_message(reply(format!("working on assigning {}....", claim.role.as_str())))
        .await?;

    let ticket_key = ticket_key_for_channel(&claim.channel);
    match assign_role(context, claim, &ticket_key).await {
        Ok(()) => {
            info!(
                ticket_key = ticket_key.as_str(),
                role = claim.role.as_str(),
                user_id = claim.requester.id.as_str(),
                "flare-role-assigned"
            );
            messaging
                .post_message(reply(success_text(claim.role, &claim.requester.id)))
                .await?;
            Ok(())
        }
        Err(error) => {
            warn!(
                ticket_key = ticket_key.as_str(),
                role = claim.role.as_str(),
                error = %error,
                "flare-role-assignment-failed"
            );
            messaging
                .post_message(reply(format!(
                    "Sorry, I couldn't assign you as {}. Error: {error}",
                    claim.role.as_str()
                )))
                .await?;
            Err(error)
        }
    }
}

async fn assign_role(context: &FlareContext, claim: &RoleClaim, ticket_key: &str) -> Result<()> {
    let account_id = match claim.requester.email.as_deref() {
        Some(email) => context.tracker.find_user_by_email(email).await?,
        None => None,
    }
    .ok_or_else(|| anyhow!("Could not find your JIRA user account"))?;
    context
        .tracker
        .edit_issue_fields(ticket_key, role_fields(context, claim.role, &account_id))
        .await
}
