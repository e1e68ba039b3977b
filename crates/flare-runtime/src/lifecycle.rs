//! Mitigate / unmitigate / not-a-flare transitions and their side effects.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Datelike, Days, Timelike, Utc, Weekday};
use flare_commands::TransitionKind;
use flare_integrations::{transition_issue_to, ChatChannel, ChatUser, OutboundMessage};
use tracing::{info, warn};

use crate::flare_context::{ticket_key_for_channel, FlareContext, TransitionIdentityPolicy};

/// Hour (UTC) on Thursdays when follow-up reminders go out.
pub const FOLLOW_UP_HOUR_UTC: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Documented incident graph. The handler does not consult it: the requested
/// keyword alone decides which tracker transition is attempted.
pub enum IncidentState {
    Open,
    Mitigated,
    NotAFlare,
}

impl IncidentState {
    pub fn transition(self, kind: TransitionKind) -> Option<IncidentState> {
        match (self, kind) {
            (Self::Open, TransitionKind::Mitigate) => Some(Self::Mitigated),
            (Self::Open, TransitionKind::NotAFlare) => Some(Self::NotAFlare),
            (Self::Mitigated, TransitionKind::NotAFlare) => Some(Self::NotAFlare),
            (Self::Mitigated, TransitionKind::Unmitigate) => Some(Self::Open),
            _ => None,
        }
    }
}

pub fn tracker_status_for(kind: TransitionKind) -> &'static str {
    match kind {
        TransitionKind::Mitigate => "Mitigated",
        TransitionKind::NotAFlare => "NotAFlare",
        TransitionKind::Unmitigate => "In Progress",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderPlan {
    SendNow,
    ScheduleAt(DateTime<Utc>),
}

/// Thursday from 15:00 UTC to midnight sends right away; anything else waits for
/// the next Thursday 15:00 UTC (the same day before 15:00).
pub fn follow_up_reminder_plan(now: DateTime<Utc>) -> ReminderPlan {
    let weekday = now.weekday();
    if weekday == Weekday::Thu && now.hour() >= FOLLOW_UP_HOUR_UTC {
        return ReminderPlan::SendNow;
    }
    let days_until_thursday = (Weekday::Thu.num_days_from_monday() + 7
        - weekday.num_days_from_monday())
        % 7;
    let scheduled = now
        .date_naive()
        .checked_add_days(Days::new(u64::from(days_until_thursday)))
        .and_then(|date| date.and_hms_opt(FOLLOW_UP_HOUR_UTC, 0, 0))
        .map(|date_time| date_time.and_utc());
    match scheduled {
        Some(at) => ReminderPlan::ScheduleAt(at),
        None => ReminderPlan::SendNow,
    }
}

pub fn follow_up_reminder_text(requester_id: &str, ticket_url: &str) -> String {
    format!(
        "<@{requester_id}> Thanks for mitigating this flare! Please sign up for the flare followup and fill in the details of the <{ticket_url}|jira ticket> while they are fresh."
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    pub kind: TransitionKind,
    pub channel: ChatChannel,
    pub requester: ChatUser,
    pub message_ts: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionReport {
    pub reminder: Option<ReminderPlan>,
    /// Scheduled message ids deleted by an unmitigate.
    pub cancelled: Vec<String>,
    /// Side-effect failures the requester was told about.
    pub notices: Vec<String>,
}

fn success_text(kind: TransitionKind) -> &'static str {
    match kind {
        TransitionKind::Mitigate => {
            "The Flare was mitigated and there was much rejoicing throughout the land."
        }
        TransitionKind::NotAFlare => {
            "The Flare was not a Flare and there was much rejoicing throughout the land."
        }
        TransitionKind::Unmitigate => "UhOh! The Flare was unmitigated and the land is in chaos.",
    }
}

fn broadcast_text(kind: TransitionKind, channel_id: &str) -> String {
    match kind {
        TransitionKind::Mitigate => format!("<#{channel_id}> has been mitigated"),
        TransitionKind::NotAFlare => format!("turns out <#{channel_id}> is not a Flare"),
        TransitionKind::Unmitigate => {
            format!("<!channel> <#{channel_id}> has been unmitigated and is back in progress.")
        }
    }
}

/// Applies a lifecycle keyword to the channel's ticket.
///
/// A failed tracker transition is reported in the thread and returned as an
/// error; nothing after it runs. Reminder and cancellation failures only add a
/// notice.
pub async fn handle_transition(
    context: &FlareContext,
    request: &TransitionRequest,
    now: DateTime<Utc>,
) -> Result<TransitionReport> {
    let messaging = context.messaging.as_ref();
    let channel_id = request.channel.id.as_str();
    let ticket_key = ticket_key_for_channel(&request.channel);
    let reply = |text: String| {
        OutboundMessage::text(channel_id, text).in_thread(request.message_ts.as_str())
    };

    let transitioned = match verify_identity(context, &request.requester).await {
        Ok(()) => {
            transition_issue_to(
                context.tracker.as_ref(),
                &ticket_key,
                tracker_status_for(request.kind),
            )
            .await
        }
        Err(error) => Err(error),
    };
    if let Err(error) = transitioned {
        warn!(
            channel_id,
            ticket_key = ticket_key.as_str(),
            kind = request.kind.as_str(),
            error = %error,
            "lifecycle-transition-failed"
        );
        messaging
            .post_message(reply(format!(
                "Error transitioning flare: {error}. You can manually transition the flare in Jira."
            )))
            .await?;
        return Err(error);
    }
    info!(
        channel_id,
        ticket_key = ticket_key.as_str(),
        kind = request.kind.as_str(),
        "lifecycle-transitioned"
    );

    messaging
        .post_message(reply(success_text(request.kind).to_string()))
        .await?;
    messaging
        .post_message(OutboundMessage::text(
            &context.config.flares_channel_id,
            broadcast_text(request.kind, channel_id),
        ))
        .await?;

    let mut report = TransitionReport::default();
    match request.kind {
        TransitionKind::Mitigate => {
            let plan = follow_up_reminder_plan(now);
            report.reminder = Some(plan);
            let text =
                follow_up_reminder_text(&request.requester.id, &context.config.ticket_url(&ticket_key));
            let sent = match plan {
                ReminderPlan::SendNow => messaging.post_message(reply(text)).await.map(|_| ()),
                ReminderPlan::ScheduleAt(at) => messaging
                    .schedule_message(channel_id, &text, at.timestamp())
                    .await
                    .map(|_| ()),
            };
            if let Err(error) = sent {
                warn!(channel_id, error = %error, "follow-up-reminder-failed");
                report.notices.push(format!(
                    "I couldn't set up the followup reminder for this flare. Error: {error}"
                ));
            }
        }
        TransitionKind::Unmitigate => match cancel_scheduled_reminders(context, channel_id).await {
            Ok(cancelled) => report.cancelled = cancelled,
            Err(error) => {
                warn!(channel_id, error = %error, "follow-up-cancel-failed");
                report.notices.push(format!(
                    "I couldn't cancel the scheduled followup reminders for this flare. Error: {error}"
                ));
            }
        },
        TransitionKind::NotAFlare => {}
    }

    for notice in &report.notices {
        messaging.post_message(reply(notice.clone())).await?;
    }
    Ok(report)
}

async fn verify_identity(context: &FlareContext, requester: &ChatUser) -> Result<()> {
    if context.config.identity_policy == TransitionIdentityPolicy::Skip {
        return Ok(());
    }
    let email = requester
        .email
        .as_deref()
        .ok_or_else(|| anyhow!("Could not find your JIRA user account"))?;
    match context.tracker.find_user_by_email(email).await? {
        Some(_) => Ok(()),
        None => Err(anyhow!("Could not find your JIRA user account")),
    }
}

/// Deletes the pending scheduled messages that belong to `channel_id`.
async fn cancel_scheduled_reminders(
    context: &FlareContext,
    channel_id: &str,
) -> Result<Vec<String>> {
    let scheduled = context
        .messaging
        .list_scheduled_messages(channel_id)
        .await?;
    let mut cancelled = Vec::new();
    for message in scheduled
        .into_iter()
        .filter(|message| message.channel_id == channel_id)
    {
        context
            .messaging
            .delete_scheduled_message(channel_id, &message.id)
            .await?;
        cancelled.push(message.id);
    }
    Ok(cancelled)
}
