//! Recent-deploy and open-alert modals opened from the intro message buttons.
//!
//! The trigger id is only valid for about three seconds, so a loading view is
//! opened first and replaced once the data arrives.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use flare_core::{format_reference_time, truncate_for_slack};
use flare_integrations::{Deployment, IncidentFilters, PagedIncident};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::flare_context::FlareContext;
use crate::message_event::BlockActionEvent;

pub const RECENT_DEPLOYS_ACTION_ID: &str = "recent_deploys";
pub const OPEN_ALERTS_ACTION_ID: &str = "open_alerts";
pub const DEPLOY_ENVIRONMENT: &str = "production";
pub const RECENT_DEPLOYS_LIMIT: usize = 15;
pub const OPEN_ALERTS_LIMIT: usize = 30;

/// Section text tops out at 3000 characters.
const ERROR_TEXT_MAX_CHARS: usize = 2_800;

const LOADING_TEXT: &str = ":loading:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    RecentDeploys,
    OpenAlerts,
}

impl LookupKind {
    pub fn from_action_id(action_id: &str) -> Option<Self> {
        match action_id {
            RECENT_DEPLOYS_ACTION_ID => Some(Self::RecentDeploys),
            OPEN_ALERTS_ACTION_ID => Some(Self::OpenAlerts),
            _ => None,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Self::RecentDeploys => "Recent Deploys",
            Self::OpenAlerts => "Open Alerts",
        }
    }

    fn header(&self) -> String {
        match self {
            Self::RecentDeploys => {
                format!("Last {RECENT_DEPLOYS_LIMIT} deployments to {DEPLOY_ENVIRONMENT}")
            }
            Self::OpenAlerts => "All pagerduty alerts that haven't been resolved".to_string(),
        }
    }

    fn subject(&self) -> &'static str {
        match self {
            Self::RecentDeploys => "recent deploys",
            Self::OpenAlerts => "open alerts",
        }
    }
}

fn mrkdwn(text: impl Into<String>) -> Value {
    json!({ "type": "mrkdwn", "text": text.into() })
}

fn section(text: impl Into<String>) -> Value {
    json!({ "type": "section", "text": mrkdwn(text) })
}

fn modal(kind: LookupKind, body: Vec<Value>) -> Value {
    let mut blocks = vec![json!({
        "type": "header",
        "text": { "type": "plain_text", "text": kind.header() },
    })];
    blocks.extend(body);
    json!({
        "type": "modal",
        "title": { "type": "plain_text", "text": kind.title() },
        "close": { "type": "plain_text", "text": "Close" },
        "blocks": blocks,
    })
}

pub fn loading_view(kind: LookupKind) -> Value {
    modal(kind, vec![json!({ "type": "divider" }), section(LOADING_TEXT)])
}

pub fn error_view(kind: LookupKind, error: &str) -> Value {
    let error = truncate_for_slack(error, ERROR_TEXT_MAX_CHARS);
    modal(
        kind,
        vec![
            json!({ "type": "divider" }),
            section(format!(
                ":emergency: error getting {}:\n```{error}```",
                kind.subject()
            )),
        ],
    )
}

fn reference_time_or_raw(value: Option<&str>) -> String {
    match value {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|parsed| format_reference_time(parsed.with_timezone(&Utc)))
            .unwrap_or_else(|_| raw.to_string()),
        None => "unknown".to_string(),
    }
}

fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

pub fn recent_deploys_view(deployments: &[Deployment]) -> Value {
    let mut body = Vec::new();
    for deployment in deployments {
        body.push(json!({ "type": "divider" }));
        let owner = deployment
            .owner
            .as_deref()
            .map(str::trim)
            .filter(|owner| !owner.is_empty())
            .unwrap_or("unknown");
        let build = match deployment.build_ref.as_deref() {
            Some(build) => format!("build - {build}"),
            None => "unknown".to_string(),
        };
        let config = match deployment.config_ref.as_deref() {
            Some(config_ref) => format!("config - {}", short_sha(config_ref)),
            None => "unknown".to_string(),
        };
        body.push(json!({
            "type": "section",
            "text": mrkdwn(format!("*{}*", deployment.id)),
            "fields": [
                mrkdwn(reference_time_or_raw(deployment.created_at.as_deref())),
                mrkdwn(owner),
                mrkdwn(build),
                mrkdwn(config),
            ],
        }));
    }
    modal(LookupKind::RecentDeploys, body)
}

pub fn open_alerts_view(incidents: &[PagedIncident]) -> Value {
    let mut body = Vec::new();
    if incidents.is_empty() {
        body.push(json!({ "type": "divider" }));
        body.push(section("No open alerts found."));
        return modal(LookupKind::OpenAlerts, body);
    }
    if incidents.len() > OPEN_ALERTS_LIMIT {
        body.push(json!({
            "type": "context",
            "elements": [mrkdwn(format!(
                ":information_source: Showing only the most recent {OPEN_ALERTS_LIMIT} alerts. There are {} total open alerts.",
                incidents.len()
            ))],
        }));
    }
    for incident in incidents.iter().take(OPEN_ALERTS_LIMIT) {
        body.push(json!({ "type": "divider" }));
        let title = incident.title.trim().replace('\n', " ");
        body.push(json!({
            "type": "section",
            "text": mrkdwn(format!("<{}|{title}>", incident.html_url)),
            "fields": [
                mrkdwn(format!("*Status:*\n{}", incident.status)),
                mrkdwn(format!(
                    "*Assignee:*\n{}",
                    incident.assignee.as_deref().unwrap_or("Unassigned")
                )),
                mrkdwn(format!(
                    "*Team:*\n<{}|{}>",
                    incident.service_url, incident.service_name
                )),
                mrkdwn(format!(
                    "*Created:*\n{}",
                    reference_time_or_raw(Some(incident.created_at.as_str()))
                )),
            ],
        }));
    }
    modal(LookupKind::OpenAlerts, body)
}

async fn fetch_view(context: &FlareContext, kind: LookupKind) -> Result<Value> {
    match kind {
        LookupKind::RecentDeploys => {
            let deployments = context
                .deployments
                .list_recent_deployments(DEPLOY_ENVIRONMENT, RECENT_DEPLOYS_LIMIT)
                .await?;
            Ok(recent_deploys_view(&deployments))
        }
        LookupKind::OpenAlerts => {
            let incidents = context
                .paging
                .list_incidents(&IncidentFilters::unresolved())
                .await?;
            Ok(open_alerts_view(&incidents))
        }
    }
}

/// Opens the loading modal for a lookup button, then fills it in.
///
/// Returns `Ok(false)` for actions that are not lookups.
pub async fn handle_block_action(context: &FlareContext, action: &BlockActionEvent) -> Result<bool> {
    let Some(kind) = LookupKind::from_action_id(&action.action_id) else {
        debug!(action_id = action.action_id.as_str(), "block-action-ignored");
        return Ok(false);
    };
    let messaging = context.messaging.as_ref();
    let view_id = messaging
        .open_view(&action.trigger_id, loading_view(kind))
        .await
        .context("Error opening modal")?;

    match fetch_view(context, kind).await {
        Ok(view) => messaging.update_view(&view_id, view).await?,
        Err(error) => {
            warn!(
                action_id = action.action_id.as_str(),
                user_id = action.user_id.as_str(),
                error = %error,
                "interactive-lookup-failed"
            );
            messaging
                .update_view(&view_id, error_view(kind, &format!("{error:#}")))
                .await?;
            return Err(error);
        }
    }
    Ok(true)
}
