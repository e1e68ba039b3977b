//! Ordered, partially recoverable creation of a flare: ticket, documents, channel.
//!
//! Each step is classified by [`StepPolicy`]. A recoverable failure is logged,
//! reported with a "continuing anyway" notice and the next step runs. A fatal
//! failure posts its remediation message and ends the run. Nothing is retried
//! and nothing already created is rolled back.

use std::fmt;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Datelike, Utc};
use flare_commands::{FireCommand, SpecialType};
use flare_core::REFERENCE_TIME_ZONE;
use flare_integrations::{transition_issue_to, ChatChannel, ChatUser, NewIssue, OutboundMessage};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::flare_context::FlareContext;

mod flare_documents;
mod intro_message;

pub use flare_documents::{
    document_names, flare_doc_url, history_doc_url, substitute_template, ticket_description,
    DocumentNames,
};
pub use intro_message::{fallback_text, IntroMessage};

pub const IN_PROGRESS_STATUS: &str = "In Progress";
pub const MITIGATED_STATUS: &str = "Mitigated";

#[derive(Debug, Clone, PartialEq, Eq)]
/// A parsed fire command together with who asked and where.
pub struct FireRequest {
    pub command: FireCommand,
    pub requester: ChatUser,
    pub origin_channel: String,
    pub message_ts: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    Acknowledge,
    CreateTicket,
    StartProgress,
    CreateDocuments,
    DescribeTicket,
    CreateChannel,
    SetupChannel,
    Announce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPolicy {
    /// Nothing downstream can run without this step.
    Fatal,
    Recoverable,
}

impl WorkflowStep {
    pub fn policy(&self) -> StepPolicy {
        match self {
            Self::CreateTicket | Self::CreateChannel => StepPolicy::Fatal,
            _ => StepPolicy::Recoverable,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Acknowledge => "acknowledge",
            Self::CreateTicket => "create_ticket",
            Self::StartProgress => "start_progress",
            Self::CreateDocuments => "create_documents",
            Self::DescribeTicket => "describe_ticket",
            Self::CreateChannel => "create_channel",
            Self::SetupChannel => "setup_channel",
            Self::Announce => "announce",
        }
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Completed,
    /// Failed but the workflow went on; `message` is what the requester was told.
    Recovered { message: String },
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("flare workflow step {step} failed: {message}")]
pub struct FatalStepFailure {
    pub step: WorkflowStep,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentIds {
    pub flare_doc_id: Option<String>,
    pub history_doc_id: Option<String>,
}

impl DocumentIds {
    fn is_empty(&self) -> bool {
        self.flare_doc_id.is_none() && self.history_doc_id.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowReport {
    pub steps: Vec<(WorkflowStep, StepOutcome)>,
    pub ticket_key: Option<String>,
    pub channel_id: Option<String>,
    pub documents: DocumentIds,
}

impl WorkflowReport {
    pub fn outcome(&self, step: WorkflowStep) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|(candidate, _)| *candidate == step)
            .map(|(_, outcome)| outcome)
    }
}

struct StepRunner<'a> {
    context: &'a FlareContext,
    request: &'a FireRequest,
    report: WorkflowReport,
}

impl StepRunner<'_> {
    /// Records the result of `step` and applies its policy.
    async fn settle<T>(
        &mut self,
        step: WorkflowStep,
        result: Result<T>,
    ) -> Result<Option<T>, FatalStepFailure> {
        let error = match result {
            Ok(value) => {
                self.report.steps.push((step, StepOutcome::Completed));
                return Ok(Some(value));
            }
            Err(error) => error,
        };

        match step.policy() {
            StepPolicy::Recoverable => {
                warn!(
                    step = step.as_str(),
                    error = %format!("{error:#}"),
                    "workflow-step-failed"
                );
                let message = format!(
                    "{} Continuing anyway. Error: {error:#}",
                    self.recoverable_notice(step)
                );
                self.notify(&message).await;
                self.report
                    .steps
                    .push((step, StepOutcome::Recovered { message }));
                Ok(None)
            }
            StepPolicy::Fatal => {
                error!(
                    step = step.as_str(),
                    error = %format!("{error:#}"),
                    "workflow-step-failed"
                );
                let message = format!("{} Error: {error:#}", self.fatal_notice(step));
                self.notify(&message).await;
                Err(FatalStepFailure { step, message })
            }
        }
    }

    fn skip(&mut self, step: WorkflowStep) {
        self.report.steps.push((step, StepOutcome::Skipped));
    }

    fn ticket_key(&self) -> &str {
        self.report.ticket_key.as_deref().unwrap_or_default()
    }

    fn recoverable_notice(&self, step: WorkflowStep) -> String {
        let ticket_key = self.ticket_key();
        match step {
            WorkflowStep::Acknowledge => "I couldn't acknowledge the flare.".to_string(),
            WorkflowStep::StartProgress => {
                format!("I couldn't update the status of {ticket_key} in Jira.")
            }
            WorkflowStep::CreateDocuments => {
                "I couldn't create the Flare documents, there will be no document links.".to_string()
            }
            WorkflowStep::DescribeTicket => {
                format!("I couldn't update the description of {ticket_key}.")
            }
            WorkflowStep::SetupChannel => format!(
                "I couldn't finish setting up <#{}>.",
                self.report.channel_id.as_deref().unwrap_or_default()
            ),
            WorkflowStep::Announce => "I couldn't announce the flare.".to_string(),
            WorkflowStep::CreateTicket | WorkflowStep::CreateChannel => {
                format!("Step {step} failed.")
            }
        }
    }

    fn fatal_notice(&self, step: WorkflowStep) -> String {
        match step {
            WorkflowStep::CreateTicket => {
                "Sorry! I couldn't create the Jira ticket for this flare. Please create a flare channel manually."
                    .to_string()
            }
            WorkflowStep::CreateChannel => format!(
                "Sorry! I couldn't create the flare channel. Please create #{} manually so it matches {}.",
                self.ticket_key().to_lowercase(),
                self.ticket_key()
            ),
            _ => format!("Sorry! Step {step} failed."),
        }
    }

    /// Best-effort message to the origin channel.
    async fn notify(&self, text: &str) {
        let message = OutboundMessage::text(&self.request.origin_channel, text);
        if let Err(error) = self.context.messaging.post_message(message).await {
            warn!(
                channel_id = self.request.origin_channel.as_str(),
                error = %error,
                "workflow-notice-failed"
            );
        }
    }
}

/// Runs every step for a fire request, in order.
pub async fn run_incident_workflow(
    context: &FlareContext,
    request: &FireRequest,
    now: DateTime<Utc>,
) -> Result<WorkflowReport, FatalStepFailure> {
    let mut runner = StepRunner {
        context,
        request,
        report: WorkflowReport::default(),
    };

    let acknowledged = acknowledge(context, request).await;
    runner.settle(WorkflowStep::Acknowledge, acknowledged).await?;

    let created = create_ticket(context, request).await;
    let Some(ticket_key) = runner.settle(WorkflowStep::CreateTicket, created).await? else {
        return Err(FatalStepFailure {
            step: WorkflowStep::CreateTicket,
            message: "ticket creation returned no key".to_string(),
        });
    };
    runner.report.ticket_key = Some(ticket_key.clone());
    info!(ticket_key = ticket_key.as_str(), "flare-ticket-created");

    let started = start_progress(context, &ticket_key, request.command.special_type).await;
    runner.settle(WorkflowStep::StartProgress, started).await?;

    let mut documents = DocumentIds::default();
    let created = create_documents(context, request, &ticket_key, now, &mut documents).await;
    runner.report.documents = documents.clone();
    runner.settle(WorkflowStep::CreateDocuments, created).await?;

    if documents.is_empty() {
        runner.skip(WorkflowStep::DescribeTicket);
    } else {
        let described = describe_ticket(context, &ticket_key, &documents).await;
        runner.settle(WorkflowStep::DescribeTicket, described).await?;
    }

    let channel_name = ticket_key.to_lowercase();
    let created = context
        .messaging
        .create_channel(&channel_name)
        .await
        .with_context(|| format!("failed to create channel #{channel_name}"));
    let Some(channel_id) = runner.settle(WorkflowStep::CreateChannel, created).await? else {
        return Err(FatalStepFailure {
            step: WorkflowStep::CreateChannel,
            message: "channel creation returned no id".to_string(),
        });
    };
    runner.report.channel_id = Some(channel_id.clone());

    let channel = ChatChannel {
        id: channel_id.clone(),
        name: channel_name,
    };
    let set_up = setup_channel(context, request, &ticket_key, &channel, &documents).await;
    runner.settle(WorkflowStep::SetupChannel, set_up).await?;

    let announced = announce(context, request, &channel_id).await;
    runner.settle(WorkflowStep::Announce, announced).await?;

    info!(
        ticket_key = ticket_key.as_str(),
        channel_id = channel_id.as_str(),
        "flare-fired"
    );
    Ok(runner.report)
}

async fn acknowledge(context: &FlareContext, request: &FireRequest) -> Result<()> {
    let text = match request.command.special_type {
        Some(special_type) => format!(
            "OK, let me quietly set up the Flare documents. Nobody freak out, this is {special_type}."
        ),
        None => "OK, let me get my flaregun".to_string(),
    };
    context
        .messaging
        .post_message(OutboundMessage::text(&request.origin_channel, text))
        .await?;
    Ok(())
}

async fn create_ticket(context: &FlareContext, request: &FireRequest) -> Result<String> {
    let Some(email) = request.requester.email.as_deref() else {
        bail!("user {} has no email address", request.requester.id);
    };
    let Some(account_id) = context.tracker.find_user_by_email(email).await? else {
        bail!("Could not find your JIRA user account");
    };
    let config = &context.config;
    context
        .tracker
        .create_issue(NewIssue {
            project_id: config.jira_project_id.clone(),
            issue_type: config.jira_issue_type.clone(),
            summary: request.command.title.clone(),
            priority_id: request.command.priority.severity_id(),
            assignee_account_id: account_id,
        })
        .await
        .context("Error creating Jira issue")
}

async fn start_progress(
    context: &FlareContext,
    ticket_key: &str,
    special_type: Option<SpecialType>,
) -> Result<()> {
    let tracker = context.tracker.as_ref();
    transition_issue_to(tracker, ticket_key, IN_PROGRESS_STATUS).await?;
    if special_type == Some(SpecialType::Retroactive) {
        transition_issue_to(tracker, ticket_key, MITIGATED_STATUS).await?;
    }
    Ok(())
}

/// Fills `documents` as each copy succeeds so partial ids survive a later failure.
async fn create_documents(
    context: &FlareContext,
    request: &FireRequest,
    ticket_key: &str,
    now: DateTime<Utc>,
    documents: &mut DocumentIds,
) -> Result<()> {
    let config = &context.config;
    let store = context.documents.as_ref();
    let names = document_names(ticket_key, &request.command.title, request.command.special_type);

    let parent_folder = match config.flare_folder_id.as_deref() {
        Some(root_folder_id) => {
            let year = now.with_timezone(&REFERENCE_TIME_ZONE).year().to_string();
            let year_folder_id = match store.find_folder(root_folder_id, &year).await? {
                Some(folder_id) => folder_id,
                None => store.create_folder(root_folder_id, &year).await?,
            };
            Some(store.create_folder(&year_folder_id, ticket_key).await?)
        }
        None => None,
    };

    let flare_doc_id = store
        .copy_template(&config.template_doc_id, &names.flare_doc, parent_folder.as_deref())
        .await
        .context("failed to copy the flare document template")?;
    documents.flare_doc_id = Some(flare_doc_id.clone());
    let history_doc_id = store
        .copy_template(
            &config.history_template_doc_id,
            &names.history_doc,
            parent_folder.as_deref(),
        )
        .await
        .context("failed to copy the slack history template")?;
    documents.history_doc_id = Some(history_doc_id.clone());

    store
        .grant_domain_permission(&flare_doc_id, &config.google_domain)
        .await?;
    store
        .grant_domain_permission(&history_doc_id, &config.google_domain)
        .await?;

    let html = store.export_html(&flare_doc_id).await?;
    let html = substitute_template(
        &html,
        ticket_key,
        now,
        &request.command.title,
        &history_doc_id,
        &names.history_doc,
    );
    store.replace_html(&flare_doc_id, &html).await?;
    Ok(())
}

async fn describe_ticket(
    context: &FlareContext,
    ticket_key: &str,
    documents: &DocumentIds,
) -> Result<()> {
    let description = ticket_description(
        documents.flare_doc_id.as_deref(),
        documents.history_doc_id.as_deref(),
    );
    context
        .tracker
        .edit_issue_fields(ticket_key, json!({ "description": description }))
        .await
}

async fn setup_channel(
    context: &FlareContext,
    request: &FireRequest,
    ticket_key: &str,
    channel: &ChatChannel,
    documents: &DocumentIds,
) -> Result<()> {
    let config = &context.config;
    let messaging = context.messaging.as_ref();
    messaging
        .set_topic(&channel.id, &request.command.title)
        .await?;

    let ticket_url = config.ticket_url(ticket_key);
    let blocks = IntroMessage {
        bot_user_id: &config.bot_user_id,
        ticket_key,
        ticket_url: &ticket_url,
        flare_doc_id: documents.flare_doc_id.as_deref(),
        history_doc_id: documents.history_doc_id.as_deref(),
    }
    .blocks();
    let text = fallback_text(&blocks);
    let posted = messaging
        .post_message(OutboundMessage::text(&channel.id, text).with_blocks(json!(blocks)))
        .await?;
    messaging.pin_message(&channel.id, &posted.ts).await?;

    context
        .channels
        .set_channel(channel.clone(), documents.history_doc_id.clone())
        .await;

    let invitees = invite_list(
        &request.requester.id,
        &config.users_to_invite,
        &config.bot_user_id,
    );
    if !invitees.is_empty() {
        messaging.invite_users(&channel.id, &invitees).await?;
    }
    Ok(())
}

/// Requester first, then the roster; duplicates and the bot itself removed.
pub fn invite_list(requester_id: &str, roster: &[String], bot_user_id: &str) -> Vec<String> {
    let mut invitees: Vec<String> = Vec::new();
    for user_id in std::iter::once(requester_id).chain(roster.iter().map(String::as_str)) {
        let user_id = user_id.trim();
        if user_id.is_empty() || user_id == bot_user_id {
            continue;
        }
        if !invitees.iter().any(|existing| existing == user_id) {
            invitees.push(user_id.to_string());
        }
    }
    invitees
}

async fn announce(context: &FlareContext, request: &FireRequest, channel_id: &str) -> Result<()> {
    let audience = match request.command.special_type {
        Some(_) => format!("<@{}>", request.requester.id),
        None => "<!channel>".to_string(),
    };
    context
        .messaging
        .post_message(OutboundMessage::text(
            &request.origin_channel,
            format!("{audience}: Flare fired. Please visit <#{channel_id}>"),
        ))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests;
