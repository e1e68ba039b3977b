//! Collaborator traits and the data shapes that cross them.
//!
//! The workflow, state machine and dispatch layer only ever see these traits,
//! so tests can swap every external service for an in-memory fake.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
/// A chat message to post, optionally with Block Kit blocks and a thread.
pub struct OutboundMessage {
    pub channel: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
}

impl OutboundMessage {
    pub fn text(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            text: text.into(),
            blocks: None,
            thread_ts: None,
        }
    }

    pub fn in_thread(mut self, thread_ts: impl Into<String>) -> Self {
        self.thread_ts = Some(thread_ts.into());
        self
    }

    pub fn with_blocks(mut self, blocks: Value) -> Self {
        self.blocks = Some(blocks);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub channel: String,
    pub ts: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScheduledMessage {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub post_at: i64,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatUser {
    pub id: String,
    pub name: String,
    pub real_name: Option<String>,
    pub email: Option<String>,
    pub is_bot: bool,
}

impl ChatUser {
    /// Real name, then handle, then id.
    pub fn display_name(&self) -> &str {
        match self.real_name.as_deref() {
            Some(real_name) if !real_name.trim().is_empty() => real_name,
            _ if !self.name.trim().is_empty() => self.name.as_str(),
            _ => self.id.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatChannel {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct UserPage {
    pub members: Vec<ChatUser>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PinnedMessage {
    pub item_type: String,
    pub created_by: Option<String>,
    pub text: String,
    pub blocks: Vec<Value>,
}

#[async_trait]
/// Chat platform operations used by the core.
pub trait MessagingClient: Send + Sync {
    async fn post_message(&self, message: OutboundMessage) -> Result<PostedMessage>;
    /// Schedules `text` for `post_at` (epoch seconds); returns the scheduled id.
    async fn schedule_message(&self, channel: &str, text: &str, post_at: i64) -> Result<String>;
    async fn list_scheduled_messages(&self, channel: &str) -> Result<Vec<ScheduledMessage>>;
    async fn delete_scheduled_message(&self, channel: &str, scheduled_message_id: &str)
        -> Result<()>;
    async fn create_channel(&self, name: &str) -> Result<String>;
    async fn set_topic(&self, channel_id: &str, topic: &str) -> Result<()>;
    async fn pin_message(&self, channel_id: &str, ts: &str) -> Result<()>;
    async fn list_pins(&self, channel_id: &str) -> Result<Vec<PinnedMessage>>;
    async fn invite_users(&self, channel_id: &str, user_ids: &[String]) -> Result<()>;
    async fn lookup_user(&self, user_id: &str) -> Result<ChatUser>;
    async fn list_users(&self, cursor: Option<&str>) -> Result<UserPage>;
    async fn lookup_channel(&self, channel_id: &str) -> Result<ChatChannel>;
    /// Opens a modal for `trigger_id`; returns the view id.
    async fn open_view(&self, trigger_id: &str, view: Value) -> Result<String>;
    async fn update_view(&self, view_id: &str, view: Value) -> Result<()>;
    /// File names the bot user has already uploaded.
    async fn list_bot_files(&self, bot_user_id: &str) -> Result<Vec<String>>;
    async fn upload_file(&self, filename: &str, bytes: Vec<u8>) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewIssue {
    pub project_id: String,
    pub issue_type: String,
    pub summary: String,
    pub priority_id: String,
    pub assignee_account_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueTransition {
    pub id: String,
    pub name: String,
    /// Name of the status the transition leads to.
    pub to_status: String,
}

#[async_trait]
/// Issue-tracker operations used by the core.
pub trait IssueTracker: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<String>>;
    async fn create_issue(&self, issue: NewIssue) -> Result<String>;
    async fn available_transitions(&self, issue_key: &str) -> Result<Vec<IssueTransition>>;
    async fn apply_transition(&self, issue_key: &str, transition_id: &str) -> Result<()>;
    async fn edit_issue_fields(&self, issue_key: &str, fields: Value) -> Result<()>;
}

/// Moves `issue_key` to `target_status` through whichever transition leads there.
pub async fn transition_issue_to(
    tracker: &dyn IssueTracker,
    issue_key: &str,
    target_status: &str,
) -> Result<()> {
    let transitions = tracker.available_transitions(issue_key).await?;
    let Some(transition) = transitions
        .iter()
        .find(|transition| transition.to_status == target_status)
    else {
        let allowed = transitions
            .iter()
            .map(|transition| transition.to_status.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        bail!(
            "Jira transition \"{target_status}\" not found. Allowed transitions for current status: [{allowed}]"
        );
    };
    tracker.apply_transition(issue_key, &transition.id).await
}

#[async_trait]
/// Document-store operations used to build the per-incident documents.
pub trait DocumentStore: Send + Sync {
    async fn copy_template(
        &self,
        template_id: &str,
        name: &str,
        parent_folder_id: Option<&str>,
    ) -> Result<String>;
    async fn grant_domain_permission(&self, document_id: &str, domain: &str) -> Result<()>;
    async fn export_html(&self, document_id: &str) -> Result<String>;
    async fn replace_html(&self, document_id: &str, html: &str) -> Result<()>;
    async fn find_folder(&self, parent_folder_id: &str, name: &str) -> Result<Option<String>>;
    async fn create_folder(&self, parent_folder_id: &str, name: &str) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One transcript line: raw ts, localized time, author, message.
pub struct TranscriptRow {
    pub ts: String,
    pub localized_time: String,
    pub author: String,
    pub message: String,
}

impl TranscriptRow {
    pub fn to_values(&self) -> Vec<String> {
        vec![
            self.ts.clone(),
            self.localized_time.clone(),
            self.author.clone(),
            self.message.clone(),
        ]
    }
}

#[async_trait]
pub trait SpreadsheetClient: Send + Sync {
    async fn append_row(&self, spreadsheet_id: &str, sheet_name: &str, row: TranscriptRow)
        -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IncidentFilters {
    pub statuses: Vec<String>,
    pub urgencies: Vec<String>,
    pub limit: Option<usize>,
}

impl IncidentFilters {
    /// Incidents that are triggered or acknowledged.
    pub fn unresolved() -> Self {
        Self {
            statuses: vec!["triggered".to_string(), "acknowledged".to_string()],
            urgencies: Vec::new(),
            limit: Some(100),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagedIncident {
    pub title: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub service_name: String,
    pub service_url: String,
    pub html_url: String,
    pub assignee: Option<String>,
}

#[async_trait]
pub trait PagingClient: Send + Sync {
    async fn list_incidents(&self, filters: &IncidentFilters) -> Result<Vec<PagedIncident>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Deployment {
    pub id: String,
    pub created_at: Option<String>,
    pub owner: Option<String>,
    pub build_ref: Option<String>,
    pub config_ref: Option<String>,
    pub repo: Option<String>,
    pub application: Option<String>,
}

#[async_trait]
pub trait DeploymentHistoryClient: Send + Sync {
    async fn list_recent_deployments(&self, env: &str, limit: usize) -> Result<Vec<Deployment>>;
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::Value;

    use super::{transition_issue_to, ChatUser, IssueTracker, IssueTransition, NewIssue};

    #[derive(Default)]
    struct RecordingTracker {
        applied: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl IssueTracker for RecordingTracker {
        async fn find_user_by_email(&self, _email: &str) -> Result<Option<String>> {
            Ok(None)
        }
        async fn create_issue(&self, _issue: NewIssue) -> Result<String> {
            Ok("FLARE-1".to_string())
        }
        async fn available_transitions(&self, _issue_key: &str) -> Result<Vec<IssueTransition>> {
            Ok(vec![
                IssueTransition {
                    id: "11".to_string(),
                    name: "Start Progress".to_string(),
                    to_status: "In Progress".to_string(),
                },
                IssueTransition {
                    id: "21".to_string(),
                    name: "Mitigate".to_string(),
                    to_status: "Mitigated".to_string(),
                },
            ])
        }
        async fn apply_transition(&self, issue_key: &str, transition_id: &str) -> Result<()> {
            self.applied
                .lock()
                .expect("applied lock")
                .push((issue_key.to_string(), transition_id.to_string()));
            Ok(())
        }
        async fn edit_issue_fields(&self, _issue_key: &str, _fields: Value) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn functional_transition_issue_to_resolves_transition_by_target_status() {
        let tracker = RecordingTracker::default();
        transition_issue_to(&tracker, "FLARE-7", "Mitigated")
            .await
            .expect("transition");
        assert_eq!(
            tracker.applied.lock().expect("applied lock").as_slice(),
            &[("FLARE-7".to_string(), "21".to_string())]
        );
    }

    #[tokio::test]
    async fn regression_transition_issue_to_lists_allowed_statuses_when_missing() {
        let tracker = RecordingTracker::default();
        let error = transition_issue_to(&tracker, "FLARE-7", "NotAFlare")
            .await
            .expect_err("missing transition");
        let message = error.to_string();
        assert!(message.contains("\"NotAFlare\" not found"));
        assert!(message.contains("[In Progress, Mitigated]"));
        assert!(tracker.applied.lock().expect("applied lock").is_empty());
    }

    #[test]
    fn unit_chat_user_display_name_falls_back_to_handle_then_id() {
        let mut user = ChatUser {
            id: "U1".to_string(),
            name: "ada".to_string(),
            real_name: Some("Ada Lovelace".to_string()),
            ..ChatUser::default()
        };
        assert_eq!(user.display_name(), "Ada Lovelace");
        user.real_name = None;
        assert_eq!(user.display_name(), "ada");
        user.name.clear();
        assert_eq!(user.display_name(), "U1");
    }
}
