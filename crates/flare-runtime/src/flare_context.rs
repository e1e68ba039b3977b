//! Explicitly constructed runtime dependencies shared by every handler.

use std::path::PathBuf;
use std::sync::Arc;

use flare_commands::CommandScope;
use flare_integrations::{
    ChatChannel, DeploymentHistoryClient, DocumentStore, IssueTracker, MessagingClient,
    PagingClient, SpreadsheetClient,
};

use crate::directory_cache::{ChannelsCache, UsersCache};

pub const DEFAULT_COMMS_LEAD_FIELD: &str = "customfield_11405";
pub const DEFAULT_ISSUE_TYPE: &str = "Bug";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Whether a lifecycle transition first checks the requester has a tracker account.
pub enum TransitionIdentityPolicy {
    #[default]
    Skip,
    RequireTrackerAccount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlareRuntimeConfig {
    pub bot_user_id: String,
    pub flares_channel_id: String,
    pub flares_channel_name: String,
    pub flare_channel_prefix: String,
    pub jira_project_id: String,
    pub jira_issue_type: String,
    /// `https://<site>/browse`, used to link tickets.
    pub jira_browse_base: String,
    pub comms_lead_field: String,
    pub template_doc_id: String,
    pub history_template_doc_id: String,
    pub google_domain: String,
    pub flare_folder_id: Option<String>,
    pub users_to_invite: Vec<String>,
    pub identity_policy: TransitionIdentityPolicy,
    pub images_dir: Option<PathBuf>,
}

impl FlareRuntimeConfig {
    /// Command scope of `channel`, or `None` when the bot must not answer there.
    pub fn command_scope(&self, channel: &ChatChannel) -> Option<CommandScope> {
        if channel.name == self.flares_channel_name {
            return Some(CommandScope::IndexChannel);
        }
        if !self.flare_channel_prefix.is_empty()
            && channel.name.starts_with(&self.flare_channel_prefix)
        {
            return Some(CommandScope::FlareChannel);
        }
        None
    }

    pub fn ticket_url(&self, ticket_key: &str) -> String {
        format!("{}/{ticket_key}", self.jira_browse_base.trim_end_matches('/'))
    }
}

/// Everything a handler needs; built once at startup and shared by `Arc`.
pub struct FlareContext {
    pub config: FlareRuntimeConfig,
    pub messaging: Arc<dyn MessagingClient>,
    pub tracker: Arc<dyn IssueTracker>,
    pub documents: Arc<dyn DocumentStore>,
    pub spreadsheets: Arc<dyn SpreadsheetClient>,
    pub paging: Arc<dyn PagingClient>,
    pub deployments: Arc<dyn DeploymentHistoryClient>,
    pub users: UsersCache,
    pub channels: ChannelsCache,
}

/// Ticket key for a flare channel: the channel name upper-cased.
pub fn ticket_key_for_channel(channel: &ChatChannel) -> String {
    channel.name.to_uppercase()
}
