//! In-memory collaborator fakes that record every call.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use flare_integrations::{
    ChatChannel, ChatUser, Deployment, DeploymentHistoryClient, DocumentStore, IncidentFilters,
    IssueTracker, IssueTransition, MessagingClient, NewIssue, OutboundMessage, PagedIncident,
    PagingClient, PinnedMessage, PostedMessage, ScheduledMessage, SpreadsheetClient,
    TranscriptRow, UserPage,
};
use serde_json::Value;

use crate::directory_cache::{ChannelsCache, UsersCache};
use crate::flare_context::{
    FlareContext, FlareRuntimeConfig, TransitionIdentityPolicy, DEFAULT_COMMS_LEAD_FIELD,
    DEFAULT_ISSUE_TYPE,
};

pub(crate) const BOT: &str = "UBOT";
pub(crate) const INDEX_CHANNEL: &str = "CFLARES";

pub(crate) fn test_config() -> FlareRuntimeConfig {
    FlareRuntimeConfig {
        bot_user_id: BOT.to_string(),
        flares_channel_id: INDEX_CHANNEL.to_string(),
        flares_channel_name: "flares".to_string(),
        flare_channel_prefix: "flare-".to_string(),
        jira_project_id: "10000".to_string(),
        jira_issue_type: DEFAULT_ISSUE_TYPE.to_string(),
        jira_browse_base: "https://jira.example.com/browse".to_string(),
        comms_lead_field: DEFAULT_COMMS_LEAD_FIELD.to_string(),
        template_doc_id: "template-doc".to_string(),
        history_template_doc_id: "template-history".to_string(),
        google_domain: "example.com".to_string(),
        flare_folder_id: None,
        users_to_invite: vec!["UONCALL".to_string(), "UREQ".to_string()],
        identity_policy: TransitionIdentityPolicy::Skip,
        images_dir: None,
    }
}

pub(crate) fn requester() -> ChatUser {
    ChatUser {
        id: "UREQ".to_string(),
        name: "ada".to_string(),
        real_name: Some("Ada Lovelace".to_string()),
        email: Some("ada@example.com".to_string()),
        is_bot: false,
    }
}

#[derive(Default)]
pub(crate) struct Failures(Mutex<HashSet<String>>);

impl Failures {
    pub(crate) fn set(&self, operation: &str) {
        self.0
            .lock()
            .expect("failures lock")
            .insert(operation.to_string());
    }

    fn check(&self, operation: &str) -> Result<()> {
        if self.0.lock().expect("failures lock").contains(operation) {
            bail!("{operation} unavailable");
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeMessaging {
    pub(crate) failures: Failures,
    pub(crate) calls: Mutex<Vec<String>>,
    pub(crate) posts: Mutex<Vec<OutboundMessage>>,
    pub(crate) scheduled: Mutex<Vec<ScheduledMessage>>,
    pub(crate) deleted: Mutex<Vec<(String, String)>>,
    pub(crate) created_channels: Mutex<Vec<String>>,
    pub(crate) topics: Mutex<Vec<(String, String)>>,
    pub(crate) pinned: Mutex<Vec<(String, String)>>,
    pub(crate) invites: Mutex<Vec<(String, Vec<String>)>>,
    pub(crate) users: Mutex<HashMap<String, ChatUser>>,
    pub(crate) channels: Mutex<HashMap<String, ChatChannel>>,
    pub(crate) pins: Mutex<HashMap<String, Vec<PinnedMessage>>>,
    pub(crate) opened_views: Mutex<Vec<Value>>,
    pub(crate) updated_views: Mutex<Vec<(String, Value)>>,
    pub(crate) bot_files: Mutex<Vec<String>>,
    pub(crate) uploads: Mutex<Vec<(String, Vec<u8>)>>,
}

impl FakeMessaging {
    fn record(&self, operation: &str) -> Result<()> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(operation.to_string());
        self.failures.check(operation)
    }

    pub(crate) fn add_user(&self, user: ChatUser) {
        self.users
            .lock()
            .expect("users lock")
            .insert(user.id.clone(), user);
    }

    pub(crate) fn add_channel(&self, id: &str, name: &str) {
        self.channels.lock().expect("channels lock").insert(
            id.to_string(),
            ChatChannel {
                id: id.to_string(),
                name: name.to_string(),
            },
        );
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub(crate) fn posts(&self) -> Vec<OutboundMessage> {
        self.posts.lock().expect("posts lock").clone()
    }

    pub(crate) fn post_texts(&self) -> Vec<String> {
        self.posts()
            .into_iter()
            .map(|message| message.text)
            .collect()
    }
}

#[async_trait]
impl MessagingClient for FakeMessaging {
    async fn post_message(&self, message: OutboundMessage) -> Result<PostedMessage> {
        self.record("chat.postMessage")?;
        let mut posts = self.posts.lock().expect("posts lock");
        posts.push(message.clone());
        Ok(PostedMessage {
            channel: message.channel,
            ts: format!("{}.000100", 1_700_000_000 + posts.len()),
        })
    }

    async fn schedule_message(&self, channel: &str, text: &str, post_at: i64) -> Result<String> {
        self.record("chat.scheduleMessage")?;
        let mut scheduled = self.scheduled.lock().expect("scheduled lock");
        let id = format!("Q{}", scheduled.len() + 1);
        scheduled.push(ScheduledMessage {
            id: id.clone(),
            channel_id: channel.to_string(),
            post_at,
            text: text.to_string(),
        });
        Ok(id)
    }

    async fn list_scheduled_messages(&self, _channel: &str) -> Result<Vec<ScheduledMessage>> {
        self.record("chat.scheduledMessages.list")?;
        Ok(self.scheduled.lock().expect("scheduled lock").clone())
    }

    async fn delete_scheduled_message(
        &self,
        channel: &str,
        scheduled_message_id: &str,
    ) -> Result<()> {
        self.record("chat.deleteScheduledMessage")?;
        self.deleted
            .lock()
            .expect("deleted lock")
            .push((channel.to_string(), scheduled_message_id.to_string()));
        self.scheduled
            .lock()
            .expect("scheduled lock")
            .retain(|message| message.id != scheduled_message_id);
        Ok(())
    }

    async fn create_channel(&self, name: &str) -> Result<String> {
        self.record("conversations.create")?;
        self.created_channels
            .lock()
            .expect("created lock")
            .push(name.to_string());
        let id = format!("C{}", name.to_uppercase().replace('-', ""));
        self.add_channel(&id, name);
        Ok(id)
    }

    async fn set_topic(&self, channel_id: &str, topic: &str) -> Result<()> {
        self.record("conversations.setTopic")?;
        self.topics
            .lock()
            .expect("topics lock")
            .push((channel_id.to_string(), topic.to_string()));
        Ok(())
    }

    async fn pin_message(&self, channel_id: &str, ts: &str) -> Result<()> {
        self.record("pins.add")?;
        self.pinned
            .lock()
            .expect("pinned lock")
            .push((channel_id.to_string(), ts.to_string()));
        Ok(())
    }

    async fn list_pins(&self, channel_id: &str) -> Result<Vec<PinnedMessage>> {
        self.record("pins.list")?;
        Ok(self
            .pins
            .lock()
            .expect("pins lock")
            .get(channel_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn invite_users(&self, channel_id: &str, user_ids: &[String]) -> Result<()> {
        self.record("conversations.invite")?;
        self.invites
            .lock()
            .expect("invites lock")
            .push((channel_id.to_string(), user_ids.to_vec()));
        Ok(())
    }

    async fn lookup_user(&self, user_id: &str) -> Result<ChatUser> {
        self.record("users.info")?;
        match self.users.lock().expect("users lock").get(user_id) {
            Some(user) => Ok(user.clone()),
            None => bail!("user_not_found"),
        }
    }

    async fn list_users(&self, cursor: Option<&str>) -> Result<UserPage> {
        self.record("users.list")?;
        let mut members = self
            .users
            .lock()
            .expect("users lock")
            .values()
            .cloned()
            .collect::<Vec<_>>();
        members.sort_by(|left, right| left.id.cmp(&right.id));
        let middle = members.len() / 2;
        Ok(match cursor {
            None => UserPage {
                members: members[..middle].to_vec(),
                next_cursor: Some("page-2".to_string()),
            },
            Some(_) => UserPage {
                members: members[middle..].to_vec(),
                next_cursor: None,
            },
        })
    }

    async fn lookup_channel(&self, channel_id: &str) -> Result<ChatChannel> {
        self.record("conversations.info")?;
        match self.channels.lock().expect("channels lock").get(channel_id) {
            Some(channel) => Ok(channel.clone()),
            None => bail!("channel_not_found"),
        }
    }

    async fn open_view(&self, _trigger_id: &str, view: Value) -> Result<String> {
        self.record("views.open")?;
        self.opened_views.lock().expect("views lock").push(view);
        Ok("V1".to_string())
    }

    async fn update_view(&self, view_id: &str, view: Value) -> Result<()> {
        self.record("views.update")?;
        self.updated_views
            .lock()
            .expect("views lock")
            .push((view_id.to_string(), view));
        Ok(())
    }

    async fn list_bot_files(&self, _bot_user_id: &str) -> Result<Vec<String>> {
        self.record("files.list")?;
        Ok(self.bot_files.lock().expect("files lock").clone())
    }

    async fn upload_file(&self, filename: &str, bytes: Vec<u8>) -> Result<()> {
        self.record("files.upload")?;
        self.uploads
            .lock()
            .expect("uploads lock")
            .push((filename.to_string(), bytes));
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeTracker {
    pub(crate) failures: Failures,
    pub(crate) calls: Mutex<Vec<String>>,
    pub(crate) accounts: Mutex<HashMap<String, String>>,
    pub(crate) created: Mutex<Vec<NewIssue>>,
    /// (issue key, target status) per applied transition.
    pub(crate) applied: Mutex<Vec<(String, String)>>,
    pub(crate) edits: Mutex<Vec<(String, Value)>>,
}

const TRACKER_TRANSITIONS: [(&str, &str); 3] = [
    ("11", "In Progress"),
    ("21", "Mitigated"),
    ("31", "NotAFlare"),
];

impl FakeTracker {
    fn record(&self, operation: &str) -> Result<()> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(operation.to_string());
        self.failures.check(operation)
    }

    pub(crate) fn add_account(&self, email: &str, account_id: &str) {
        self.accounts
            .lock()
            .expect("accounts lock")
            .insert(email.to_string(), account_id.to_string());
    }

    pub(crate) fn applied(&self) -> Vec<(String, String)> {
        self.applied.lock().expect("applied lock").clone()
    }

    pub(crate) fn edits(&self) -> Vec<(String, Value)> {
        self.edits.lock().expect("edits lock").clone()
    }
}

#[async_trait]
impl IssueTracker for FakeTracker {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<String>> {
        self.record("user.search")?;
        Ok(self.accounts.lock().expect("accounts lock").get(email).cloned())
    }

    async fn create_issue(&self, issue: NewIssue) -> Result<String> {
        self.record("issue.create")?;
        let mut created = self.created.lock().expect("created lock");
        created.push(issue);
        Ok(format!("FLARE-{}", 100 + created.len()))
    }

    async fn available_transitions(&self, _issue_key: &str) -> Result<Vec<IssueTransition>> {
        self.record("issue.transitions")?;
        Ok(TRACKER_TRANSITIONS
            .iter()
            .map(|(id, status)| IssueTransition {
                id: id.to_string(),
                name: status.to_string(),
                to_status: status.to_string(),
            })
            .collect())
    }

    async fn apply_transition(&self, issue_key: &str, transition_id: &str) -> Result<()> {
        self.record("issue.transition")?;
        let status = TRACKER_TRANSITIONS
            .iter()
            .find(|(id, _)| *id == transition_id)
            .map(|(_, status)| status.to_string())
            .unwrap_or_default();
        self.applied
            .lock()
            .expect("applied lock")
            .push((issue_key.to_string(), status));
        Ok(())
    }

    async fn edit_issue_fields(&self, issue_key: &str, fields: Value) -> Result<()> {
        self.record("issue.edit")?;
        self.edits
            .lock()
            .expect("edits lock")
            .push((issue_key.to_string(), fields));
        Ok(())
    }
}

pub(crate) const TEMPLATE_HTML: &str =
    "<h1>[FLARE-KEY]</h1><p>[START-DATE]</p><p>[SUMMARY]</p><p>[HISTORY-DOC]</p><p>[SUMMARY]</p>";

#[derive(Default)]
pub(crate) struct FakeDocuments {
    pub(crate) failures: Failures,
    pub(crate) calls: Mutex<Vec<String>>,
    /// (template id, name, parent folder) per copy.
    pub(crate) copies: Mutex<Vec<(String, String, Option<String>)>>,
    pub(crate) permissions: Mutex<Vec<(String, String)>>,
    pub(crate) folders: Mutex<Vec<(String, String, String)>>,
    pub(crate) replaced: Mutex<Vec<(String, String)>>,
}

impl FakeDocuments {
    fn record(&self, operation: &str) -> Result<()> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(operation.to_string());
        self.failures.check(operation)
    }

    pub(crate) fn add_folder(&self, parent: &str, name: &str, id: &str) {
        self.folders.lock().expect("folders lock").push((
            parent.to_string(),
            name.to_string(),
            id.to_string(),
        ));
    }
}

#[async_trait]
impl DocumentStore for FakeDocuments {
    async fn copy_template(
        &self,
        template_id: &str,
        name: &str,
        parent_folder_id: Option<&str>,
    ) -> Result<String> {
        self.record(&format!("copy:{template_id}"))?;
        let mut copies = self.copies.lock().expect("copies lock");
        copies.push((
            template_id.to_string(),
            name.to_string(),
            parent_folder_id.map(str::to_string),
        ));
        Ok(format!("doc-{}", copies.len()))
    }

    async fn grant_domain_permission(&self, document_id: &str, domain: &str) -> Result<()> {
        self.record("permission")?;
        self.permissions
            .lock()
            .expect("permissions lock")
            .push((document_id.to_string(), domain.to_string()));
        Ok(())
    }

    async fn export_html(&self, _document_id: &str) -> Result<String> {
        self.record("export")?;
        Ok(TEMPLATE_HTML.to_string())
    }

    async fn replace_html(&self, document_id: &str, html: &str) -> Result<()> {
        self.record("replace")?;
        self.replaced
            .lock()
            .expect("replaced lock")
            .push((document_id.to_string(), html.to_string()));
        Ok(())
    }

    async fn find_folder(&self, parent_folder_id: &str, name: &str) -> Result<Option<String>> {
        self.record("find_folder")?;
        Ok(self
            .folders
            .lock()
            .expect("folders lock")
            .iter()
            .find(|(parent, folder, _)| parent == parent_folder_id && folder == name)
            .map(|(_, _, id)| id.clone()))
    }

    async fn create_folder(&self, parent_folder_id: &str, name: &str) -> Result<String> {
        self.record("create_folder")?;
        let id = format!("folder-{name}");
        self.add_folder(parent_folder_id, name, &id);
        Ok(id)
    }
}

#[derive(Default)]
pub(crate) struct FakeSheets {
    pub(crate) failures: Failures,
    pub(crate) rows: Mutex<Vec<(String, String, TranscriptRow)>>,
}

impl FakeSheets {
    pub(crate) fn rows(&self) -> Vec<(String, String, TranscriptRow)> {
        self.rows.lock().expect("rows lock").clone()
    }
}

#[async_trait]
impl SpreadsheetClient for FakeSheets {
    async fn append_row(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
        row: TranscriptRow,
    ) -> Result<()> {
        self.failures.check("append")?;
        self.rows.lock().expect("rows lock").push((
            spreadsheet_id.to_string(),
            sheet_name.to_string(),
            row,
        ));
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakePaging {
    pub(crate) failures: Failures,
    pub(crate) incidents: Mutex<Vec<PagedIncident>>,
}

#[async_trait]
impl PagingClient for FakePaging {
    async fn list_incidents(&self, _filters: &IncidentFilters) -> Result<Vec<PagedIncident>> {
        self.failures.check("incidents")?;
        Ok(self.incidents.lock().expect("incidents lock").clone())
    }
}

#[derive(Default)]
pub(crate) struct FakeDeployments {
    pub(crate) failures: Failures,
    pub(crate) requested: Mutex<Vec<(String, usize)>>,
    pub(crate) deployments: Mutex<Vec<Deployment>>,
}

#[async_trait]
impl DeploymentHistoryClient for FakeDeployments {
    async fn list_recent_deployments(&self, env: &str, limit: usize) -> Result<Vec<Deployment>> {
        self.failures.check("deployments")?;
        self.requested
            .lock()
            .expect("requested lock")
            .push((env.to_string(), limit));
        Ok(self.deployments.lock().expect("deployments lock").clone())
    }
}

pub(crate) struct Harness {
    pub(crate) messaging: Arc<FakeMessaging>,
    pub(crate) tracker: Arc<FakeTracker>,
    pub(crate) documents: Arc<FakeDocuments>,
    pub(crate) sheets: Arc<FakeSheets>,
    pub(crate) paging: Arc<FakePaging>,
    pub(crate) deployments: Arc<FakeDeployments>,
    pub(crate) context: Arc<FlareContext>,
}

pub(crate) fn harness() -> Harness {
    harness_with_config(test_config())
}

pub(crate) fn harness_with_config(config: FlareRuntimeConfig) -> Harness {
    let messaging = Arc::new(FakeMessaging::default());
    let tracker = Arc::new(FakeTracker::default());
    let documents = Arc::new(FakeDocuments::default());
    let sheets = Arc::new(FakeSheets::default());
    let paging = Arc::new(FakePaging::default());
    let deployments = Arc::new(FakeDeployments::default());
    messaging.add_user(requester());
    messaging.add_channel(INDEX_CHANNEL, "flares");
    tracker.add_account("ada@example.com", "acct-ada");
    let channels = ChannelsCache::new(&config.flare_channel_prefix);
    let context = Arc::new(FlareContext {
        config,
        messaging: messaging.clone(),
        tracker: tracker.clone(),
        documents: documents.clone(),
        spreadsheets: sheets.clone(),
        paging: paging.clone(),
        deployments: deployments.clone(),
        users: UsersCache::default(),
        channels,
    });
    Harness {
        messaging,
        tracker,
        documents,
        sheets,
        paging,
        deployments,
        context,
    }
}
