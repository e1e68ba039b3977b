//! Jira Cloud REST v3 client backing [`IssueTracker`].

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::collaborators::{IssueTracker, IssueTransition, NewIssue};
use crate::http_client::{HttpClientSettings, RetryingHttpClient};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JiraUserRecord {
    account_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JiraCreatedIssue {
    key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JiraStatusRecord {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct JiraTransitionRecord {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    to: Option<JiraStatusRecord>,
}

#[derive(Debug, Deserialize)]
struct JiraTransitionsBody {
    #[serde(default)]
    transitions: Vec<JiraTransitionRecord>,
}

#[derive(Clone)]
pub struct JiraApiClient {
    client: RetryingHttpClient,
    origin: String,
    username: String,
    api_token: String,
}

impl JiraApiClient {
    pub fn new(
        origin: &str,
        username: &str,
        api_token: &str,
        settings: HttpClientSettings,
    ) -> Result<Self> {
        Ok(Self {
            client: RetryingHttpClient::new("jira", "flarebot-jira", settings)?,
            origin: origin.trim_end_matches('/').to_string(),
            username: username.trim().to_string(),
            api_token: api_token.trim().to_string(),
        })
    }

    fn issue_url(&self, issue_key: &str) -> String {
        format!("{}/rest/api/3/issue/{issue_key}", self.origin)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .basic_auth(&self.username, Some(&self.api_token))
            .header(reqwest::header::ACCEPT, "application/json")
    }
}

/// Request body for `POST /rest/api/3/issue`.
fn create_issue_payload(issue: &NewIssue) -> Value {
    json!({
        "fields": {
            "summary": issue.summary,
            "issuetype": { "name": issue.issue_type },
            "project": { "id": issue.project_id },
            "priority": { "id": issue.priority_id },
            "assignee": { "id": issue.assignee_account_id },
        }
    })
}

#[async_trait]
impl IssueTracker for JiraApiClient {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<String>> {
        let url = format!("{}/rest/api/3/user/search", self.origin);
        let users: Vec<JiraUserRecord> = self
            .client
            .request_json("user search", || {
                self.authorized(self.client.http().get(&url).query(&[("query", email)]))
            })
            .await?;
        Ok(users.into_iter().find_map(|user| user.account_id))
    }

    async fn create_issue(&self, issue: NewIssue) -> Result<String> {
        let url = format!("{}/rest/api/3/issue", self.origin);
        let payload = create_issue_payload(&issue);
        let created: JiraCreatedIssue = self
            .client
            .request_json("create issue", || {
                self.authorized(self.client.http().post(&url).json(&payload))
            })
            .await?;
        created
            .key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| anyhow!("jira create issue response missing key"))
    }

    async fn available_transitions(&self, issue_key: &str) -> Result<Vec<IssueTransition>> {
        let url = format!("{}/transitions", self.issue_url(issue_key));
        let body: JiraTransitionsBody = self
            .client
            .request_json("get transitions", || {
                self.authorized(self.client.http().get(&url))
            })
            .await?;
        Ok(body
            .transitions
            .into_iter()
            .map(|transition| IssueTransition {
                id: transition.id,
                name: transition.name,
                to_status: transition.to.map(|status| status.name).unwrap_or_default(),
            })
            .collect())
    }

    async fn apply_transition(&self, issue_key: &str, transition_id: &str) -> Result<()> {
        let url = format!("{}/transitions", self.issue_url(issue_key));
        let payload = json!({ "transition": { "id": transition_id } });
        self.client
            .request_empty("do transition", || {
                self.authorized(self.client.http().post(&url).json(&payload))
            })
            .await
    }

    async fn edit_issue_fields(&self, issue_key: &str, fields: Value) -> Result<()> {
        let url = self.issue_url(issue_key);
        let payload = json!({ "fields": fields });
        self.client
            .request_empty("edit issue", || {
                self.authorized(self.client.http().put(&url).json(&payload))
            })
            .await
    }
}
