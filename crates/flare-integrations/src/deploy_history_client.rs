//! Deployment-history service client backing [`DeploymentHistoryClient`].

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::collaborators::{Deployment, DeploymentHistoryClient};
use crate::http_client::{HttpClientSettings, RetryingHttpClient};

#[derive(Debug, Deserialize)]
struct EnvProviderRecord {
    #[serde(default)]
    repo: Option<String>,
    #[serde(rename = "ref", default)]
    config_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeploymentRecord {
    #[serde(default)]
    id: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    build: Option<String>,
    #[serde(default)]
    application: Option<String>,
    #[serde(default)]
    env_provider: Option<EnvProviderRecord>,
}

impl From<DeploymentRecord> for Deployment {
    fn from(record: DeploymentRecord) -> Self {
        let (repo, config_ref) = match record.env_provider {
            Some(provider) => (provider.repo, provider.config_ref),
            None => (None, None),
        };
        Self {
            id: record.id,
            created_at: record.created_at,
            owner: record.owner,
            build_ref: record.build,
            config_ref,
            repo,
            application: record.application,
        }
    }
}

#[derive(Clone)]
pub struct DeployHistoryClient {
    client: RetryingHttpClient,
    api_base: String,
    token: Option<String>,
}

impl DeployHistoryClient {
    pub fn new(api_base: &str, token: Option<String>, settings: HttpClientSettings) -> Result<Self> {
        Ok(Self {
            client: RetryingHttpClient::new("deploy history", "flarebot-deploys", settings)?,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.filter(|value| !value.trim().is_empty()),
        })
    }
}

#[async_trait]
impl DeploymentHistoryClient for DeployHistoryClient {
    async fn list_recent_deployments(&self, env: &str, limit: usize) -> Result<Vec<Deployment>> {
        let url = format!("{}/v2/deployments", self.api_base);
        let limit = limit.to_string();
        let records: Vec<DeploymentRecord> = self
            .client
            .request_json("list deployments", || {
                let request = self
                    .client
                    .http()
                    .get(&url)
                    .query(&[("env", env), ("limit", limit.as_str())]);
                match self.token.as_deref() {
                    Some(token) => request.bearer_auth(token),
                    None => request,
                }
            })
            .await?;
        Ok(records.into_iter().map(Deployment::from).collect())
    }
}
