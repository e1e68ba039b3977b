//! PagerDuty REST v2 client backing [`PagingClient`].

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::collaborators::{IncidentFilters, PagedIncident, PagingClient};
use crate::http_client::{HttpClientSettings, RetryingHttpClient};

const PAGERDUTY_ACCEPT: &str = "application/vnd.pagerduty+json;version=2";

#[derive(Debug, Default, Deserialize)]
struct PagerDutyReference {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct PagerDutyAssignment {
    #[serde(default)]
    assignee: Option<PagerDutyReference>,
}

#[derive(Debug, Deserialize)]
struct PagerDutyIncident {
    #[serde(default)]
    title: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    service: PagerDutyReference,
    #[serde(default)]
    assignments: Vec<PagerDutyAssignment>,
}

impl From<PagerDutyIncident> for PagedIncident {
    fn from(incident: PagerDutyIncident) -> Self {
        let assignee = incident
            .assignments
            .into_iter()
            .find_map(|assignment| assignment.assignee)
            .map(|assignee| assignee.summary)
            .filter(|summary| !summary.trim().is_empty());
        Self {
            title: incident.title,
            status: incident.status,
            created_at: incident.created_at,
            updated_at: incident.updated_at,
            service_name: incident.service.summary,
            service_url: incident.service.html_url,
            html_url: incident.html_url,
            assignee,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PagerDutyIncidentList {
    #[serde(default)]
    incidents: Vec<PagerDutyIncident>,
}

#[derive(Clone)]
pub struct PagerDutyClient {
    client: RetryingHttpClient,
    api_base: String,
    api_key: String,
}

impl PagerDutyClient {
    pub fn new(api_base: &str, api_key: &str, settings: HttpClientSettings) -> Result<Self> {
        Ok(Self {
            client: RetryingHttpClient::new("pagerduty", "flarebot-pagerduty", settings)?,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
        })
    }
}

fn incident_query(filters: &IncidentFilters) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    for status in &filters.statuses {
        query.push(("statuses[]", status.clone()));
    }
    for urgency in &filters.urgencies {
        query.push(("urgencies[]", urgency.clone()));
    }
    if let Some(limit) = filters.limit {
        query.push(("limit", limit.to_string()));
    }
    query
}

#[async_trait]
impl PagingClient for PagerDutyClient {
    async fn list_incidents(&self, filters: &IncidentFilters) -> Result<Vec<PagedIncident>> {
        let url = format!("{}/incidents", self.api_base);
        let query = incident_query(filters);
        let listing: PagerDutyIncidentList = self
            .client
            .request_json("list incidents", || {
                self.client
                    .http()
                    .get(&url)
                    .header(
                        reqwest::header::AUTHORIZATION,
                        format!("Token token={}", self.api_key),
                    )
                    .header(reqwest::header::ACCEPT, PAGERDUTY_ACCEPT)
                    .query(&query)
            })
            .await?;
        Ok(listing.incidents.into_iter().map(PagedIncident::from).collect())
    }
}
