//! Google Drive v3 client backing [`DocumentStore`].
//!
//! Authenticates with a pre-minted OAuth bearer token. Every call sets
//! `supportsAllDrives` so templates and folders may live on a shared drive.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::collaborators::DocumentStore;
use crate::http_client::{HttpClientSettings, RetryingHttpClient};

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
const HTML_MIME_TYPE: &str = "text/html";

#[derive(Debug, Deserialize)]
struct DriveFileRecord {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFileRecord>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Clone)]
pub struct GoogleDriveClient {
    client: RetryingHttpClient,
    api_base: String,
    access_token: String,
    shared_drive_id: Option<String>,
}

impl GoogleDriveClient {
    pub fn new(
        api_base: &str,
        access_token: &str,
        shared_drive_id: Option<String>,
        settings: HttpClientSettings,
    ) -> Result<Self> {
        Ok(Self {
            client: RetryingHttpClient::new("google drive", "flarebot-drive", settings)?,
            api_base: api_base.trim_end_matches('/').to_string(),
            access_token: access_token.trim().to_string(),
            shared_drive_id: shared_drive_id.filter(|value| !value.trim().is_empty()),
        })
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.api_base)
    }

    async fn create_file(&self, operation: &str, url: &str, payload: &Value) -> Result<String> {
        let created: DriveFileRecord = self
            .client
            .request_json(operation, || {
                self.client
                    .http()
                    .post(url)
                    .bearer_auth(&self.access_token)
                    .query(&[("supportsAllDrives", "true")])
                    .json(payload)
            })
            .await?;
        created
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| anyhow!("google drive {operation} response missing id"))
    }
}

#[async_trait]
impl DocumentStore for GoogleDriveClient {
    async fn copy_template(
        &self,
        template_id: &str,
        name: &str,
        parent_folder_id: Option<&str>,
    ) -> Result<String> {
        let mut payload = json!({ "name": name });
        if let Some(parent) = parent_folder_id {
            payload["parents"] = json!([parent]);
        }
        let url = format!("{}/{template_id}/copy", self.files_url());
        self.create_file("copy file", &url, &payload).await
    }

    async fn grant_domain_permission(&self, document_id: &str, domain: &str) -> Result<()> {
        let url = format!("{}/{document_id}/permissions", self.files_url());
        let payload = json!({ "role": "writer", "type": "domain", "domain": domain });
        self.client
            .request_empty("create permission", || {
                self.client
                    .http()
                    .post(&url)
                    .bearer_auth(&self.access_token)
                    .query(&[("supportsAllDrives", "true")])
                    .json(&payload)
            })
            .await
    }

    async fn export_html(&self, document_id: &str) -> Result<String> {
        let url = format!("{}/{document_id}/export", self.files_url());
        self.client
            .request_text("export file", || {
                self.client
                    .http()
                    .get(&url)
                    .bearer_auth(&self.access_token)
                    .query(&[("mimeType", HTML_MIME_TYPE)])
            })
            .await
    }

    async fn replace_html(&self, document_id: &str, html: &str) -> Result<()> {
        let url = format!("{}/upload/drive/v3/files/{document_id}", self.api_base);
        self.client
            .request_empty("update file", || {
                self.client
                    .http()
                    .patch(&url)
                    .bearer_auth(&self.access_token)
                    .query(&[("uploadType", "media"), ("supportsAllDrives", "true")])
                    .header(reqwest::header::CONTENT_TYPE, HTML_MIME_TYPE)
                    .body(html.to_string())
            })
            .await
    }

    async fn find_folder(&self, parent_folder_id: &str, name: &str) -> Result<Option<String>> {
        let url = self.files_url();
        let q = format!("'{parent_folder_id}' in parents and trashed=false");
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![
                ("q", q.clone()),
                ("supportsAllDrives", "true".to_string()),
                ("includeItemsFromAllDrives", "true".to_string()),
                ("fields", "nextPageToken,files(id,name)".to_string()),
            ];
            if let Some(drive_id) = self.shared_drive_id.as_ref() {
                query.push(("driveId", drive_id.clone()));
                query.push(("corpora", "drive".to_string()));
            }
            if let Some(token) = page_token.as_ref() {
                query.push(("pageToken", token.clone()));
            }
            let listing: DriveFileList = self
                .client
                .request_json("list files", || {
                    self.client
                        .http()
                        .get(&url)
                        .bearer_auth(&self.access_token)
                        .query(&query)
                })
                .await?;
            if let Some(found) = listing
                .files
                .into_iter()
                .find(|file| file.name.as_deref() == Some(name))
            {
                return Ok(found.id);
            }
            page_token = listing.next_page_token.filter(|token| !token.is_empty());
            if page_token.is_none() {
                return Ok(None);
            }
        }
    }

    async fn create_folder(&self, parent_folder_id: &str, name: &str) -> Result<String> {
        let payload = json!({
            "name": name,
            "parents": [parent_folder_id],
            "mimeType": FOLDER_MIME_TYPE,
        });
        let url = self.files_url();
        self.create_file("create folder", &url, &payload).await
    }
}
