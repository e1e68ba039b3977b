//! Google Sheets v4 client backing [`SpreadsheetClient`].

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::collaborators::{SpreadsheetClient, TranscriptRow};
use crate::http_client::{HttpClientSettings, RetryingHttpClient};

#[derive(Clone)]
pub struct GoogleSheetsClient {
    client: RetryingHttpClient,
    api_base: String,
    access_token: String,
}

impl GoogleSheetsClient {
    pub fn new(api_base: &str, access_token: &str, settings: HttpClientSettings) -> Result<Self> {
        Ok(Self {
            client: RetryingHttpClient::new("google sheets", "flarebot-sheets", settings)?,
            api_base: api_base.trim_end_matches('/').to_string(),
            access_token: access_token.trim().to_string(),
        })
    }
}

#[async_trait]
impl SpreadsheetClient for GoogleSheetsClient {
    async fn append_row(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
        row: TranscriptRow,
    ) -> Result<()> {
        let url = format!(
            "{}/v4/spreadsheets/{spreadsheet_id}/values/{sheet_name}:append",
            self.api_base
        );
        let payload = json!({
            "majorDimension": "ROWS",
            "values": [row.to_values()],
        });
        let _: Value = self
            .client
            .request_json("append values", || {
                self.client
                    .http()
                    .post(&url)
                    .bearer_auth(&self.access_token)
                    .query(&[
                        ("valueInputOption", "USER_ENTERED"),
                        ("insertDataOption", "INSERT_ROWS"),
                    ])
                    .json(&payload)
            })
            .await?;
        Ok(())
    }
}
