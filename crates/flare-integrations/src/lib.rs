//! Narrow collaborator contracts consumed by the Flarebot core, plus the
//! HTTP clients that implement them against Slack, Jira, Google Drive and
//! Sheets, PagerDuty and the deployment-history service.

pub mod collaborators;
pub mod deploy_history_client;
pub mod google_drive_client;
pub mod google_sheets_client;
mod http_client;
pub mod jira_api_client;
pub mod pagerduty_client;
pub mod slack_api_client;

pub use collaborators::*;
pub use deploy_history_client::DeployHistoryClient;
pub use google_drive_client::GoogleDriveClient;
pub use google_sheets_client::GoogleSheetsClient;
pub use http_client::HttpClientSettings;
pub use jira_api_client::JiraApiClient;
pub use pagerduty_client::PagerDutyClient;
pub use slack_api_client::SlackApiClient;
