use std::path::PathBuf;

use clap::{ArgAction, Parser};

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "flarebot",
    about = "Incident-response chat assistant that fires and tracks flares",
    version
)]
pub struct Cli {
    #[arg(
        long = "slack-bot-token",
        env = "SLACK_BOT_TOKEN",
        hide_env_values = true,
        help = "Slack bot token for Web API calls (xoxb-...)"
    )]
    pub slack_bot_token: String,

    #[arg(
        long = "slack-app-token",
        env = "SLACK_APP_TOKEN",
        hide_env_values = true,
        help = "Slack Socket Mode app token (xapp-...)"
    )]
    pub slack_app_token: String,

    #[arg(
        long = "slack-api-base",
        env = "FLAREBOT_SLACK_API_BASE",
        default_value = "https://slack.com/api",
        help = "Slack Web API base URL"
    )]
    pub slack_api_base: String,

    #[arg(
        long = "flares-channel-id",
        env = "FLARES_CHANNEL_ID",
        help = "Channel id of the index channel where flares are fired and announced"
    )]
    pub flares_channel_id: String,

    #[arg(
        long = "flares-channel-name",
        env = "FLARES_CHANNEL_NAME",
        default_value = "flares",
        help = "Channel name of the index channel"
    )]
    pub flares_channel_name: String,

    #[arg(
        long = "flare-channel-prefix",
        env = "FLARE_CHANNEL_PREFIX",
        default_value = "flare-",
        help = "Name prefix shared by every per-incident flare channel"
    )]
    pub flare_channel_prefix: String,

    #[arg(
        long = "users-to-invite",
        env = "USERS_TO_INVITE",
        default_value = "",
        help = "Comma-separated user ids invited to every new flare channel"
    )]
    pub users_to_invite: String,

    #[arg(
        long = "jira-origin",
        env = "JIRA_ORIGIN",
        help = "Jira site origin, for example https://example.atlassian.net"
    )]
    pub jira_origin: String,

    #[arg(long = "jira-username", env = "JIRA_USERNAME", help = "Jira API user")]
    pub jira_username: String,

    #[arg(
        long = "jira-password",
        env = "JIRA_PASSWORD",
        hide_env_values = true,
        help = "Jira API token for --jira-username"
    )]
    pub jira_password: String,

    #[arg(
        long = "jira-project-id",
        env = "JIRA_PROJECT_ID",
        help = "Numeric id of the Jira project flare tickets are created in"
    )]
    pub jira_project_id: String,

    #[arg(
        long = "jira-issue-type",
        env = "JIRA_ISSUE_TYPE",
        default_value = flare_runtime::DEFAULT_ISSUE_TYPE,
        help = "Issue type name for flare tickets"
    )]
    pub jira_issue_type: String,

    #[arg(
        long = "jira-comms-lead-field",
        env = "JIRA_COMMS_LEAD_FIELD",
        default_value = flare_runtime::DEFAULT_COMMS_LEAD_FIELD,
        help = "Custom field id that stores the comms lead"
    )]
    pub jira_comms_lead_field: String,

    #[arg(
        long = "google-access-token",
        env = "GOOGLE_ACCESS_TOKEN",
        hide_env_values = true,
        help = "OAuth bearer token for Google Drive and Sheets"
    )]
    pub google_access_token: String,

    #[arg(
        long = "google-domain",
        env = "GOOGLE_DOMAIN",
        help = "Domain granted write access to new flare documents"
    )]
    pub google_domain: String,

    #[arg(
        long = "google-template-doc-id",
        env = "GOOGLE_TEMPLATE_DOC_ID",
        help = "Drive id of the flare document template"
    )]
    pub google_template_doc_id: String,

    #[arg(
        long = "google-slack-history-doc-id",
        env = "GOOGLE_SLACK_HISTORY_DOC_ID",
        help = "Drive id of the channel-history spreadsheet template"
    )]
    pub google_slack_history_doc_id: String,

    #[arg(
        long = "google-flare-folder-id",
        env = "GOOGLE_FLARE_FOLDER_ID",
        help = "Optional Drive folder that receives per-year flare folders"
    )]
    pub google_flare_folder_id: Option<String>,

    #[arg(
        long = "google-shared-drive-id",
        env = "GOOGLE_SHARED_DRIVE_ID",
        help = "Optional shared drive searched when looking up folders"
    )]
    pub google_shared_drive_id: Option<String>,

    #[arg(
        long = "google-drive-api-base",
        env = "FLAREBOT_GOOGLE_DRIVE_API_BASE",
        default_value = "https://www.googleapis.com",
        help = "Google Drive API base URL"
    )]
    pub google_drive_api_base: String,

    #[arg(
        long = "google-sheets-api-base",
        env = "FLAREBOT_GOOGLE_SHEETS_API_BASE",
        default_value = "https://sheets.googleapis.com",
        help = "Google Sheets API base URL"
    )]
    pub google_sheets_api_base: String,

    #[arg(
        long = "pagerduty-api-key",
        env = "PAGERDUTY_API_KEY",
        hide_env_values = true,
        help = "PagerDuty REST API key used for the open alerts lookup"
    )]
    pub pagerduty_api_key: String,

    #[arg(
        long = "pagerduty-api-base",
        env = "FLAREBOT_PAGERDUTY_API_BASE",
        default_value = "https://api.pagerduty.com",
        help = "PagerDuty REST API base URL"
    )]
    pub pagerduty_api_base: String,

    #[arg(
        long = "deploy-history-api-base",
        env = "DEPLOY_HISTORY_API_BASE",
        help = "Base URL of the deployment-history service"
    )]
    pub deploy_history_api_base: String,

    #[arg(
        long = "deploy-history-token",
        env = "DEPLOY_HISTORY_TOKEN",
        hide_env_values = true,
        help = "Optional bearer token for the deployment-history service"
    )]
    pub deploy_history_token: Option<String>,

    #[arg(
        long = "images-dir",
        env = "FLAREBOT_IMAGES_DIR",
        help = "Directory of images uploaded once by the maintenance task"
    )]
    pub images_dir: Option<PathBuf>,

    #[arg(
        long = "verify-transition-identity",
        env = "FLAREBOT_VERIFY_TRANSITION_IDENTITY",
        default_value_t = false,
        action = ArgAction::Set,
        help = "Require a Jira account for the requester before mitigate/unmitigate/not-a-flare"
    )]
    pub verify_transition_identity: bool,

    #[arg(
        long = "http-timeout-ms",
        env = "FLAREBOT_HTTP_TIMEOUT_MS",
        default_value_t = 10_000,
        value_parser = parse_positive_u64,
        help = "Per-request timeout for collaborator HTTP calls"
    )]
    pub http_timeout_ms: u64,

    #[arg(
        long = "http-retry-max-attempts",
        env = "FLAREBOT_HTTP_RETRY_MAX_ATTEMPTS",
        default_value_t = 3,
        value_parser = parse_positive_usize,
        help = "Attempts per collaborator HTTP call, including the first"
    )]
    pub http_retry_max_attempts: usize,

    #[arg(
        long = "http-retry-base-delay-ms",
        env = "FLAREBOT_HTTP_RETRY_BASE_DELAY_MS",
        default_value_t = 500,
        value_parser = parse_positive_u64,
        help = "Base delay for exponential HTTP retry backoff"
    )]
    pub http_retry_base_delay_ms: u64,

    #[arg(
        long = "reconnect-delay-ms",
        env = "FLAREBOT_RECONNECT_DELAY_MS",
        default_value_t = 2_000,
        value_parser = parse_positive_u64,
        help = "Delay before reopening a dropped socket connection"
    )]
    pub reconnect_delay_ms: u64,

    #[arg(
        long = "maintenance-interval-seconds",
        env = "FLAREBOT_MAINTENANCE_INTERVAL_SECONDS",
        default_value_t = 86_400,
        value_parser = parse_positive_u64,
        help = "Seconds between user directory refreshes and image uploads"
    )]
    pub maintenance_interval_seconds: u64,

    #[arg(
        long = "log-json",
        env = "FLAREBOT_LOG_JSON",
        default_value_t = false,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true",
        help = "Emit logs as JSON lines instead of compact text"
    )]
    pub log_json: bool,
}
