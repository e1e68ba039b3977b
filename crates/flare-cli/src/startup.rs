//! Turns parsed CLI flags into collaborator clients and a running bot.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use flare_integrations::{
    DeployHistoryClient, GoogleDriveClient, GoogleSheetsClient, HttpClientSettings,
    JiraApiClient, PagerDutyClient, SlackApiClient,
};
use flare_runtime::{
    run_directory_maintenance, run_flare_bot, ChannelsCache, FlareContext, FlareRuntimeConfig,
    TransitionIdentityPolicy, UsersCache,
};
use thiserror::Error;
use tracing::info;

use crate::cli_args::Cli;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("--{flag} must not be empty")]
    EmptyValue { flag: &'static str },
    #[error("invalid user id '{entry}' in --users-to-invite")]
    InvalidRosterEntry { entry: String },
}

/// Splits the comma-separated invite roster, dropping blanks.
pub fn parse_user_roster(raw: &str) -> Result<Vec<String>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            if entry.chars().all(|c| c.is_ascii_alphanumeric()) {
                Ok(entry.to_string())
            } else {
                Err(ConfigError::InvalidRosterEntry {
                    entry: entry.to_string(),
                })
            }
        })
        .collect()
}

pub fn validate_required(cli: &Cli) -> Result<(), ConfigError> {
    let required = [
        ("slack-bot-token", &cli.slack_bot_token),
        ("slack-app-token", &cli.slack_app_token),
        ("flares-channel-id", &cli.flares_channel_id),
        ("flares-channel-name", &cli.flares_channel_name),
        ("jira-origin", &cli.jira_origin),
        ("jira-username", &cli.jira_username),
        ("jira-password", &cli.jira_password),
        ("jira-project-id", &cli.jira_project_id),
        ("google-access-token", &cli.google_access_token),
        ("google-domain", &cli.google_domain),
        ("google-template-doc-id", &cli.google_template_doc_id),
        ("google-slack-history-doc-id", &cli.google_slack_history_doc_id),
        ("pagerduty-api-key", &cli.pagerduty_api_key),
        ("deploy-history-api-base", &cli.deploy_history_api_base),
    ];
    match required.iter().find(|(_, value)| value.trim().is_empty()) {
        Some((flag, _)) => Err(ConfigError::EmptyValue { flag: *flag }),
        None => Ok(()),
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub fn runtime_config(cli: &Cli, bot_user_id: String) -> Result<FlareRuntimeConfig, ConfigError> {
    validate_required(cli)?;
    let identity_policy = if cli.verify_transition_identity {
        TransitionIdentityPolicy::RequireTrackerAccount
    } else {
        TransitionIdentityPolicy::Skip
    };
    Ok(FlareRuntimeConfig {
        bot_user_id,
        flares_channel_id: cli.flares_channel_id.trim().to_string(),
        flares_channel_name: cli.flares_channel_name.trim().to_string(),
        flare_channel_prefix: cli.flare_channel_prefix.clone(),
        jira_project_id: cli.jira_project_id.trim().to_string(),
        jira_issue_type: cli.jira_issue_type.clone(),
        jira_browse_base: format!("{}/browse", cli.jira_origin.trim_end_matches('/')),
        comms_lead_field: cli.jira_comms_lead_field.clone(),
        template_doc_id: cli.google_template_doc_id.trim().to_string(),
        history_template_doc_id: cli.google_slack_history_doc_id.trim().to_string(),
        google_domain: cli.google_domain.trim().to_string(),
        flare_folder_id: non_empty(&cli.google_flare_folder_id),
        users_to_invite: parse_user_roster(&cli.users_to_invite)?,
        identity_policy,
        images_dir: cli.images_dir.clone(),
    })
}

pub fn http_settings(cli: &Cli) -> HttpClientSettings {
    HttpClientSettings {
        request_timeout_ms: cli.http_timeout_ms,
        retry_max_attempts: cli.http_retry_max_attempts,
        retry_base_delay_ms: cli.http_retry_base_delay_ms,
    }
}

/// Builds every client, resolves the bot identity and runs until shutdown.
pub async fn run_flarebot(cli: Cli) -> Result<()> {
    validate_required(&cli)?;
    let settings = http_settings(&cli);

    let slack = SlackApiClient::new(
        &cli.slack_api_base,
        &cli.slack_app_token,
        &cli.slack_bot_token,
        settings,
    )?;
    let bot_user_id = slack
        .resolve_bot_user_id()
        .await
        .context("failed to resolve bot user id")?;
    let config = runtime_config(&cli, bot_user_id)?;
    info!(
        bot_user_id = config.bot_user_id.as_str(),
        flares_channel_id = config.flares_channel_id.as_str(),
        invitees = config.users_to_invite.len(),
        "flarebot-starting"
    );

    let tracker = JiraApiClient::new(
        &cli.jira_origin,
        &cli.jira_username,
        &cli.jira_password,
        settings,
    )?;
    let documents = GoogleDriveClient::new(
        &cli.google_drive_api_base,
        &cli.google_access_token,
        non_empty(&cli.google_shared_drive_id),
        settings,
    )?;
    let spreadsheets =
        GoogleSheetsClient::new(&cli.google_sheets_api_base, &cli.google_access_token, settings)?;
    let paging = PagerDutyClient::new(&cli.pagerduty_api_base, &cli.pagerduty_api_key, settings)?;
    let deployments = DeployHistoryClient::new(
        &cli.deploy_history_api_base,
        non_empty(&cli.deploy_history_token),
        settings,
    )?;

    let channels = ChannelsCache::new(&config.flare_channel_prefix);
    let context = Arc::new(FlareContext {
        config,
        messaging: Arc::new(slack.clone()),
        tracker: Arc::new(tracker),
        documents: Arc::new(documents),
        spreadsheets: Arc::new(spreadsheets),
        paging: Arc::new(paging),
        deployments: Arc::new(deployments),
        users: UsersCache::default(),
        channels,
    });

    tokio::spawn(run_directory_maintenance(
        context.clone(),
        Duration::from_secs(cli.maintenance_interval_seconds),
    ));
    run_flare_bot(context, slack, Duration::from_millis(cli.reconnect_delay_ms)).await
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use flare_runtime::TransitionIdentityPolicy;

    use super::{parse_user_roster, runtime_config, ConfigError};
    use crate::cli_args::Cli;

    fn cli(extra: &[&str]) -> Cli {
        let mut args = vec![
            "flarebot",
            "--slack-bot-token=xoxb-1",
            "--slack-app-token=xapp-1",
            "--flares-channel-id=CFLARES",
            "--jira-origin=https://example.atlassian.net/",
            "--jira-username=bot@example.com",
            "--jira-password=secret",
            "--jira-project-id=10000",
            "--google-access-token=ya29.token",
            "--google-domain=example.com",
            "--google-template-doc-id=tmpl",
            "--google-slack-history-doc-id=hist",
            "--pagerduty-api-key=pd-key",
            "--deploy-history-api-base=https://deploys.example.com",
        ];
        args.retain(|default| {
            let flag = default.split('=').next().unwrap_or(default);
            !extra
                .iter()
                .any(|arg| arg.split('=').next() == Some(flag))
        });
        args.extend(extra);
        Cli::try_parse_from(args).expect("parse cli")
    }

    #[test]
    fn unit_parse_user_roster_trims_and_skips_blanks() {
        assert_eq!(
            parse_user_roster(" U1, ,U2 ,"),
            Ok(vec!["U1".to_string(), "U2".to_string()])
        );
        assert_eq!(parse_user_roster(""), Ok(Vec::new()));
        assert_eq!(
            parse_user_roster("U1,<@U2>"),
            Err(ConfigError::InvalidRosterEntry {
                entry: "<@U2>".to_string()
            })
        );
    }

    #[test]
    fn functional_runtime_config_maps_flags() {
        let config = runtime_config(
            &cli(&[
                "--users-to-invite=U1,U2",
                "--google-flare-folder-id=  ",
                "--verify-transition-identity=true",
            ]),
            "UBOT".to_string(),
        )
        .expect("config");
        assert_eq!(config.bot_user_id, "UBOT");
        assert_eq!(config.jira_browse_base, "https://example.atlassian.net/browse");
        assert_eq!(config.users_to_invite, vec!["U1".to_string(), "U2".to_string()]);
        assert_eq!(config.flare_folder_id, None);
        assert_eq!(
            config.identity_policy,
            TransitionIdentityPolicy::RequireTrackerAccount
        );
        assert_eq!(config.ticket_url("FLARE-7"), "https://example.atlassian.net/browse/FLARE-7");
    }

    #[test]
    fn regression_runtime_config_rejects_blank_required_value() {
        let error = runtime_config(&cli(&["--google-domain= "]), "UBOT".to_string())
            .expect_err("blank domain");
        assert_eq!(
            error,
            ConfigError::EmptyValue {
                flag: "google-domain"
            }
        );
        assert_eq!(error.to_string(), "--google-domain must not be empty");
    }
}
