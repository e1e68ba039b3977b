//! Chooses one command for a bot mention, given the kind of channel it came from.

use serde::Serialize;

use crate::fire_command_parser::{extract_fire_command, FireCommand};
use crate::help_command::{extract_help_command, HelpScope};
use crate::lifecycle_command_parser::{extract_lifecycle_transition, TransitionKind};
use crate::role_command_parser::{is_comms_lead_claim, is_incident_lead_claim};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
/// The authorized channel kinds the bot answers in.
pub enum CommandScope {
    /// The global incident-index channel where flares are fired.
    IndexChannel,
    /// A per-incident discussion channel named after its ticket.
    FlareChannel,
}

impl CommandScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IndexChannel => "index_channel",
            Self::FlareChannel => "flare_channel",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    Fire(FireCommand),
    Transition {
        kind: TransitionKind,
        keyword: &'static str,
    },
    Help(HelpScope),
    ClaimIncidentLead,
    ClaimCommsLead,
    Unrecognized,
}

/// Parses a mention to the bot into a single command.
///
/// Fire commands are accepted in both scopes and take precedence. Inside a
/// flare channel role claims come next, then lifecycle keywords, and help is
/// only chosen when neither matched.
pub fn parse_flare_command(text: &str, scope: CommandScope) -> ParsedCommand {
    if let Some(command) = extract_fire_command(text) {
        return ParsedCommand::Fire(command);
    }
    if scope == CommandScope::FlareChannel {
        if is_incident_lead_claim(text) {
            return ParsedCommand::ClaimIncidentLead;
        }
        if is_comms_lead_claim(text) {
            return ParsedCommand::ClaimCommsLead;
        }
        if let Some((kind, keyword)) = extract_lifecycle_transition(text)
            .and_then(|keyword| TransitionKind::from_keyword(keyword).map(|kind| (kind, keyword)))
        {
            return ParsedCommand::Transition { kind, keyword };
        }
    }
    match extract_help_command(text) {
        Some(help_scope) => ParsedCommand::Help(help_scope),
        None => ParsedCommand::Unrecognized,
    }
}
