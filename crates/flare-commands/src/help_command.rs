//! Help command detection and the help texts listing the command grammar.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::flare_command::CommandScope;

const HELP_PATTERN: &str = r"(?i)\bhelp\b(?:\s+(all)\b)?";

fn help_regex() -> Option<&'static Regex> {
    static HELP_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    HELP_REGEX.get_or_init(|| Regex::new(HELP_PATTERN).ok()).as_ref()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HelpScope {
    /// Commands for the channel the request came from.
    Current,
    /// Commands for every channel type.
    All,
}

pub fn extract_help_command(text: &str) -> Option<HelpScope> {
    let captures = help_regex()?.captures(text)?;
    if captures.get(1).is_some() {
        Some(HelpScope::All)
    } else {
        Some(HelpScope::Current)
    }
}

pub fn help_index_channel(bot_user_id: &str, index_channel_id: &str) -> String {
    format!(
        "\nCommands available in the <#{index_channel_id}> channel:\n\n\
<@{bot_user_id}> help [all] - Display the list of commands available in this/all channel.\n\
<@{bot_user_id}> fire a flare <p0|p1|p2> [preemptive|retroactive] <title> - Fire a new Flare with the given priority and description. Optionally specify preemptive or retroactive. Ordering is not important but title should be last.\n"
    )
}

pub fn help_flare_channel(bot_user_id: &str) -> String {
    format!(
        "\nCommands available in a single Flare channel:\n\n\
<@{bot_user_id}> help [all] - Display the list of commands available in this/all channel.\n\
<@{bot_user_id}> i am incident lead - Declare yourself incident lead.\n\
<@{bot_user_id}> i am comms lead - Declare yourself comms lead.\n\
<@{bot_user_id}> flare mitigated - Mark the Flare mitigated.\n\
<@{bot_user_id}> flare unmitigated - Move a mitigated Flare back in progress.\n\
<@{bot_user_id}> not a flare - Mark the Flare not-a-flare.\n"
    )
}

pub fn help_all(bot_user_id: &str, index_channel_id: &str) -> String {
    format!(
        "{}{}",
        help_index_channel(bot_user_id, index_channel_id),
        help_flare_channel(bot_user_id)
    )
}

pub fn help_for_scope(
    help_scope: HelpScope,
    command_scope: CommandScope,
    bot_user_id: &str,
    index_channel_id: &str,
) -> String {
    match (help_scope, command_scope) {
        (HelpScope::All, _) => help_all(bot_user_id, index_channel_id),
        (HelpScope::Current, CommandScope::IndexChannel) => {
            help_index_channel(bot_user_id, index_channel_id)
        }
        (HelpScope::Current, CommandScope::FlareChannel) => help_flare_channel(bot_user_id),
    }
}

/// Reply for a mention that matched no command in `scope`.
pub fn unrecognized_command_reply(
    scope: CommandScope,
    bot_user_id: &str,
    index_channel_id: &str,
) -> String {
    match scope {
        CommandScope::IndexChannel => format!(
            "Sorry! I couldn't extract the priority and title from your message. {}",
            help_index_channel(bot_user_id, index_channel_id)
        ),
        CommandScope::FlareChannel => format!(
            "Sorry! I couldn't extract the flare transition from your message. {}",
            help_flare_channel(bot_user_id)
        ),
    }
}
