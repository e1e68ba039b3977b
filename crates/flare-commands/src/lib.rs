//! Natural-language command extraction for Flarebot chat messages.
//!
//! Every function in this crate is pure: text goes in, a structured intent
//! comes out. Routing and side effects live in `flare-runtime`.

pub mod fire_command_parser;
pub mod flare_command;
pub mod help_command;
pub mod lifecycle_command_parser;
pub mod role_command_parser;

pub use fire_command_parser::{extract_fire_command, FireCommand, Modifier, Priority, SpecialType};
pub use flare_command::{parse_flare_command, CommandScope, ParsedCommand};
pub use help_command::{
    extract_help_command, help_all, help_flare_channel, help_for_scope, help_index_channel,
    unrecognized_command_reply, HelpScope,
};
pub use lifecycle_command_parser::{extract_lifecycle_transition, TransitionKind};
pub use role_command_parser::{is_comms_lead_claim, is_incident_lead_claim};
