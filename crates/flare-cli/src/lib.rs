//! `flarebot` command-line surface: flags, logging bootstrap and startup wiring.

pub mod bootstrap_helpers;
pub mod cli_args;
pub mod startup;

pub use bootstrap_helpers::init_tracing;
pub use cli_args::Cli;
pub use startup::{parse_user_roster, run_flarebot, runtime_config, ConfigError};
