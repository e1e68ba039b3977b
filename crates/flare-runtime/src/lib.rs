//! Flarebot runtime: the socket event loop, command dispatch and the handlers
//! behind every chat command.
//!
//! Handlers receive a [`FlareContext`] holding the collaborator clients and the
//! shared user and channel directories, so tests run them against in-memory fakes.

pub mod directory_cache;
pub mod dispatch;
pub mod flare_context;
pub mod flare_runtime;
pub mod incident_workflow;
pub mod interactive_lookups;
pub mod lifecycle;
pub mod maintenance;
pub mod message_event;
pub mod role_assignment;
pub mod transcript_recorder;

#[cfg(test)]
mod test_support;

pub use directory_cache::{ChannelsCache, UsersCache};
pub use dispatch::{dispatch_inbound_event, handle_message_event, DispatchOutcome};
pub use flare_context::{
    FlareContext, FlareRuntimeConfig, TransitionIdentityPolicy, DEFAULT_COMMS_LEAD_FIELD,
    DEFAULT_ISSUE_TYPE,
};
pub use flare_runtime::{run_flare_bot, DEFAULT_RECONNECT_DELAY};
pub use incident_workflow::{run_incident_workflow, FatalStepFailure, FireRequest, WorkflowReport};
pub use lifecycle::{handle_transition, TransitionRequest};
pub use maintenance::{run_directory_maintenance, run_maintenance_iteration, DEFAULT_MAINTENANCE_INTERVAL};
pub use message_event::{BlockActionEvent, InboundEvent, MessageEvent};
