//! Foundational low-level utilities shared across Flarebot crates.
//!
//! Provides time helpers pinned to the reference time zone used in every
//! user-facing timestamp, text truncation for chat payloads, and the retry
//! policy shared by the HTTP collaborator clients.

pub mod http_retry;
pub mod text_utils;
pub mod time_utils;

pub use http_retry::{
    is_retryable_status, is_retryable_transport_error, parse_retry_after, retry_delay,
};
pub use text_utils::{truncate_for_error, truncate_for_slack};
pub use time_utils::{format_reference_time, parse_slack_ts, REFERENCE_TIME_ZONE};
