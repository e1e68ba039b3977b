//! Detection of incident-role claims made inside a flare channel.

use std::sync::OnceLock;

use regex::Regex;

const INCIDENT_LEAD_PATTERN: &str = r"(?i)i(?:'m| am)(?: the)? incident lead";
const COMMS_LEAD_PATTERN: &str =
    r"(?i)^(?:comms lead\b|.*\bi(?:'m| am)(?: the)? comms lead)|^\S+\s+comms lead$";

fn incident_lead_regex() -> Option<&'static Regex> {
    static INCIDENT_LEAD_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    INCIDENT_LEAD_REGEX
        .get_or_init(|| Regex::new(INCIDENT_LEAD_PATTERN).ok())
        .as_ref()
}

fn comms_lead_regex() -> Option<&'static Regex> {
    static COMMS_LEAD_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    COMMS_LEAD_REGEX
        .get_or_init(|| Regex::new(COMMS_LEAD_PATTERN).ok())
        .as_ref()
}

/// True for "i am incident lead", "i'm the incident lead" and friends.
pub fn is_incident_lead_claim(text: &str) -> bool {
    incident_lead_regex().is_some_and(|regex| regex.is_match(text))
}

/// True for "comms lead", "i am comms lead" or a bare "<@bot> comms lead".
pub fn is_comms_lead_claim(text: &str) -> bool {
    comms_lead_regex().is_some_and(|regex| regex.is_match(text.trim()))
}
