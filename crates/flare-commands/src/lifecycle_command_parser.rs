//! Extraction of lifecycle keywords (`mitigated`, `unmitigated`, `not a flare`).

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

const LIFECYCLE_TRANSITION_PATTERN: &str =
    r"(?:flare )?(?:is )?(mitigat(?:ed|e)|not (?:a )?flare|unmitigat(?:ed|e))";

const LIFECYCLE_KEYWORDS: [&str; 6] = [
    "mitigate",
    "mitigated",
    "unmitigate",
    "unmitigated",
    "not a flare",
    "not flare",
];

fn lifecycle_transition_regex() -> Option<&'static Regex> {
    static LIFECYCLE_TRANSITION_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    LIFECYCLE_TRANSITION_REGEX
        .get_or_init(|| Regex::new(LIFECYCLE_TRANSITION_PATTERN).ok())
        .as_ref()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
/// Canonical lifecycle transition with keyword synonyms folded together.
pub enum TransitionKind {
    Mitigate,
    Unmitigate,
    NotAFlare,
}

impl TransitionKind {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.trim().to_ascii_lowercase().as_str() {
            "mitigate" | "mitigated" => Some(Self::Mitigate),
            "unmitigate" | "unmitigated" => Some(Self::Unmitigate),
            "not a flare" | "not flare" => Some(Self::NotAFlare),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mitigate => "mitigate",
            Self::Unmitigate => "unmitigate",
            Self::NotAFlare => "not_a_flare",
        }
    }
}

/// Returns the first lifecycle keyword in `text`, exactly as matched.
///
/// Partial words such as `mitigation` do not match. Callers fold synonyms
/// through [`TransitionKind::from_keyword`].
pub fn extract_lifecycle_transition(text: &str) -> Option<&'static str> {
    let lowered = text.to_lowercase();
    let captures = lifecycle_transition_regex()?.captures(&lowered)?;
    let matched = captures.get(1)?.as_str();
    LIFECYCLE_KEYWORDS
        .iter()
        .copied()
        .find(|keyword| *keyword == matched)
}
