//! Extraction of "fire a flare" commands.
//!
//! The command is `fire [a] [flare] [modifier] <modifier> [flare] <title>`,
//! where a modifier is either a priority (`p0`..`p2`) or a special type
//! (`preemptive` / `retroactive`). The regex only locates the two modifier
//! slots and the trailing title; each slot token is then classified on its
//! own, so the order of priority and special type never matters.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

const FIRE_COMMAND_PATTERN: &str = r"(?i)fire\s+(?:a\s+)?(?:flare\s+)?(?:(pre[- ]?emptive|retroactive|p0|p1|p2)\s+)?(?:flare\s+)?(?:(pre[- ]?emptive|retroactive|p0|p1|p2)\s+)(?:flare\s+)?(.+)";

fn fire_command_regex() -> Option<&'static Regex> {
    static FIRE_COMMAND_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    FIRE_COMMAND_REGEX
        .get_or_init(|| Regex::new(FIRE_COMMAND_PATTERN).ok())
        .as_ref()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
/// Incident severity class, `P0` being the most critical.
pub enum Priority {
    P0,
    P1,
    P2,
}

impl Priority {
    /// The bare digit the user typed (`"0"`, `"1"` or `"2"`).
    pub fn as_digit(&self) -> &'static str {
        match self {
            Self::P0 => "0",
            Self::P1 => "1",
            Self::P2 => "2",
        }
    }

    /// Issue-tracker priority id: the digit offset by one (`p0` is `"1"`).
    pub fn severity_id(&self) -> String {
        match self {
            Self::P0 => "1".to_string(),
            Self::P1 => "2".to_string(),
            Self::P2 => "3".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
/// Flags a quiet incident that is not broadcast to the whole index channel.
pub enum SpecialType {
    Preemptive,
    Retroactive,
}

impl SpecialType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preemptive => "preemptive",
            Self::Retroactive => "retroactive",
        }
    }
}

impl std::fmt::Display for SpecialType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// One classified modifier-slot token.
pub enum Modifier {
    Priority(Priority),
    SpecialType(SpecialType),
}

impl Modifier {
    /// Classifies a slot token by shape: `p` plus a digit is a priority,
    /// anything longer is a special type. Hyphens and spaces are folded away.
    pub fn classify(token: &str) -> Option<Self> {
        let normalized = token
            .chars()
            .filter(|ch| *ch != '-' && !ch.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        if normalized.len() == 2 {
            return match normalized.as_str() {
                "p0" => Some(Self::Priority(Priority::P0)),
                "p1" => Some(Self::Priority(Priority::P1)),
                "p2" => Some(Self::Priority(Priority::P2)),
                _ => None,
            };
        }
        match normalized.as_str() {
            "preemptive" => Some(Self::SpecialType(SpecialType::Preemptive)),
            "retroactive" => Some(Self::SpecialType(SpecialType::Retroactive)),
            _ => None,
        }
    }

    fn is_same_kind(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (Self::Priority(_), Self::Priority(_)) | (Self::SpecialType(_), Self::SpecialType(_))
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// A successfully extracted fire command.
pub struct FireCommand {
    pub priority: Priority,
    pub special_type: Option<SpecialType>,
    pub title: String,
}

/// Extracts a fire command from free-form text.
///
/// Returns `None` when the grammar does not match, when no priority is
/// present (a special type alone is not enough), or when the title is empty.
pub fn extract_fire_command(text: &str) -> Option<FireCommand> {
    let captures = fire_command_regex()?.captures(text)?;
    let second_slot = captures.get(2)?;
    let title_match = captures.get(3)?;
    let second = Modifier::classify(second_slot.as_str())?;

    let (modifiers, title) = match captures.get(1) {
        None => (vec![second], title_match.as_str()),
        Some(first_slot) => {
            let first = Modifier::classify(first_slot.as_str())?;
            if first.is_same_kind(&second) {
                // Only one modifier of each kind; the repeat belongs to the title.
                (vec![first], &text[second_slot.start()..title_match.end()])
            } else {
                (vec![first, second], title_match.as_str())
            }
        }
    };

    let mut priority = None;
    let mut special_type = None;
    for modifier in modifiers {
        match modifier {
            Modifier::Priority(value) => priority = Some(value),
            Modifier::SpecialType(value) => special_type = Some(value),
        }
    }

    let title = title.trim();
    if title.is_empty() {
        return None;
    }
    Some(FireCommand {
        priority: priority?,
        special_type,
        title: title.to_string(),
    })
}
