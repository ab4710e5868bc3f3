//! Classification of raw player input.
//!
//! Stages run in a fixed order: debug commands, then movement, then ordinary
//! dialogue. Movement needs both a motion phrase and a location name; if
//! several names appear, the first location in map order wins, which can pick
//! the "wrong" place for inputs like "go to the library, not the gym".

use crate::locations::LocationGraph;
use crate::script::{ACCEPT_KEYWORDS, DEBUG_PREFIX, MOVE_KEYWORDS, REJECT_KEYWORDS};
use crate::state::ConfessionResponse;
use regex::Regex;
use std::sync::LazyLock;

static MOVE_PATTERN: LazyLock<Regex> = LazyLock::new(|| phrase_pattern(&MOVE_KEYWORDS));
static ACCEPT_PATTERN: LazyLock<Regex> = LazyLock::new(|| phrase_pattern(&ACCEPT_KEYWORDS));
static REJECT_PATTERN: LazyLock<Regex> = LazyLock::new(|| phrase_pattern(&REJECT_KEYWORDS));

/// Operator commands, prefixed with `/debug`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugCommand {
    /// `/debug closeness <n>`
    SetCloseness(i32),
    /// `/debug goto <location_id>`
    Goto(String),
    /// Anything else after the prefix.
    Unknown(String),
}

/// What the player is trying to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Debug(DebugCommand),
    Movement { target: String },
    Dialogue,
}

/// Classify `input` against the map.
pub fn classify(input: &str, graph: &LocationGraph) -> Intent {
    if let Some(command) = parse_debug(input) {
        return Intent::Debug(command);
    }

    if MOVE_PATTERN.is_match(input) {
        if let Some(location) = graph.find_mentioned(input) {
            return Intent::Movement {
                target: location.id.clone(),
            };
        }
    }

    Intent::Dialogue
}

/// Parse a debug command, or `None` if `input` is not one.
pub fn parse_debug(input: &str) -> Option<DebugCommand> {
    let rest = input.trim().strip_prefix(DEBUG_PREFIX)?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let mut parts = rest.split_whitespace();
    let command = match (parts.next(), parts.next()) {
        (Some("closeness"), Some(value)) => match value.parse::<i32>() {
            Ok(value) => DebugCommand::SetCloseness(value),
            Err(_) => DebugCommand::Unknown(rest.trim().to_string()),
        },
        (Some("goto"), Some(location)) => DebugCommand::Goto(location.to_string()),
        _ => DebugCommand::Unknown(rest.trim().to_string()),
    };
    Some(command)
}

/// Read a confession answer from the player's input.
///
/// Input matching both keyword sets is ambiguous and counts as neither.
pub fn confession_answer(input: &str) -> Option<ConfessionResponse> {
    let accepts = ACCEPT_PATTERN.is_match(input);
    let rejects = REJECT_PATTERN.is_match(input);
    match (accepts, rejects) {
        (true, false) => Some(ConfessionResponse::Accepted),
        (false, true) => Some(ConfessionResponse::Rejected),
        _ => None,
    }
}

/// One case-insensitive alternation matching any of `phrases` as whole words.
///
/// Words inside a phrase may be separated by any run of non-word characters.
/// Apostrophes count as part of a word, so "can't" does not match "can".
fn phrase_pattern(phrases: &[&str]) -> Regex {
    let alternatives: Vec<String> = phrases
        .iter()
        .map(|phrase| {
            phrase
                .split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"[^\w']+")
        })
        .collect();
    Regex::new(&format!(r"(?i)(?:^|[^\w'])(?:{})(?:[^\w']|$)", alternatives.join("|")))
        .expect("keyword tables build valid patterns")
}
