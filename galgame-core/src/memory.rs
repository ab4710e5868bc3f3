//! Conversation transcript and long-term memory.
//!
//! The transcript is the authoritative record of the session. Prompts only
//! ever see a recency window of it; older context survives as summaries in
//! [`LongTermMemory`].

use crate::script::{EMPTY_TRANSCRIPT, HEROINE_NAME, NONE_MARKER, PLAYER_NAME};
use serde::{Deserialize, Serialize};

/// Default maximum number of turns kept in the transcript.
pub const DEFAULT_MAX_HISTORY: usize = 40;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    System,
    User,
    Assistant,
}

/// One entry in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
}

impl Turn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// True for player and heroine lines, false for narration.
    pub fn is_dialogue(&self) -> bool {
        matches!(self.role, TurnRole::User | TurnRole::Assistant)
    }
}

/// Ordered transcript of the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DialogueHistory {
    turns: Vec<Turn>,
}

impl DialogueHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: TurnRole, content: impl Into<String>) {
        self.turns.push(Turn::new(role, content));
    }

    pub fn push_system(&mut self, content: impl Into<String>) {
        self.push(TurnRole::System, content);
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(TurnRole::User, content);
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(TurnRole::Assistant, content);
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Drop the oldest non-system turns until at most `max` remain.
    ///
    /// System turns are never dropped, so a transcript made only of
    /// narration may stay above `max`.
    pub fn trim_to(&mut self, max: usize) {
        let excess = self.turns.len().saturating_sub(max);
        if excess == 0 {
            return;
        }

        let mut dropped = 0;
        self.turns.retain(|turn| {
            if dropped < excess && turn.is_dialogue() {
                dropped += 1;
                false
            } else {
                true
            }
        });
    }

    /// The last `n` player/heroine turns, oldest first.
    pub fn recent_dialogue(&self, n: usize) -> Vec<&Turn> {
        let dialogue: Vec<&Turn> = self.turns.iter().filter(|t| t.is_dialogue()).collect();
        let skip = dialogue.len().saturating_sub(n);
        dialogue.into_iter().skip(skip).collect()
    }
}

/// Render player/heroine turns as `Name: line`, one per line.
pub fn format_transcript<'a>(turns: impl IntoIterator<Item = &'a Turn>) -> String {
    let lines: Vec<String> = turns
        .into_iter()
        .filter_map(|turn| match turn.role {
            TurnRole::User => Some(format!("{PLAYER_NAME}: {}", turn.content)),
            TurnRole::Assistant => Some(format!("{HEROINE_NAME}: {}", turn.content)),
            TurnRole::System => None,
        })
        .collect();

    if lines.is_empty() {
        EMPTY_TRANSCRIPT.to_string()
    } else {
        lines.join("\n")
    }
}

/// Summaries of earlier conversation, oldest first.
///
/// Unbounded unless a limit is set, in which case only the newest `limit`
/// summaries are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LongTermMemory {
    summaries: Vec<String>,
}

impl LongTermMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, summary: impl Into<String>, limit: Option<usize>) {
        self.summaries.push(summary.into());
        if let Some(limit) = limit {
            let excess = self.summaries.len().saturating_sub(limit);
            self.summaries.drain(..excess);
        }
    }

    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    pub fn summaries(&self) -> &[String] {
        &self.summaries
    }

    /// Bullet list for prompts.
    pub fn render(&self) -> String {
        if self.summaries.is_empty() {
            return NONE_MARKER.to_string();
        }
        self.summaries
            .iter()
            .map(|s| format!("- {s}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl From<Vec<String>> for LongTermMemory {
    fn from(summaries: Vec<String>) -> Self {
        Self { summaries }
    }
}
