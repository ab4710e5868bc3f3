//! The heroine's relationship record.
//!
//! `closeness` drives everything else: the relationship tier is recomputed
//! from it whenever it changes and is never written directly, and saturating
//! it at 100 opens the confession branch exactly once.

use crate::analysis::AnalysisReport;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

pub const MIN_CLOSENESS: i32 = 0;
pub const MAX_CLOSENESS: i32 = 100;

/// Closeness at the start of a new game.
pub const DEFAULT_CLOSENESS: i32 = 30;

/// Closeness after the confession is turned down.
pub const REJECTED_CLOSENESS: i32 = 60;

/// Maximum number of remembered topics.
pub const MAX_TOPICS: usize = 5;

/// Relationship tier, derived from closeness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipState {
    #[default]
    Initial,
    Friend,
    CloseFriend,
    Intimate,
}

impl RelationshipState {
    /// Tier for a closeness value: <40, 40-59, 60-79, >=80.
    pub fn from_closeness(closeness: i32) -> Self {
        match closeness {
            c if c >= 80 => Self::Intimate,
            c if c >= 60 => Self::CloseFriend,
            c if c >= 40 => Self::Friend,
            _ => Self::Initial,
        }
    }

    /// Wording used in prompts.
    pub fn label(self) -> &'static str {
        match self {
            Self::Initial => "just met",
            Self::Friend => "friends",
            Self::CloseFriend => "close friends",
            Self::Intimate => "intimate",
        }
    }
}

impl fmt::Display for RelationshipState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How the player answered the confession.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfessionResponse {
    Accepted,
    Rejected,
}

/// Where the story stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoryPhase {
    Normal,
    ConfessionPending,
    Ended(ConfessionResponse),
}

/// What a single analysis changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedAnalysis {
    /// Closeness before and after, when it changed.
    pub closeness_change: Option<(i32, i32)>,
    /// The confession branch opened on this application.
    pub confession_triggered: bool,
}

fn default_mood() -> String {
    "normal".to_string()
}

/// Mutable game record for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    closeness: i32,
    /// Rebuilt from `closeness` by [`GameState::normalize`].
    #[serde(default)]
    relationship_state: RelationshipState,
    #[serde(default = "default_mood")]
    pub mood_today: String,
    pub current_location: String,
    #[serde(default)]
    last_topics: Vec<String>,
    #[serde(default)]
    pub boredom_level: u32,
    #[serde(default)]
    confession_triggered: bool,
    #[serde(default)]
    confession_response: Option<ConfessionResponse>,
}

impl GameState {
    /// Fresh state at `location` with the given starting closeness.
    pub fn new(location: impl Into<String>, closeness: i32) -> Self {
        let closeness = closeness.clamp(MIN_CLOSENESS, MAX_CLOSENESS);
        Self {
            closeness,
            relationship_state: RelationshipState::from_closeness(closeness),
            mood_today: default_mood(),
            current_location: location.into(),
            last_topics: Vec::new(),
            boredom_level: 0,
            confession_triggered: false,
            confession_response: None,
        }
    }

    pub fn closeness(&self) -> i32 {
        self.closeness
    }

    pub fn relationship_state(&self) -> RelationshipState {
        self.relationship_state
    }

    /// Most recent first.
    pub fn last_topics(&self) -> &[String] {
        &self.last_topics
    }

    pub fn confession_triggered(&self) -> bool {
        self.confession_triggered
    }

    pub fn confession_response(&self) -> Option<ConfessionResponse> {
        self.confession_response
    }

    pub fn phase(&self) -> StoryPhase {
        match (self.confession_response, self.confession_triggered) {
            (Some(response), _) => StoryPhase::Ended(response),
            (None, true) => StoryPhase::ConfessionPending,
            (None, false) => StoryPhase::Normal,
        }
    }

    /// Add `delta` to closeness, clamped to 0..=100.
    ///
    /// A zero delta does nothing. Returns the old and new value when the
    /// stored closeness actually changed.
    pub fn adjust_closeness(&mut self, delta: i32) -> Option<(i32, i32)> {
        if delta == 0 {
            return None;
        }
        let current = self.closeness;
        let updated = current
            .saturating_add(delta)
            .clamp(MIN_CLOSENESS, MAX_CLOSENESS);
        if updated == current {
            return None;
        }
        self.store_closeness(updated);
        Some((current, updated))
    }

    /// Overwrite closeness, clamped to 0..=100.
    pub fn set_closeness(&mut self, value: i32) {
        self.store_closeness(value.clamp(MIN_CLOSENESS, MAX_CLOSENESS));
    }

    fn store_closeness(&mut self, value: i32) {
        let before = self.relationship_state;
        self.closeness = value;
        self.relationship_state = RelationshipState::from_closeness(value);
        info!(closeness = value, "Closeness updated");
        if before != self.relationship_state {
            info!(from = %before, to = %self.relationship_state, "Relationship changed");
        }
    }

    /// Open the confession branch if closeness is saturated and no ending
    /// has happened yet. Returns true only on the call that opens it.
    pub fn trigger_confession_if_due(&mut self) -> bool {
        if self.closeness >= MAX_CLOSENESS
            && !self.confession_triggered
            && self.confession_response.is_none()
        {
            self.confession_triggered = true;
            info!("Confession triggered");
            true
        } else {
            false
        }
    }

    /// Close the confession branch with the player's answer.
    pub fn resolve_confession(&mut self, response: ConfessionResponse) {
        self.confession_triggered = true;
        self.confession_response = Some(response);
        match response {
            ConfessionResponse::Accepted => self.set_closeness(MAX_CLOSENESS),
            ConfessionResponse::Rejected => self.set_closeness(REJECTED_CLOSENESS),
        }
    }

    /// Apply a successful analysis to the record.
    pub fn apply_analysis(&mut self, report: &AnalysisReport) -> AppliedAnalysis {
        let mut applied = AppliedAnalysis {
            closeness_change: self.adjust_closeness(report.affection_delta),
            ..AppliedAnalysis::default()
        };
        if report.affection_delta != 0 {
            applied.confession_triggered = self.trigger_confession_if_due();
        }

        if report.boredom_delta != 0 {
            let boredom = (self.boredom_level as i64 + report.boredom_delta as i64).max(0);
            self.boredom_level = boredom.min(u32::MAX as i64) as u32;
            debug!(boredom = self.boredom_level, "Boredom updated");
        }

        self.merge_topics(&report.triggered_topics);

        if let Some(mood) = &report.mood {
            self.mood_today = mood.clone();
        }

        applied
    }

    /// Put `topics` at the front of the recent-topic list, most recent
    /// first, without duplicates, keeping at most five.
    pub fn merge_topics(&mut self, topics: &[String]) {
        if topics.is_empty() {
            return;
        }
        let mut merged: Vec<String> = Vec::with_capacity(MAX_TOPICS);
        for topic in topics.iter().chain(self.last_topics.iter()) {
            if !merged.contains(topic) {
                merged.push(topic.clone());
            }
        }
        merged.truncate(MAX_TOPICS);
        self.last_topics = merged;
    }

    /// Re-derive fields that must follow closeness, after deserializing.
    pub fn normalize(&mut self) {
        self.closeness = self.closeness.clamp(MIN_CLOSENESS, MAX_CLOSENESS);
        self.relationship_state = RelationshipState::from_closeness(self.closeness);
        self.last_topics.truncate(MAX_TOPICS);
    }
}
