//! The state owned by one running story.
//!
//! [`DialogueState`] keeps the game record, the transcript, long-term memory
//! and the summary counter together so a load can replace all four at once.

use crate::analysis::Analysis;
use crate::locations::LocationGraph;
use crate::memory::{format_transcript, DialogueHistory, LongTermMemory};
use crate::movement::{resolve_movement, MoveError, NarratedMove};
use crate::persist::SaveSnapshot;
use crate::script::INTRO_SYSTEM_TURN;
use crate::state::{AppliedAnalysis, GameState};
use rand::Rng;
use tracing::{debug, info};

/// Turns added to the summary counter by one player/heroine exchange.
pub const TURNS_PER_EXCHANGE: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogueState {
    state: GameState,
    history: DialogueHistory,
    memory: LongTermMemory,
    turns_since_summary: u32,
}

impl DialogueState {
    /// Fresh story around `state` with an empty transcript.
    pub fn new(state: GameState) -> Self {
        Self {
            state,
            history: DialogueHistory::new(),
            memory: LongTermMemory::new(),
            turns_since_summary: 0,
        }
    }

    /// Seed the transcript with the scene-setting narration.
    pub fn with_intro(mut self) -> Self {
        self.history.push_system(INTRO_SYSTEM_TURN);
        self
    }

    /// Rebuild from a save, re-deriving anything that follows closeness.
    pub fn from_snapshot(snapshot: SaveSnapshot) -> Self {
        let mut state = snapshot.state;
        state.normalize();
        Self {
            state,
            history: snapshot.history,
            memory: snapshot.long_term_memory,
            turns_since_summary: snapshot.dialogue_turns_since_last_summary,
        }
    }

    pub fn snapshot(&self) -> SaveSnapshot {
        SaveSnapshot {
            history: self.history.clone(),
            state: self.state.clone(),
            long_term_memory: self.memory.clone(),
            dialogue_turns_since_last_summary: self.turns_since_summary,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub fn history(&self) -> &DialogueHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut DialogueHistory {
        &mut self.history
    }

    pub fn memory(&self) -> &LongTermMemory {
        &self.memory
    }

    pub fn turns_since_summary(&self) -> u32 {
        self.turns_since_summary
    }

    /// Apply an analysis. Error-flagged analyses change nothing.
    pub fn apply_analysis(&mut self, analysis: &Analysis) -> AppliedAnalysis {
        match analysis {
            Analysis::Report(report) => self.state.apply_analysis(report),
            Analysis::Error { message } => {
                debug!(error = %message, "Ignoring error-flagged analysis");
                AppliedAnalysis::default()
            }
        }
    }

    /// Travel to `target`; see [`resolve_movement`].
    pub fn travel<R: Rng + ?Sized>(
        &mut self,
        graph: &LocationGraph,
        target: &str,
        debug_bypass: bool,
        rng: &mut R,
    ) -> Result<NarratedMove, MoveError> {
        resolve_movement(graph, &mut self.state, &mut self.history, target, debug_bypass, rng)
    }

    /// Count one finished exchange. Returns true when a summary is due.
    pub fn record_exchange(&mut self, threshold: u32) -> bool {
        self.turns_since_summary += TURNS_PER_EXCHANGE;
        self.turns_since_summary >= threshold
    }

    /// Transcript of the last `turns` player/heroine turns, for summarizing.
    pub fn summary_snippet(&self, turns: usize) -> String {
        format_transcript(self.history.recent_dialogue(turns))
    }

    /// Close a summary cycle. Empty summaries are dropped; the counter
    /// resets either way.
    pub fn finish_summary(&mut self, summary: &str, limit: Option<usize>) {
        let summary = summary.trim();
        if summary.is_empty() {
            debug!("Empty summary discarded");
        } else {
            self.memory.push(summary, limit);
            info!(memories = self.memory.len(), "Long-term memory updated");
        }
        self.turns_since_summary = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisReport;
    use crate::memory::TurnRole;

    fn dialogue() -> DialogueState {
        DialogueState::new(GameState::new("corridor", 30))
    }

    #[test]
    fn test_intro_is_a_system_turn() {
        let d = dialogue().with_intro();
        assert_eq!(d.history().len(), 1);
        assert_eq!(d.history().turns()[0].role, TurnRole::System);
    }

    #[test]
    fn test_error_analysis_is_ignored() {
        let mut d = dialogue();
        let before = d.clone();
        let applied = d.apply_analysis(&Analysis::error("bad json"));
        assert_eq!(applied, AppliedAnalysis::default());
        assert_eq!(d, before);
    }

    #[test]
    fn test_report_analysis_is_applied() {
        let mut d = dialogue();
        let applied = d.apply_analysis(&Analysis::Report(AnalysisReport {
            affection_delta: 12,
            ..AnalysisReport::default()
        }));
        assert_eq!(applied.closeness_change, Some((30, 42)));
        assert_eq!(d.state().closeness(), 42);
    }

    #[test]
    fn test_summary_cycle() {
        let mut d = dialogue();
        assert!(!d.record_exchange(6));
        assert!(!d.record_exchange(6));
        assert!(d.record_exchange(6));
        assert_eq!(d.turns_since_summary(), 6);

        d.finish_summary("  ", None);
        assert_eq!(d.turns_since_summary(), 0);
        assert!(d.memory().is_empty());

        d.finish_summary("They talked about cake.", None);
        assert_eq!(d.memory().summaries(), ["They talked about cake.".to_string()]);
    }

    #[test]
    fn test_summary_limit() {
        let mut d = dialogue();
        for i in 0..4 {
            d.finish_summary(&format!("summary {i}"), Some(2));
        }
        assert_eq!(d.memory().summaries(), ["summary 2".to_string(), "summary 3".to_string()]);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut d = dialogue().with_intro();
        d.history_mut().push_user("hi");
        d.record_exchange(6);
        d.finish_summary("met", None);
        d.record_exchange(6);

        let restored = DialogueState::from_snapshot(d.snapshot());
        assert_eq!(restored, d);
        assert_eq!(restored.turns_since_summary(), 2);
    }
}
