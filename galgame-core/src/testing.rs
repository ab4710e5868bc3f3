//! Testing utilities for the galgame core.
//!
//! This module provides tools for integration testing:
//! - `MockBackend` for deterministic completions without API calls
//! - `TestHarness` for scripted story scenarios
//! - Assertion helpers for verifying game state

use crate::backend::{BackendError, CompletionBackend, CompletionParams};
use crate::locations::{Location, LocationGraph};
use crate::memory::TurnRole;
use crate::prompts::PromptTemplates;
use crate::session::{GameSession, Reply, SessionConfig};
use crate::state::StoryPhase;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

/// Returned once the scripted completions run out.
pub const MOCK_DEFAULT_COMPLETION: &str = "(mock completion)";

/// A prompt the mock received.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub prompt: String,
    pub params: CompletionParams,
}

#[derive(Debug, Default)]
struct MockState {
    queue: VecDeque<Result<String, String>>,
    calls: Vec<RecordedCall>,
}

/// A completion backend that returns scripted completions in order.
///
/// Clones share the same script and call log, so a test can keep one
/// handle while the session owns another.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    inner: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a raw completion.
    pub fn queue_completion(&self, text: impl Into<String>) -> &Self {
        self.lock().queue.push_back(Ok(text.into()));
        self
    }

    /// Queue a well-formed analysis + response completion.
    pub fn queue_analysis(&self, affection_delta: i32, reply: &str) -> &Self {
        self.queue_completion(analysis_completion(affection_delta, reply))
    }

    /// Queue a failed call.
    pub fn queue_failure(&self, message: impl Into<String>) -> &Self {
        self.lock().queue.push_back(Err(message.into()));
        self
    }

    /// Every call made so far, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.lock().calls.last().map(|c| c.prompt.clone())
    }
}

#[async_trait]
impl CompletionBackend for MockBackend {
    async fn complete(&self, prompt: &str, params: CompletionParams) -> Result<String, BackendError> {
        let mut state = self.lock();
        state.calls.push(RecordedCall {
            prompt: prompt.to_string(),
            params,
        });
        match state.queue.pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(BackendError::Network(message)),
            None => Ok(MOCK_DEFAULT_COMPLETION.to_string()),
        }
    }
}

/// A completion in the shape the analysis prompt asks for.
pub fn analysis_completion(affection_delta: i32, reply: &str) -> String {
    format!(
        "<analysis>{{\"affection_delta\": {affection_delta}, \"boredom_delta\": 0, \
         \"triggered_topics\": []}}</analysis>\n<response>{reply}</response>"
    )
}

/// A small school map.
///
/// Corridor - Stairwell - Main Hall - School Gate, with the Library off the
/// Main Hall and an Old Storehouse reachable from nowhere.
pub fn sample_graph() -> LocationGraph {
    let location = |id: &str, name: &str, connections: &[&str]| Location {
        id: id.to_string(),
        name: name.to_string(),
        description: format!("The {name}."),
        connections: connections.iter().map(|c| c.to_string()).collect(),
    };

    LocationGraph::from_locations(vec![
        location("main_building_f2_corridor", "Second-Floor Corridor", &["stairwell"]),
        location("stairwell", "Stairwell", &["main_building_f2_corridor", "main_hall"]),
        location("main_hall", "Main Hall", &["stairwell", "school_gate", "library"]),
        location("school_gate", "School Gate", &["main_hall"]),
        location("library", "Library", &["main_hall"]),
        location("old_storehouse", "Old Storehouse", &[]),
    ])
    .unwrap_or_else(|_| LocationGraph::empty())
}

/// Test harness for running story scenarios.
pub struct TestHarness {
    /// The session under test.
    pub session: GameSession,
    /// Shared handle to the session's backend.
    pub backend: MockBackend,
}

impl TestHarness {
    /// A seeded session on [`sample_graph`] saving into `save_dir`.
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        Self::with_config(SessionConfig::new().with_save_dir(save_dir).with_seed(42))
    }

    /// A session on [`sample_graph`] with a custom configuration.
    pub fn with_config(config: SessionConfig) -> Self {
        let backend = MockBackend::new();
        let session =
            GameSession::with_parts(config, backend.clone(), sample_graph(), PromptTemplates::default());
        Self { session, backend }
    }

    /// Queue an analysis completion.
    pub fn expect_analysis(&mut self, affection_delta: i32, reply: &str) -> &mut Self {
        self.backend.queue_analysis(affection_delta, reply);
        self
    }

    /// Queue a raw completion.
    pub fn expect_completion(&mut self, text: impl Into<String>) -> &mut Self {
        self.backend.queue_completion(text);
        self
    }

    /// Queue a failed call.
    pub fn expect_failure(&mut self, message: &str) -> &mut Self {
        self.backend.queue_failure(message);
        self
    }

    /// Send player input and get the reply.
    pub async fn input(&mut self, text: &str) -> Reply {
        self.session.chat(text).await
    }

    pub fn closeness(&self) -> i32 {
        self.session.state().closeness()
    }

    pub fn location(&self) -> &str {
        &self.session.state().current_location
    }

    pub fn phase(&self) -> StoryPhase {
        self.session.phase()
    }

    /// Content of the last transcript turn.
    pub fn last_turn(&self) -> Option<(TurnRole, &str)> {
        self.session
            .history()
            .last()
            .map(|t| (t.role, t.content.as_str()))
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

#[track_caller]
pub fn assert_closeness(harness: &TestHarness, expected: i32) {
    let actual = harness.closeness();
    assert_eq!(actual, expected, "Expected closeness {expected}, got {actual}");
}

#[track_caller]
pub fn assert_location(harness: &TestHarness, expected: &str) {
    let actual = harness.location();
    assert_eq!(actual, expected, "Expected to be at '{expected}', but at '{actual}'");
}

#[track_caller]
pub fn assert_phase(harness: &TestHarness, expected: StoryPhase) {
    let actual = harness.phase();
    assert_eq!(actual, expected, "Expected phase {expected:?}, got {actual:?}");
}

/// Assert the LLM was called exactly `expected` times.
#[track_caller]
pub fn assert_calls(harness: &TestHarness, expected: usize) {
    let actual = harness.backend.call_count();
    assert_eq!(actual, expected, "Expected {expected} backend calls, got {actual}");
}
