//! GameSession - the primary public API for playing the story.
//!
//! A session owns everything one player's story needs: the map, the
//! completion backend, the prompt templates, the save store and the
//! [`DialogueState`]. Each call to [`GameSession::chat`] runs one turn to
//! completion and always produces a reply.

use crate::analysis::{parse_completion, Analysis, SuggestedAction};
use crate::backend::{CompletionBackend, CompletionParams};
use crate::dialogue::DialogueState;
use crate::intent::{classify, confession_answer, parse_debug, DebugCommand, Intent};
use crate::locations::LocationGraph;
use crate::memory::{DialogueHistory, LongTermMemory, DEFAULT_MAX_HISTORY};
use crate::persist::{PersistError, SaveInfo, SaveMeta, SaveSlot, SaveStore};
use crate::prompts::{AnalysisContext, PromptTemplates, TemplateError};
use crate::script::{
    backup_reply, ACCEPTED_ENDING, CONFESSION_NARRATION, EPILOGUE, OPENING_LINE, REJECTED_ENDING,
};
use crate::state::{ConfessionResponse, GameState, StoryPhase, DEFAULT_CLOSENESS};
use deepseek::DeepSeek;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Location id a new story starts at.
pub const DEFAULT_STARTING_LOCATION: &str = "main_building_f2_corridor";

/// Errors from GameSession operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("Prompt template error: {0}")]
    Template(#[from] TemplateError),

    #[error("No API key configured - set DEEPSEEK_API_KEY environment variable")]
    NoApiKey,
}

/// Configuration for creating a game session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// TOML file describing the map.
    pub locations_path: PathBuf,

    /// Directory holding `save_{slot}.json` files.
    pub save_dir: PathBuf,

    /// Directory whose `analysis.txt` / `summarize.txt` replace the built-ins.
    pub prompt_dir: Option<PathBuf>,

    /// Model override for the completion backend.
    pub model: Option<String>,

    /// Sampling for the per-turn analysis call.
    pub analysis: CompletionParams,

    /// Sampling for the long-term memory summary call.
    pub summary: CompletionParams,

    /// Transcript size above which old dialogue turns are dropped.
    pub max_history: usize,

    /// Player/heroine turns shown to the model each turn.
    pub recency_window: usize,

    /// Summary counter value at which a summary is written.
    pub summary_threshold: u32,

    /// Cap on stored summaries; `None` keeps all of them.
    pub memory_limit: Option<usize>,

    pub starting_location: String,
    pub starting_closeness: i32,

    /// Seed the transcript with the scene-setting narration.
    pub intro_turn: bool,

    /// Fixed seed for way-point events and backup replies.
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            locations_path: PathBuf::from("config/locations.toml"),
            save_dir: PathBuf::from("saves"),
            prompt_dir: None,
            model: None,
            analysis: CompletionParams::analysis(),
            summary: CompletionParams::summary(),
            max_history: DEFAULT_MAX_HISTORY,
            recency_window: 10,
            summary_threshold: 6,
            memory_limit: None,
            starting_location: DEFAULT_STARTING_LOCATION.to_string(),
            starting_closeness: DEFAULT_CLOSENESS,
            intro_turn: false,
            seed: None,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_locations_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.locations_path = path.into();
        self
    }

    pub fn with_save_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_dir = dir.into();
        self
    }

    pub fn with_prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set max tokens for the analysis call.
    pub fn with_max_tokens(mut self, tokens: usize) -> Self {
        self.analysis.max_tokens = tokens;
        self
    }

    /// Set temperature for the analysis call.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.analysis.temperature = temperature;
        self
    }

    /// Set the timeout for both calls.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.analysis.timeout = timeout;
        self.summary.timeout = timeout;
        self
    }

    pub fn with_max_history(mut self, turns: usize) -> Self {
        self.max_history = turns;
        self
    }

    pub fn with_recency_window(mut self, turns: usize) -> Self {
        self.recency_window = turns;
        self
    }

    pub fn with_summary_threshold(mut self, turns: u32) -> Self {
        self.summary_threshold = turns.max(1);
        self
    }

    /// Keep only the newest `limit` long-term memories.
    pub fn with_memory_limit(mut self, limit: usize) -> Self {
        self.memory_limit = Some(limit);
        self
    }

    pub fn with_starting_location(mut self, id: impl Into<String>) -> Self {
        self.starting_location = id.into();
        self
    }

    pub fn with_starting_closeness(mut self, closeness: i32) -> Self {
        self.starting_closeness = closeness;
        self
    }

    pub fn with_intro_turn(mut self, enabled: bool) -> Self {
        self.intro_turn = enabled;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// What produced a reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyKind {
    /// Operator command output.
    Debug,
    /// Travel narration.
    Movement,
    /// The heroine confesses; the story waits for an answer.
    Confession,
    /// The confession was answered.
    Ending(ConfessionResponse),
    /// Input after the story ended.
    Epilogue,
    /// An ordinary model-generated line.
    Dialogue,
}

/// The result of one chat turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub kind: ReplyKind,
    /// The turn's analysis, for dialogue turns that produced one.
    pub analysis: Option<Analysis>,
}

impl Reply {
    fn new(text: impl Into<String>, kind: ReplyKind) -> Self {
        Self {
            text: text.into(),
            kind,
            analysis: None,
        }
    }
}

/// The first narration of a new story, with the state it starts from.
#[derive(Debug, Clone)]
pub struct Opening {
    pub text: String,
    pub state: GameState,
}

/// A single player's story.
pub struct GameSession {
    config: SessionConfig,
    graph: LocationGraph,
    backend: Box<dyn CompletionBackend>,
    templates: PromptTemplates,
    store: SaveStore,
    dialogue: DialogueState,
    rng: StdRng,
}

impl GameSession {
    /// Create a session backed by DeepSeek.
    ///
    /// Requires `DEEPSEEK_API_KEY`. A missing or broken map file leaves the
    /// session with an empty map rather than failing.
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        let mut client = DeepSeek::from_env().map_err(|_| SessionError::NoApiKey)?;
        if let Some(model) = &config.model {
            client = client.with_model(model.clone());
        }

        let graph = LocationGraph::load_or_empty(&config.locations_path);
        Self::with_backend(config, client, graph)
    }

    /// Create a session with any completion backend and a ready map.
    pub fn with_backend(
        config: SessionConfig,
        backend: impl CompletionBackend + 'static,
        graph: LocationGraph,
    ) -> Result<Self, SessionError> {
        let templates = match &config.prompt_dir {
            Some(dir) => PromptTemplates::from_dir(dir)?,
            None => PromptTemplates::default(),
        };
        Ok(Self::with_parts(config, backend, graph, templates))
    }

    /// Create a session from fully prepared parts.
    pub fn with_parts(
        config: SessionConfig,
        backend: impl CompletionBackend + 'static,
        graph: LocationGraph,
        templates: PromptTemplates,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let store = SaveStore::new(&config.save_dir);
        let dialogue = fresh_dialogue(&config, &graph);

        Self {
            config,
            graph,
            backend: Box::new(backend),
            templates,
            store,
            dialogue,
            rng,
        }
    }

    /// Reset to a fresh story and return its opening narration.
    pub fn start_new_game(&mut self) -> Opening {
        self.dialogue = fresh_dialogue(&self.config, &self.graph);
        info!(location = %self.dialogue.state().current_location, "New game started");
        Opening {
            text: OPENING_LINE.to_string(),
            state: self.dialogue.state().clone(),
        }
    }

    /// Handle one line of player input.
    pub async fn chat(&mut self, input: &str) -> Reply {
        info!(input = %input, "Chat request");

        if let Some(command) = parse_debug(input) {
            return self.handle_debug(command);
        }

        match self.dialogue.state().phase() {
            StoryPhase::Ended(response) => {
                debug!(?response, "Story already ended");
                return Reply::new(EPILOGUE, ReplyKind::Epilogue);
            }
            StoryPhase::ConfessionPending => {
                if let Some(answer) = confession_answer(input) {
                    return self.resolve_confession(input, answer).await;
                }
                debug!("No confession answer, continuing conversation");
                return self.standard_dialogue(input).await;
            }
            StoryPhase::Normal => {
                if self.dialogue.state_mut().trigger_confession_if_due() {
                    return self.confess();
                }
            }
        }

        match classify(input, &self.graph) {
            Intent::Movement { target } => self.handle_movement(&target),
            Intent::Debug(command) => self.handle_debug(command),
            Intent::Dialogue => self.standard_dialogue(input).await,
        }
    }

    fn handle_debug(&mut self, command: DebugCommand) -> Reply {
        info!(?command, "Debug command");
        let text = match command {
            DebugCommand::SetCloseness(value) => {
                let state = self.dialogue.state_mut();
                state.set_closeness(value);
                format!(
                    "[Debug] Closeness set to {} ({}).",
                    state.closeness(),
                    state.relationship_state()
                )
            }
            DebugCommand::Goto(target) => {
                match self.dialogue.travel(&self.graph, &target, true, &mut self.rng) {
                    Ok(moved) => moved.narration,
                    Err(e) => format!("[Debug] {e}."),
                }
            }
            DebugCommand::Unknown(_) => {
                "[Debug] Usage: /debug closeness <0-100> | /debug goto <location_id>".to_string()
            }
        };
        Reply::new(text, ReplyKind::Debug)
    }

    fn handle_movement(&mut self, target: &str) -> Reply {
        info!(destination = %target, "Movement intent");
        let text = match self.dialogue.travel(&self.graph, target, false, &mut self.rng) {
            Ok(moved) => moved.narration,
            Err(e) => {
                warn!(error = %e, "Movement rejected");
                format!("Hmm... I don't know how to get there. ({e})")
            }
        };
        Reply::new(text, ReplyKind::Movement)
    }

    fn confess(&mut self) -> Reply {
        self.dialogue.history_mut().push_system(CONFESSION_NARRATION);
        Reply::new(CONFESSION_NARRATION, ReplyKind::Confession)
    }

    async fn resolve_confession(&mut self, input: &str, answer: ConfessionResponse) -> Reply {
        info!(?answer, "Confession answered");
        let (text, slot) = match answer {
            ConfessionResponse::Accepted => (ACCEPTED_ENDING, SaveSlot::happy_ending()),
            ConfessionResponse::Rejected => (REJECTED_ENDING, SaveSlot::sad_ending()),
        };

        self.dialogue.state_mut().resolve_confession(answer);
        let history = self.dialogue.history_mut();
        history.push_user(input);
        history.push_system(text);

        if let Err(e) = self.store.save(&slot, &self.dialogue.snapshot()).await {
            error!(slot = %slot, error = %e, "Failed to save ending");
        }

        Reply::new(text, ReplyKind::Ending(answer))
    }

    async fn standard_dialogue(&mut self, input: &str) -> Reply {
        debug!("Handling as standard dialogue");
        self.dialogue.history_mut().push_user(input);

        let prompt = self.templates.analysis_prompt(&AnalysisContext {
            state: self.dialogue.state(),
            graph: &self.graph,
            history: self.dialogue.history(),
            memory: self.dialogue.memory(),
            user_input: input,
            recency_window: self.config.recency_window,
        });

        let (mut text, analysis) = match prompt {
            Err(e) => {
                error!(error = %e, "Failed to build analysis prompt");
                (backup_reply(&mut self.rng).to_string(), Some(Analysis::error(e.to_string())))
            }
            Ok(prompt) => match self.backend.complete(&prompt, self.config.analysis).await {
                Ok(raw) => {
                    let parsed = parse_completion(&raw, &mut self.rng);
                    (parsed.response, parsed.analysis)
                }
                Err(e) => {
                    warn!(error = %e, "Analysis call failed");
                    (backup_reply(&mut self.rng).to_string(), Some(Analysis::error(e.to_string())))
                }
            },
        };

        let mut kind = ReplyKind::Dialogue;
        if let Some(analysis) = &analysis {
            let applied = self.dialogue.apply_analysis(analysis);
            if let Some(SuggestedAction::ProposeLocationChange { target }) =
                analysis.report().and_then(|r| r.suggested_action.as_ref())
            {
                info!(destination = ?target, "Model proposed a location change");
            }
            if applied.confession_triggered {
                kind = ReplyKind::Confession;
            }
        }

        self.dialogue.history_mut().push_assistant(text.clone());
        if kind == ReplyKind::Confession {
            self.dialogue.history_mut().push_system(CONFESSION_NARRATION);
            text = format!("{text}\n\n{CONFESSION_NARRATION}");
        }

        if self.dialogue.record_exchange(self.config.summary_threshold) {
            self.summarize().await;
        }
        self.dialogue.history_mut().trim_to(self.config.max_history);

        Reply {
            text,
            kind,
            analysis,
        }
    }

    /// Condense recent turns into one long-term memory.
    async fn summarize(&mut self) {
        let snippet = self
            .dialogue
            .summary_snippet(self.config.summary_threshold as usize);

        let summary = match self.templates.summary_prompt(&snippet) {
            Ok(prompt) => match self.backend.complete(&prompt, self.config.summary).await {
                Ok(summary) => summary,
                Err(e) => {
                    warn!(error = %e, "Summary call failed");
                    String::new()
                }
            },
            Err(e) => {
                error!(error = %e, "Failed to build summary prompt");
                String::new()
            }
        };

        self.dialogue.finish_summary(&summary, self.config.memory_limit);
    }

    /// Save the current story, returning the written stamp.
    pub async fn try_save(&self, slot: impl Into<SaveSlot>) -> Result<SaveMeta, SessionError> {
        let slot = slot.into();
        Ok(self.store.save(&slot, &self.dialogue.snapshot()).await?)
    }

    /// Replace the current story with a saved one.
    ///
    /// Nothing changes unless the whole save is readable and its location
    /// exists on the map.
    pub async fn try_load(&mut self, slot: impl Into<SaveSlot>) -> Result<(), SessionError> {
        let slot = slot.into();
        let snapshot = self.store.load(&slot).await?;

        let location = &snapshot.state.current_location;
        if !self.graph.is_empty() && !self.graph.contains(location) {
            return Err(PersistError::UnknownLocation(location.clone()).into());
        }

        self.dialogue = DialogueState::from_snapshot(snapshot);
        info!(
            slot = %slot,
            closeness = self.dialogue.state().closeness(),
            location = %self.dialogue.state().current_location,
            "Game loaded"
        );
        Ok(())
    }

    /// Save to `slot`; false on failure.
    pub async fn save(&self, slot: impl Into<SaveSlot>) -> bool {
        let slot = slot.into();
        match self.try_save(slot.clone()).await {
            Ok(_) => true,
            Err(e) => {
                error!(slot = %slot, error = %e, "Save failed");
                false
            }
        }
    }

    /// Load from `slot`; false (with state untouched) on failure.
    pub async fn load(&mut self, slot: impl Into<SaveSlot>) -> bool {
        let slot = slot.into();
        match self.try_load(slot.clone()).await {
            Ok(()) => true,
            Err(e) => {
                warn!(slot = %slot, error = %e, "Load failed");
                false
            }
        }
    }

    /// Saves on disk, newest first.
    pub async fn list_saves(&self) -> Result<Vec<SaveInfo>, SessionError> {
        Ok(self.store.list().await?)
    }

    pub fn state(&self) -> &GameState {
        self.dialogue.state()
    }

    pub fn history(&self) -> &DialogueHistory {
        self.dialogue.history()
    }

    pub fn long_term_memory(&self) -> &LongTermMemory {
        self.dialogue.memory()
    }

    pub fn phase(&self) -> StoryPhase {
        self.dialogue.state().phase()
    }

    pub fn graph(&self) -> &LocationGraph {
        &self.graph
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Turns counted toward the next summary.
    pub fn turns_since_summary(&self) -> u32 {
        self.dialogue.turns_since_summary()
    }

    /// Display name of the current location.
    pub fn location_name(&self) -> &str {
        self.graph.display_name(&self.dialogue.state().current_location)
    }
}

/// Where a new story begins: the configured location, or the first one on
/// the map when the configured id is missing from a non-empty map.
fn starting_location<'a>(config: &'a SessionConfig, graph: &'a LocationGraph) -> &'a str {
    if graph.is_empty() || graph.contains(&config.starting_location) {
        return &config.starting_location;
    }
    match graph.iter().next() {
        Some(first) => {
            warn!(
                configured = %config.starting_location,
                fallback = %first.id,
                "Starting location is not on the map"
            );
            &first.id
        }
        None => &config.starting_location,
    }
}

fn fresh_dialogue(config: &SessionConfig, graph: &LocationGraph) -> DialogueState {
    let state = GameState::new(starting_location(config, graph), config.starting_closeness);
    let dialogue = DialogueState::new(state);
    if config.intro_turn {
        dialogue.with_intro()
    } else {
        dialogue
    }
}
