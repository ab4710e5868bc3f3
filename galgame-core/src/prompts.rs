//! Prompt templates for the analysis and summarization calls.
//!
//! Templates use `{name}` placeholders, with `{{` and `}}` for literal braces.
//! The built-in templates ship with the crate; a directory containing
//! `analysis.txt` and/or `summarize.txt` can replace them.

use crate::locations::LocationGraph;
use crate::memory::{format_transcript, DialogueHistory, LongTermMemory};
use crate::script::NONE_MARKER;
use crate::state::GameState;
use regex::{Captures, Regex};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::info;

const ANALYSIS_TEMPLATE: &str = include_str!("prompts/analysis.txt");
const SUMMARIZE_TEMPLATE: &str = include_str!("prompts/summarize.txt");

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex")
});

/// Errors from loading or filling templates.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Failed to read template {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Template references unknown placeholder '{{{0}}}'")]
    MissingPlaceholder(String),
}

/// Substitute `values` into `template`.
pub fn fill(template: &str, values: &[(&str, &str)]) -> Result<String, TemplateError> {
    let mut missing = None;
    let filled = PLACEHOLDER.replace_all(template, |caps: &Captures| {
        match (caps.get(0).map(|m| m.as_str()), caps.get(1)) {
            (Some("{{"), _) => "{".to_string(),
            (Some("}}"), _) => "}".to_string(),
            (_, Some(name)) => match values.iter().find(|(key, _)| *key == name.as_str()) {
                Some((_, value)) => value.to_string(),
                None => {
                    missing.get_or_insert_with(|| name.as_str().to_string());
                    String::new()
                }
            },
            _ => String::new(),
        }
    });

    match missing {
        Some(name) => Err(TemplateError::MissingPlaceholder(name)),
        None => Ok(filled.into_owned()),
    }
}

/// Everything the analysis prompt describes.
pub struct AnalysisContext<'a> {
    pub state: &'a GameState,
    pub graph: &'a LocationGraph,
    pub history: &'a DialogueHistory,
    pub memory: &'a LongTermMemory,
    pub user_input: &'a str,
    /// How many recent player/heroine turns to include.
    pub recency_window: usize,
}

/// The two prompt templates.
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    analysis: String,
    summarize: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            analysis: ANALYSIS_TEMPLATE.to_string(),
            summarize: SUMMARIZE_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplates {
    /// Use custom template text.
    pub fn new(analysis: impl Into<String>, summarize: impl Into<String>) -> Self {
        Self {
            analysis: analysis.into(),
            summarize: summarize.into(),
        }
    }

    /// Load overrides from `dir`; files that do not exist keep the built-in text.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let dir = dir.as_ref();
        let mut templates = Self::default();
        if let Some(text) = read_optional(&dir.join("analysis.txt"))? {
            templates.analysis = text;
        }
        if let Some(text) = read_optional(&dir.join("summarize.txt"))? {
            templates.summarize = text;
        }
        info!(dir = %dir.display(), "Loaded prompt templates");
        Ok(templates)
    }

    /// Build the per-turn analysis prompt.
    pub fn analysis_prompt(&self, ctx: &AnalysisContext<'_>) -> Result<String, TemplateError> {
        let location = ctx.graph.get(&ctx.state.current_location);
        let destinations = ctx.graph.describe_destinations(&ctx.state.current_location);
        let recent = ctx.history.recent_dialogue(ctx.recency_window);

        let closeness = ctx.state.closeness().to_string();
        let destinations = non_empty(destinations.join(", "));
        let topics = non_empty(ctx.state.last_topics().join(", "));
        let transcript = format_transcript(recent);
        let memories = ctx.memory.render();

        fill(
            &self.analysis,
            &[
                ("long_term_memories", memories.as_str()),
                ("relationship_state", ctx.state.relationship_state().label()),
                ("closeness", closeness.as_str()),
                ("mood_today", ctx.state.mood_today.as_str()),
                (
                    "current_location_name",
                    location.map(|l| l.name.as_str()).unwrap_or("unknown place"),
                ),
                (
                    "current_scene_description",
                    location
                        .map(|l| l.description.as_str())
                        .filter(|d| !d.is_empty())
                        .unwrap_or("unknown"),
                ),
                ("available_destinations", destinations.as_str()),
                ("last_topics", topics.as_str()),
                ("conversation_history", transcript.as_str()),
                ("user_input", ctx.user_input),
            ],
        )
    }

    /// Build the summarization prompt for a transcript slice.
    pub fn summary_prompt(&self, snippet: &str) -> Result<String, TemplateError> {
        fill(&self.summarize, &[("conversation_snippet", snippet)])
    }
}

fn non_empty(text: String) -> String {
    if text.is_empty() {
        NONE_MARKER.to_string()
    } else {
        text
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, TemplateError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(TemplateError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{EMPTY_TRANSCRIPT, PLAYER_NAME};

    #[test]
    fn test_fill_placeholders_and_escapes() {
        let out = fill("{{\"a\": {x}}} and {y}", &[("x", "1"), ("y", "two")]).unwrap();
        assert_eq!(out, "{\"a\": 1} and two");
    }

    #[test]
    fn test_fill_leaves_non_identifier_braces() {
        let out = fill("{ not a placeholder } {x}", &[("x", "ok")]).unwrap();
        assert_eq!(out, "{ not a placeholder } ok");
    }

    #[test]
    fn test_fill_missing_placeholder() {
        let err = fill("hello {who}", &[]).unwrap_err();
        assert!(matches!(err, TemplateError::MissingPlaceholder(name) if name == "who"));
    }

    #[test]
    fn test_builtin_templates_fill() {
        let graph = LocationGraph::from_toml_str(
            r#"
            [[location]]
            id = "club"
            name = "Baking Club Room"
            description = "Smells of butter."
            connections = ["hall"]
            [[location]]
            id = "hall"
            name = "Main Hall"
            "#,
        )
        .unwrap();
        let mut state = GameState::new("club", 30);
        state.merge_topics(&["cake".to_string()]);
        let mut history = DialogueHistory::new();
        history.push_user("Hi!");
        let memory = LongTermMemory::new();

        let templates = PromptTemplates::default();
        let prompt = templates
            .analysis_prompt(&AnalysisContext {
                state: &state,
                graph: &graph,
                history: &history,
                memory: &memory,
                user_input: "What are you baking?",
                recency_window: 10,
            })
            .unwrap();

        assert!(prompt.contains("Baking Club Room"));
        assert!(prompt.contains("Smells of butter."));
        assert!(prompt.contains("'Main Hall' (hall)"));
        assert!(prompt.contains("cake"));
        assert!(prompt.contains(&format!("{PLAYER_NAME}: Hi!")));
        assert!(prompt.contains("What are you baking?"));
        assert!(prompt.contains("\"affection_delta\""));
        assert!(!prompt.contains("{{"));

        let summary = templates.summary_prompt(EMPTY_TRANSCRIPT).unwrap();
        assert!(summary.contains(EMPTY_TRANSCRIPT));
    }

    #[test]
    fn test_from_dir_overrides_only_present_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("summarize.txt"), "S: {conversation_snippet}").unwrap();

        let templates = PromptTemplates::from_dir(dir.path()).unwrap();
        assert_eq!(templates.summary_prompt("x").unwrap(), "S: x");
        assert_eq!(templates.analysis, ANALYSIS_TEMPLATE);
    }
}
