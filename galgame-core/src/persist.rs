//! Save slots on disk.
//!
//! Each slot is one pretty-printed JSON document, `save_{slot}.json`, holding
//! the transcript, the game record, long-term memory and the summary counter,
//! plus a `meta` stamp added at write time.

use crate::memory::{DialogueHistory, LongTermMemory};
use crate::state::GameState;
use chrono::{DateTime, FixedOffset, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: String, found: String },

    #[error("No save in slot '{0}'")]
    NotFound(SaveSlot),

    #[error("Save refers to unknown location '{0}'")]
    UnknownLocation(String),
}

/// Current save file version.
pub const SAVE_VERSION: &str = "1.0";

/// A save slot key: a small number or a symbolic name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SaveSlot(String);

impl SaveSlot {
    /// Slot written when the confession is accepted.
    pub const HAPPY_ENDING: &'static str = "happy_ending";
    /// Slot written when the confession is turned down.
    pub const SAD_ENDING: &'static str = "sad_ending";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn happy_ending() -> Self {
        Self::new(Self::HAPPY_ENDING)
    }

    pub fn sad_ending() -> Self {
        Self::new(Self::SAD_ENDING)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The slot name with anything but letters, digits, `-` and `_` replaced.
    fn file_stem(&self) -> String {
        self.0
            .trim()
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect()
    }
}

impl fmt::Display for SaveSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u32> for SaveSlot {
    fn from(n: u32) -> Self {
        Self(n.to_string())
    }
}

impl From<&str> for SaveSlot {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for SaveSlot {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Stamp written alongside every save; not part of the game's logical state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveMeta {
    /// RFC 3339 time of the write.
    pub timestamp: String,
    pub version: String,
}

impl SaveMeta {
    fn now() -> Self {
        Self {
            timestamp: Local::now().to_rfc3339(),
            version: SAVE_VERSION.to_string(),
        }
    }

    fn parsed_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.timestamp).ok()
    }
}

/// Everything needed to resume a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveSnapshot {
    /// Required: a record without it is rejected.
    pub history: DialogueHistory,
    pub state: GameState,
    #[serde(default)]
    pub long_term_memory: LongTermMemory,
    #[serde(default)]
    pub dialogue_turns_since_last_summary: u32,
}

/// On-disk layout: the snapshot fields at the top level plus `meta`.
#[derive(Debug, Serialize, Deserialize)]
struct SavedGame {
    #[serde(flatten)]
    snapshot: SaveSnapshot,
    #[serde(default)]
    meta: Option<SaveMeta>,
}

/// A save found by [`SaveStore::list`].
#[derive(Debug, Clone)]
pub struct SaveInfo {
    pub slot: SaveSlot,
    pub path: PathBuf,
    /// Absent for records written without a stamp.
    pub meta: Option<SaveMeta>,
}

/// A directory of save slots.
#[derive(Debug, Clone)]
pub struct SaveStore {
    dir: PathBuf,
}

impl SaveStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for a slot.
    pub fn path_for(&self, slot: &SaveSlot) -> PathBuf {
        self.dir.join(format!("save_{}.json", slot.file_stem()))
    }

    /// Write `snapshot` to `slot`, replacing any previous save.
    ///
    /// The document is written to a sibling temp file and renamed into place
    /// so a reader never sees a half-written save.
    pub async fn save(&self, slot: &SaveSlot, snapshot: &SaveSnapshot) -> Result<SaveMeta, PersistError> {
        fs::create_dir_all(&self.dir).await?;

        let meta = SaveMeta::now();
        let saved = SavedGame {
            snapshot: snapshot.clone(),
            meta: Some(meta.clone()),
        };
        let content = serde_json::to_string_pretty(&saved)?;

        let path = self.path_for(slot);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &path).await?;

        info!(slot = %slot, path = %path.display(), "Game saved");
        Ok(meta)
    }

    /// Read `slot`.
    pub async fn load(&self, slot: &SaveSlot) -> Result<SaveSnapshot, PersistError> {
        let path = self.path_for(slot);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PersistError::NotFound(slot.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        let saved: SavedGame = serde_json::from_str(&content)?;
        if let Some(meta) = &saved.meta {
            check_version(&meta.version)?;
        }

        debug!(slot = %slot, turns = saved.snapshot.history.len(), "Save read");
        Ok(saved.snapshot)
    }

    /// All saves in the directory, newest first. A missing directory has none.
    pub async fn list(&self) -> Result<Vec<SaveInfo>, PersistError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut saves = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(slot) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix("save_"))
                .and_then(|n| n.strip_suffix(".json"))
            else {
                continue;
            };
            let slot = SaveSlot::from(slot);

            match peek_meta(&path).await {
                Ok(meta) => saves.push(SaveInfo { slot, path, meta }),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable save"),
            }
        }

        saves.sort_by(|a, b| {
            let key = |info: &SaveInfo| info.meta.as_ref().and_then(SaveMeta::parsed_timestamp);
            key(b).cmp(&key(a)).then_with(|| a.slot.as_str().cmp(b.slot.as_str()))
        });
        Ok(saves)
    }
}

fn check_version(found: &str) -> Result<(), PersistError> {
    if found == SAVE_VERSION {
        Ok(())
    } else {
        Err(PersistError::VersionMismatch {
            expected: SAVE_VERSION.to_string(),
            found: found.to_string(),
        })
    }
}

async fn peek_meta(path: &Path) -> Result<Option<SaveMeta>, PersistError> {
    #[derive(Deserialize)]
    struct Partial {
        #[serde(default)]
        meta: Option<SaveMeta>,
    }

    let content = fs::read_to_string(path).await?;
    let partial: Partial = serde_json::from_str(&content)?;
    Ok(partial.meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn snapshot() -> SaveSnapshot {
        let mut history = DialogueHistory::new();
        history.push_system("(intro)");
        history.push_user("Hi there");
        history.push_assistant("Oh! Hello.");

        let mut state = GameState::new("corridor", 42);
        state.merge_topics(&["baking".to_string()]);

        SaveSnapshot {
            history,
            state,
            long_term_memory: LongTermMemory::from(vec!["They met at the fair.".to_string()]),
            dialogue_turns_since_last_summary: 4,
        }
    }

    #[test]
    fn test_save_path_sanitizes_slot() {
        let store = SaveStore::new("/tmp/saves");
        assert_eq!(store.path_for(&SaveSlot::from(1)), PathBuf::from("/tmp/saves/save_1.json"));
        assert_eq!(
            store.path_for(&SaveSlot::from("../evil slot")),
            PathBuf::from("/tmp/saves/save____evil_slot.json")
        );
        assert_eq!(
            store.path_for(&SaveSlot::happy_ending()),
            PathBuf::from("/tmp/saves/save_happy_ending.json")
        );
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = SaveStore::new(dir.path().join("nested"));
        let expected = snapshot();

        let meta = store.save(&SaveSlot::from(1), &expected).await.unwrap();
        assert_eq!(meta.version, SAVE_VERSION);

        let loaded = store.load(&SaveSlot::from(1)).await.unwrap();
        assert_eq!(loaded, expected);
    }

    #[tokio::test]
    async fn test_written_document_layout() {
        let dir = tempdir().unwrap();
        let store = SaveStore::new(dir.path());
        store.save(&SaveSlot::from(2), &snapshot()).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("save_2.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value["history"].is_array());
        assert_eq!(value["history"][1]["role"], "user");
        assert_eq!(value["state"]["closeness"], 42);
        assert_eq!(value["dialogue_turns_since_last_summary"], 4);
        assert_eq!(value["meta"]["version"], "1.0");
        assert!(!dir.path().join("save_2.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_history_is_rejected() {
        let dir = tempdir().unwrap();
        let store = SaveStore::new(dir.path());
        std::fs::write(
            dir.path().join("save_3.json"),
            r#"{"state": {"closeness": 50, "relationship_state": "friend",
                "mood_today": "normal", "current_location": "corridor"}}"#,
        )
        .unwrap();

        let err = store.load(&SaveSlot::from(3)).await.unwrap_err();
        assert!(matches!(err, PersistError::Json(_)));
    }

    #[tokio::test]
    async fn test_record_without_meta_loads() {
        let dir = tempdir().unwrap();
        let store = SaveStore::new(dir.path());
        std::fs::write(
            dir.path().join("save_legacy.json"),
            r#"{"history": [{"role": "user", "content": "hi"}],
                "state": {"closeness": 50, "relationship_state": "friend",
                          "mood_today": "normal", "current_location": "corridor"}}"#,
        )
        .unwrap();

        let loaded = store.load(&SaveSlot::from("legacy")).await.unwrap();
        assert_eq!(loaded.history.len(), 1);
        assert!(loaded.long_term_memory.is_empty());
        assert_eq!(loaded.dialogue_turns_since_last_summary, 0);
    }

    #[tokio::test]
    async fn test_version_mismatch() {
        let dir = tempdir().unwrap();
        let store = SaveStore::new(dir.path());
        std::fs::write(
            dir.path().join("save_old.json"),
            r#"{"history": [], "state": {"closeness": 50, "relationship_state": "friend",
                "mood_today": "normal", "current_location": "corridor"},
                "meta": {"timestamp": "2024-01-01T00:00:00+00:00", "version": "0.9"}}"#,
        )
        .unwrap();

        let err = store.load(&SaveSlot::from("old")).await.unwrap_err();
        assert!(matches!(err, PersistError::VersionMismatch { found, .. } if found == "0.9"));
    }

    #[tokio::test]
    async fn test_load_missing_slot() {
        let dir = tempdir().unwrap();
        let store = SaveStore::new(dir.path());
        let err = store.load(&SaveSlot::from(9)).await.unwrap_err();
        assert!(matches!(err, PersistError::NotFound(slot) if slot.as_str() == "9"));
    }

    #[tokio::test]
    async fn test_list_saves_newest_first() {
        let dir = tempdir().unwrap();
        let store = SaveStore::new(dir.path());
        let stamp = |ts: &str| {
            format!(
                r#"{{"history": [], "state": {{"closeness": 30, "relationship_state": "initial",
                    "mood_today": "normal", "current_location": "corridor"}},
                    "meta": {{"timestamp": "{ts}", "version": "1.0"}}}}"#
            )
        };
        std::fs::write(dir.path().join("save_1.json"), stamp("2024-05-01T10:00:00+00:00")).unwrap();
        std::fs::write(dir.path().join("save_2.json"), stamp("2024-05-02T10:00:00+00:00")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a save").unwrap();
        std::fs::write(dir.path().join("save_broken.json"), "{").unwrap();

        let saves = store.list().await.unwrap();
        let slots: Vec<_> = saves.iter().map(|s| s.slot.as_str()).collect();
        assert_eq!(slots, vec!["2", "1"]);
    }

    #[tokio::test]
    async fn test_list_saves_missing_dir() {
        let dir = tempdir().unwrap();
        let store = SaveStore::new(dir.path().join("does-not-exist"));
        assert!(store.list().await.unwrap().is_empty());
    }
}
