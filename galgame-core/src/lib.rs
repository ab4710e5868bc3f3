//! Story engine for a single-heroine text galgame driven by an LLM.
//!
//! This crate provides:
//! - A location map with shortest-path travel and way-point events
//! - A relationship state machine fed by the model's per-turn analysis
//! - A defensive parser for semi-structured model output
//! - Slot-based save/load
//!
//! # Quick Start
//!
//! ```ignore
//! use galgame_core::{GameSession, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = GameSession::new(SessionConfig::new())?;
//!
//!     let opening = session.start_new_game();
//!     println!("{}", opening.text);
//!
//!     let reply = session.chat("Hi! What are you baking?").await;
//!     println!("{}", reply.text);
//!
//!     session.save(1).await;
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod backend;
pub mod dialogue;
pub mod intent;
pub mod locations;
pub mod memory;
pub mod movement;
pub mod pathfinding;
pub mod persist;
pub mod prompts;
pub mod script;
pub mod session;
pub mod state;
pub mod testing;

// Primary public API
pub use analysis::{parse_completion, Analysis, AnalysisReport, ParsedCompletion};
pub use backend::{BackendError, CompletionBackend, CompletionParams};
pub use locations::{ConfigError, Location, LocationGraph};
pub use persist::{PersistError, SaveInfo, SaveMeta, SaveSlot, SaveSnapshot, SaveStore};
pub use session::{GameSession, Opening, Reply, ReplyKind, SessionConfig, SessionError};
pub use state::{ConfessionResponse, GameState, RelationshipState, StoryPhase};
pub use testing::{MockBackend, TestHarness};
