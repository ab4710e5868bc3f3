//! Travel between locations.
//!
//! This is the only place `current_location` changes. A move walks the
//! shortest route, rolls for a small event at every way-point, and leaves a
//! narration turn in the transcript.

use crate::locations::LocationGraph;
use crate::memory::DialogueHistory;
use crate::state::GameState;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, info};

/// Chance that something happens at each way-point.
pub const WAYPOINT_EVENT_CHANCE: f64 = 0.10;

/// Errors from movement requests.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoveError {
    #[error("Unknown location '{0}'")]
    UnknownLocation(String),
}

/// What a movement request did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    AlreadyHere,
    NoRoute,
    Moved { path: Vec<String> },
}

/// Narration for a movement request, ready to show the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarratedMove {
    pub outcome: MoveOutcome,
    /// Way-point event lines, in route order.
    pub events: Vec<String>,
    pub narration: String,
}

impl NarratedMove {
    fn without_move(outcome: MoveOutcome, narration: String) -> Self {
        Self {
            outcome,
            events: Vec::new(),
            narration,
        }
    }

    pub fn moved(&self) -> bool {
        matches!(self.outcome, MoveOutcome::Moved { .. })
    }
}

/// Move from the current location to `target`.
///
/// With `debug_bypass` the move is treated as a direct edge regardless of the
/// map, but the target must still exist on it. Without it, an unreachable or
/// unknown target yields a "no route" narration and no state change.
pub fn resolve_movement<R: Rng + ?Sized>(
    graph: &LocationGraph,
    state: &mut GameState,
    history: &mut DialogueHistory,
    target: &str,
    debug_bypass: bool,
    rng: &mut R,
) -> Result<NarratedMove, MoveError> {
    let current = state.current_location.clone();

    if current == target {
        return Ok(NarratedMove::without_move(
            MoveOutcome::AlreadyHere,
            format!("(We're already at {}.)", graph.display_name(&current)),
        ));
    }

    let path: Option<Vec<String>> = if debug_bypass {
        if !graph.contains(target) {
            return Err(MoveError::UnknownLocation(target.to_string()));
        }
        Some(vec![current.clone(), target.to_string()])
    } else {
        graph
            .find_path(&current, target)
            .map(|p| p.into_iter().map(str::to_string).collect())
    };

    let path = match path {
        Some(path) if path.len() >= 2 => path,
        _ => {
            debug!(from = %current, to = %target, "No route");
            let target_name = graph.get(target).map(|l| l.name.as_str()).unwrap_or("there");
            return Ok(NarratedMove::without_move(
                MoveOutcome::NoRoute,
                format!(
                    "Hmm... there doesn't seem to be a way to get from {} to {}.",
                    graph.display_name(&current),
                    target_name
                ),
            ));
        }
    };

    let destination = path[path.len() - 1].clone();
    let destination_name = graph.display_name(&destination).to_string();
    state.current_location = destination.clone();
    info!(from = %current, to = %destination, hops = path.len() - 1, "Moved");

    let mut events = Vec::new();
    for waypoint in &path[1..path.len() - 1] {
        if rng.gen_bool(WAYPOINT_EVENT_CHANCE) {
            info!(waypoint = %waypoint, "Way-point event triggered");
            events.push(format!(
                "On the way to {destination_name}, as you pass {}, something seems to happen... \
                 (nothing comes of it yet)",
                graph.display_name(waypoint)
            ));
        }
    }

    let mut narration = if path.len() == 2 {
        format!("[Scene change: you arrive at {destination_name}]")
    } else {
        let route = path[1..]
            .iter()
            .map(|id| graph.display_name(id))
            .collect::<Vec<_>>()
            .join(" -> ");
        format!("[Route: {route}]\n[Scene change: you finally arrive at {destination_name}]")
    };
    if !events.is_empty() {
        narration = format!("{}\n{narration}", events.join("\n"));
    }

    history.push_system(narration.clone());

    Ok(NarratedMove {
        outcome: MoveOutcome::Moved { path },
        events,
        narration,
    })
}
