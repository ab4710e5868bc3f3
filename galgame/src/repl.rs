//! Line-oriented play loop.
//!
//! Every line is sent to the story, except lines starting with `#`, which
//! are front-end commands (save, load, quit, status).

use galgame_core::script::HEROINE_NAME;
use galgame_core::{GameSession, ReplyKind, SaveSlot, SessionError, StoryPhase};
use std::io::{self, BufRead, Write};
use tracing::warn;

const HELP: &str = "\
  #quit         - Exit the game
  #new          - Start the story over
  #save <slot>  - Save to a slot (a number or a name)
  #load <slot>  - Load a slot
  #saves        - List saved slots
  #status       - Show relationship and location
  #help         - Show this help
  (anything else is said to Su Tang)";

/// Run the loop until `#quit` or end of input.
pub async fn run(mut session: GameSession, load_slot: Option<String>) -> Result<(), SessionError> {
    println!("=== Su Tang ===");
    println!();

    match load_slot {
        Some(slot) => {
            if session.load(slot.as_str()).await {
                println!("[LOADED] Resumed from slot {slot}");
                print_status(&session);
            } else {
                println!("[ERROR] Could not load slot {slot}; starting a new story.");
                print_opening(&mut session);
            }
        }
        None => print_opening(&mut session),
    }
    println!("Type #help for commands.");
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('#') {
            let parts: Vec<&str> = command.split_whitespace().collect();
            match parts.first().copied() {
                Some("quit") | Some("exit") => {
                    println!("Goodbye!");
                    break;
                }
                Some("new") => print_opening(&mut session),
                Some("save") => match parts.get(1) {
                    Some(slot) => {
                        if session.save(SaveSlot::from(*slot)).await {
                            println!("[SAVED] Slot {slot}");
                        } else {
                            println!("[ERROR] Save failed");
                        }
                    }
                    None => println!("[ERROR] Usage: #save <slot>"),
                },
                Some("load") => match parts.get(1) {
                    Some(slot) => {
                        if session.load(SaveSlot::from(*slot)).await {
                            println!("[LOADED] Slot {slot}");
                            print_status(&session);
                        } else {
                            println!("[ERROR] Could not load slot {slot}");
                        }
                    }
                    None => println!("[ERROR] Usage: #load <slot>"),
                },
                Some("saves") => match session.list_saves().await {
                    Ok(saves) if saves.is_empty() => println!("[SAVES] none"),
                    Ok(saves) => {
                        println!("[SAVES]");
                        for save in saves {
                            let stamp = save
                                .meta
                                .map(|m| m.timestamp)
                                .unwrap_or_else(|| "unknown time".to_string());
                            println!("  {:<14} {stamp}", save.slot.as_str());
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Listing saves failed");
                        println!("[ERROR] {e}");
                    }
                },
                Some("status") => print_status(&session),
                Some("help") => {
                    println!("[HELP]");
                    println!("{HELP}");
                }
                _ => println!("[ERROR] Unknown command. Type #help for help."),
            }
            stdout.flush().ok();
            continue;
        }

        print!("[...]");
        stdout.flush().ok();

        let reply = session.chat(line).await;

        print!("\r     \r");
        let label = match reply.kind {
            ReplyKind::Dialogue => HEROINE_NAME,
            ReplyKind::Debug => "Debug",
            _ => "Narration",
        };
        println!("[{label}]");
        for para in reply.text.split("\n\n") {
            println!("{para}");
        }
        println!();
        stdout.flush().ok();
    }

    Ok(())
}

fn print_opening(session: &mut GameSession) {
    let opening = session.start_new_game();
    println!("{}", opening.text);
    println!();
}

fn print_status(session: &GameSession) {
    let state = session.state();
    let phase = match session.phase() {
        StoryPhase::Normal => "ongoing",
        StoryPhase::ConfessionPending => "waiting for your answer",
        StoryPhase::Ended(_) => "ended",
    };

    println!("[STATUS]");
    println!("  Location: {}", session.location_name());
    println!("  Closeness: {} ({})", state.closeness(), state.relationship_state());
    println!("  Mood: {}", state.mood_today);
    println!("  Boredom: {}", state.boredom_level);
    if !state.last_topics().is_empty() {
        println!("  Recent topics: {}", state.last_topics().join(", "));
    }
    println!("  Memories: {}", session.long_term_memory().len());
    println!("  Story: {phase}");
}
