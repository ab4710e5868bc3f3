//! Integration tests that call the real DeepSeek API.
//!
//! These tests require DEEPSEEK_API_KEY to be set (via .env file or environment).
//! Run with: `cargo test -p galgame-core --test api_integration -- --ignored`
//!
//! These are marked #[ignore] by default to avoid:
//! - API costs in CI
//! - Test failures when no API key is available
//! - Slow test runs (API calls take seconds)

use galgame_core::{
    parse_completion, CompletionBackend, CompletionParams, GameSession, ReplyKind, SessionConfig,
};
use tempfile::TempDir;

/// Load environment variables from .env file
fn setup() {
    let _ = dotenvy::dotenv();
}

/// Check if API key is available
fn has_api_key() -> bool {
    std::env::var("DEEPSEEK_API_KEY").is_ok()
}

fn config(dir: &TempDir) -> SessionConfig {
    SessionConfig::new()
        .with_locations_path(concat!(env!("CARGO_MANIFEST_DIR"), "/../config/locations.toml"))
        .with_save_dir(dir.path())
        .with_seed(1)
}

#[tokio::test]
#[ignore] // Run with: cargo test -p galgame-core --test api_integration -- --ignored
async fn test_live_dialogue_turn() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: DEEPSEEK_API_KEY not set");
        return;
    }

    let dir = TempDir::new().expect("Failed to create temp directory");
    let mut session = GameSession::new(config(&dir)).expect("Failed to create session");
    session.start_new_game();

    let reply = session
        .chat("Hi! Are those cookies you're carrying? They smell amazing.")
        .await;

    println!("Reply: {}", reply.text);
    println!("Analysis: {:?}", reply.analysis);

    assert_eq!(reply.kind, ReplyKind::Dialogue);
    assert!(!reply.text.is_empty());
    assert!(!reply.text.contains("<response>"));
    assert_eq!(session.history().len(), 2);
}

#[tokio::test]
#[ignore]
async fn test_live_completion_follows_format() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: DEEPSEEK_API_KEY not set");
        return;
    }

    let client = deepseek::DeepSeek::from_env().expect("Failed to create client");
    let prompt = "Reply with exactly this text and nothing else: \
                  <analysis>{\"affection_delta\": 1}</analysis><response>Hello!</response>";

    let raw = CompletionBackend::complete(&client, prompt, CompletionParams::analysis())
        .await
        .expect("API should respond");
    let parsed = parse_completion(&raw, &mut rand::thread_rng());

    println!("Raw: {raw}");
    assert!(parsed.analysis.is_some());
    assert!(parsed.response.contains("Hello"));
}
