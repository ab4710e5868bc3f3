//! Save/load through the session API.
//!
//! Run with: `cargo test -p galgame-core --test persistence`

use galgame_core::testing::{assert_closeness, assert_location, TestHarness};
use galgame_core::{SaveSlot, SessionConfig, StoryPhase};
use tempfile::TempDir;

fn harness() -> (TempDir, TestHarness) {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let harness = TestHarness::new(dir.path());
    (dir, harness)
}

async fn play_a_little(harness: &mut TestHarness) {
    harness
        .expect_completion(
            r#"<analysis>{"affection_delta": 8, "triggered_topics": ["cookies"]}</analysis>
               <response>These are matcha cookies. Try one!</response>"#,
        )
        .expect_analysis(4, "Do you bake too?");
    harness.input("What smells so good?").await;
    harness.input("Let's go to the main hall").await;
    harness.input("They're delicious!").await;
}

#[tokio::test]
async fn test_save_and_load_round_trip() {
    let (dir, mut harness) = harness();
    play_a_little(&mut harness).await;

    let saved_state = harness.session.state().clone();
    let saved_history = harness.session.history().clone();
    let saved_counter = harness.session.turns_since_summary();

    assert!(harness.session.save(1).await);
    assert!(dir.path().join("save_1.json").exists());

    // Diverge, then come back.
    harness.expect_analysis(-20, "Hmph.");
    harness.input("Actually cookies are boring.").await;
    harness.input("/debug goto old_storehouse").await;
    assert_ne!(harness.session.state(), &saved_state);

    assert!(harness.session.load(1).await);

    assert_eq!(harness.session.state(), &saved_state);
    assert_eq!(harness.session.history(), &saved_history);
    assert_eq!(harness.session.turns_since_summary(), saved_counter);
    assert_closeness(&harness, 42);
    assert_location(&harness, "main_hall");
}

#[tokio::test]
async fn test_load_into_fresh_session() {
    let (dir, mut harness) = harness();
    play_a_little(&mut harness).await;
    assert!(harness.session.save("chapter_one").await);

    let mut other = TestHarness::new(dir.path());
    assert_closeness(&other, 30);
    assert!(other.session.load("chapter_one").await);

    assert_eq!(other.session.state(), harness.session.state());
    assert_eq!(other.session.history(), harness.session.history());
}

#[tokio::test]
async fn test_load_missing_slot_leaves_state_untouched() {
    let (_dir, mut harness) = harness();
    play_a_little(&mut harness).await;
    let before = harness.session.state().clone();

    assert!(!harness.session.load(7).await);
    assert_eq!(harness.session.state(), &before);
}

#[tokio::test]
async fn test_record_without_history_is_rejected() {
    let (dir, mut harness) = harness();
    play_a_little(&mut harness).await;
    let before = harness.session.history().clone();

    std::fs::write(
        dir.path().join("save_2.json"),
        r#"{"state": {"closeness": 90, "relationship_state": "intimate",
            "mood_today": "normal", "current_location": "library"},
            "long_term_memory": [], "dialogue_turns_since_last_summary": 0}"#,
    )
    .unwrap();

    assert!(!harness.session.load(2).await);
    assert_eq!(harness.session.history(), &before);
    assert_closeness(&harness, 42);
}

#[tokio::test]
async fn test_record_with_unknown_location_is_rejected() {
    let (dir, mut harness) = harness();
    std::fs::write(
        dir.path().join("save_3.json"),
        r#"{"history": [], "state": {"closeness": 90, "relationship_state": "intimate",
            "mood_today": "normal", "current_location": "atlantis"}}"#,
    )
    .unwrap();

    assert!(!harness.session.load(3).await);
    assert_location(&harness, "main_building_f2_corridor");
}

#[tokio::test]
async fn test_loaded_tier_follows_closeness() {
    let (dir, mut harness) = harness();
    std::fs::write(
        dir.path().join("save_4.json"),
        r#"{"history": [{"role": "user", "content": "hi"}],
            "state": {"closeness": 85, "relationship_state": "initial",
            "mood_today": "sleepy", "current_location": "library"}}"#,
    )
    .unwrap();

    assert!(harness.session.load(4).await);
    assert_eq!(
        harness.session.state().relationship_state(),
        galgame_core::RelationshipState::Intimate
    );
    assert_eq!(harness.session.state().mood_today, "sleepy");
}

#[tokio::test]
async fn test_loading_an_ending_resumes_ended_story() {
    let (_dir, mut harness) = harness();
    harness.input("/debug closeness 100").await;
    harness.input("Hi").await;
    harness.input("I love you").await;
    harness.session.start_new_game();
    assert_eq!(harness.session.phase(), StoryPhase::Normal);

    assert!(harness.session.load(SaveSlot::happy_ending()).await);
    assert!(matches!(harness.session.phase(), StoryPhase::Ended(_)));
}

#[tokio::test]
async fn test_list_saves() {
    let (dir, mut harness) = harness();
    assert!(harness.session.list_saves().await.unwrap().is_empty());

    assert!(harness.session.save(1).await);
    assert!(harness.session.save(2).await);

    let saves = harness.session.list_saves().await.unwrap();
    let mut slots: Vec<_> = saves.iter().map(|s| s.slot.as_str().to_string()).collect();
    slots.sort();
    assert_eq!(slots, vec!["1", "2"]);
    assert!(saves.iter().all(|s| s.meta.as_ref().is_some_and(|m| m.version == "1.0")));
    assert!(saves.iter().all(|s| s.path.starts_with(dir.path())));
}

#[tokio::test]
async fn test_save_into_missing_directory_creates_it() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let nested = dir.path().join("a").join("b");
    let harness =
        TestHarness::with_config(SessionConfig::new().with_save_dir(&nested).with_seed(1));

    assert!(harness.session.save(1).await);
    assert!(nested.join("save_1.json").exists());
}
