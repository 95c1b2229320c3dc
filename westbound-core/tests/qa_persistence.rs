//! QA tests for save/load and state serialization symmetry.
//!
//! Run with: `cargo test -p westbound-core --test qa_persistence`

use narrator::MockNarrator;
use std::sync::Arc;
use tempfile::TempDir;
use westbound_core::combat::{apply_combat_action, start_combat, CombatAction};
use westbound_core::dice::DiceStream;
use westbound_core::directive::Attribute;
use westbound_core::persist::{PersistError, SavedSession};
use westbound_core::state::{GameState, PacingMode, Stats};
use westbound_core::{EventLog, GameSession, SessionConfig};

fn populated_state() -> GameState {
    let mut state = GameState::new("sess_qa_persist");
    state.player_id = Some("player_42".to_string());
    state.mode = PacingMode::Fast15;
    state.threat = 3;
    state.player.name = "Archivist".to_string();
    state.player.race_id = "human".to_string();
    state.player.class_id = "talismanist".to_string();
    state.player.stats = Stats {
        body: 9,
        mind: 16,
        spirit: 13,
        luck: 11,
    };
    state.player.hp = 7;
    state.player.max_hp = 14;
    state.player.gold = 123;
    state.player.inventory = vec!["dagger".to_string(), "incense_charm".to_string()];
    state.story.location = "Ferry Crossing".to_string();
    state.story.quest_title = "The Silent Bell".to_string();
    state.story.current_goal = "Find the bell's keeper".to_string();
    state.story.turn = 9;
    state.story.progress = 4;
    state.story.threat_level = 6;
    state.story.flags = vec!["clue:bell".to_string(), "finale".to_string()];
    state
}

// =============================================================================
// TEST 1: Serialization symmetry
// =============================================================================

#[test]
fn test_every_field_survives_a_round_trip() {
    let state = populated_state();
    let json = serde_json::to_string_pretty(&state).unwrap();
    let restored: GameState = serde_json::from_str(&json).unwrap();

    assert_eq!(restored.session_id, state.session_id);
    assert_eq!(restored.player_id, state.player_id);
    assert_eq!(restored.mode, state.mode);
    assert_eq!(restored.threat, state.threat);
    assert_eq!(restored.player.stats, state.player.stats);
    assert_eq!(restored.player.hp, state.player.hp);
    assert_eq!(restored.player.max_hp, state.player.max_hp);
    assert_eq!(restored.player.gold, state.player.gold);
    assert_eq!(restored.player.inventory, state.player.inventory);
    assert_eq!(restored.story.turn, state.story.turn);
    assert_eq!(restored.story.progress, state.story.progress);
    assert_eq!(restored.story.threat_level, state.story.threat_level);
    assert_eq!(restored.story.flags, state.story.flags);
    assert_eq!(restored, state);
}

#[test]
fn test_mid_combat_state_round_trips() {
    let mut dice = DiceStream::seeded(21);
    let mut state = populated_state();
    state.player.stats.set(Attribute::Body, 12);
    start_combat(&mut state, "goblin_road", &mut dice);
    apply_combat_action(&mut state, &CombatAction::Defend, &mut dice);
    apply_combat_action(
        &mut state,
        &CombatAction::Skill {
            id: Some("focus_charm".to_string()),
        },
        &mut dice,
    );

    let json = serde_json::to_string(&state).unwrap();
    let restored: GameState = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, state);

    let cs = restored.combat.as_ref().unwrap();
    assert_eq!(cs.enemy_pack_id, "goblin_road");
}

// =============================================================================
// TEST 2: Save files
// =============================================================================

#[tokio::test]
async fn test_saved_session_round_trips_through_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("qa_save.json");

    let state = populated_state();
    let events = EventLog::new("sess_qa_persist");
    SavedSession::new(state.clone(), events.clone())
        .save_json(&path)
        .await
        .unwrap();

    let loaded = SavedSession::load_json(&path).await.unwrap();
    assert_eq!(loaded.state, state);
    assert_eq!(loaded.events, events);
}

#[tokio::test]
async fn test_future_save_versions_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("future.json");

    let mut saved = SavedSession::new(populated_state(), EventLog::new("sess_qa_persist"));
    saved.version = 2;
    tokio::fs::write(&path, serde_json::to_string(&saved).unwrap())
        .await
        .unwrap();

    assert!(matches!(
        SavedSession::load_json(&path).await,
        Err(PersistError::VersionMismatch {
            expected: 1,
            found: 2
        })
    ));
}

#[tokio::test]
async fn test_missing_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("does_not_exist.json");
    assert!(matches!(
        SavedSession::load_json(&path).await,
        Err(PersistError::Io(_))
    ));
}

// =============================================================================
// TEST 3: Whole sessions
// =============================================================================

#[tokio::test]
async fn test_session_resumes_where_it_left_off() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("resume.json");

    let config = SessionConfig::new("Resumer")
        .with_session_id("sess_resume")
        .with_seed(9);
    let mut session = GameSession::new(Arc::new(MockNarrator::new()), config);
    session.player_action("inspect the milestone").await;
    session.player_action("walk on").await;
    let turn_before = session.state().story.turn;
    session.save(&path).await.unwrap();

    let mut restored = GameSession::load(Arc::new(MockNarrator::new()), &path)
        .await
        .unwrap();
    assert_eq!(restored.state(), session.state());
    assert_eq!(restored.log(), session.log());

    restored.player_action("keep going").await;
    assert_eq!(restored.state().story.turn, turn_before + 1);
}
