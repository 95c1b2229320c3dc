//! Westbound — a dice-driven solo journey RPG engine.
//!
//! The narrator (an external text-generating service) is untrusted: its
//! output passes through a directive pipeline — extraction, validation,
//! repair and guardrail sanitization — before any game rule acts on it.
//! Combat, by contrast, is fully deterministic given the dice stream and
//! the player's choices; nothing the narrator says can reach into it.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use narrator::MockNarrator;
//! use westbound_core::{GameSession, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = SessionConfig::new("Wayfarer").with_seed(7);
//!     let mut session = GameSession::new(Arc::new(MockNarrator::new()), config);
//!
//!     let result = session.player_action("inspect the roadside shrine").await;
//!     println!("{}", result.narrative);
//! }
//! ```

pub mod combat;
pub mod content;
pub mod dice;
pub mod directive;
pub mod engine;
pub mod events;
pub mod persist;
pub mod session;
pub mod state;
pub mod testing;

// Primary public API
pub use combat::{
    apply_combat_action, combat_prompt, finalize_combat, is_combat_active, parse_combat_input,
    start_combat, CombatAction, CombatOutcome, CombatSession,
};
pub use dice::{
    ability_modifier, outcome_tier, passive_value, resolve_check, AbilityMethod, CheckResult,
    DiceStream, OutcomeTier, RollMode,
};
pub use directive::{parse_narration, Attribute, Directive};
pub use engine::{GameEngine, TurnResult};
pub use events::{EventKind, EventLog, EventRecord};
pub use session::{GameSession, SessionConfig, SessionError, SessionRegistry};
pub use state::{GameState, PacingMode, PlayerState, Stats, StoryState};
pub use testing::{ScriptedNarrator, TestHarness};
