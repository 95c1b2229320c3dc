//! GameSession — the primary public API.
//!
//! Wraps the engine, the state and the event log into one object per
//! session, and provides the per-session mutual exclusion required when
//! several callers (chat rooms, bots) drive sessions concurrently: actions
//! against one session serialize, different sessions run in parallel.

use crate::dice::{AbilityMethod, DiceStream};
use crate::engine::{GameEngine, TurnResult, DEFAULT_NARRATOR_TIMEOUT};
use crate::events::EventLog;
use crate::persist::{PersistError, SavedSession};
use crate::state::{new_session_id, GameState, PacingMode, Stats};
use narrator::Narrator;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

/// Default system prompt handed to the narrator.
pub const DEFAULT_SYSTEM_PROMPT: &str = include_str!("prompts/narrator_base.txt");

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),
}

/// Configuration for creating a new session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Explicit session id; generated when absent.
    pub session_id: Option<String>,

    /// Identity of the owning player, if any.
    pub player_id: Option<String>,

    /// Player character name.
    pub player_name: String,

    /// Character class id (drives the combat skill list).
    pub class_id: String,

    /// Character race id.
    pub race_id: String,

    /// Session pacing.
    pub mode: PacingMode,

    /// Seed for the dice stream; entropy when absent.
    pub seed: Option<u64>,

    /// How ability scores are rolled; flat 10s when absent.
    pub ability_method: Option<AbilityMethod>,

    /// System prompt for the narrator.
    pub system_prompt: String,

    /// Bound on each narrator call.
    pub narrator_timeout: Duration,
}

impl SessionConfig {
    pub fn new(player_name: impl Into<String>) -> Self {
        Self {
            session_id: None,
            player_id: None,
            player_name: player_name.into(),
            class_id: "martial".to_string(),
            race_id: "human".to_string(),
            mode: PacingMode::default(),
            seed: None,
            ability_method: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            narrator_timeout: DEFAULT_NARRATOR_TIMEOUT,
        }
    }

    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    pub fn with_player_id(mut self, id: impl Into<String>) -> Self {
        self.player_id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class_id: impl Into<String>) -> Self {
        self.class_id = class_id.into();
        self
    }

    pub fn with_mode(mut self, mode: PacingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_rolled_stats(mut self, method: AbilityMethod) -> Self {
        self.ability_method = Some(method);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_narrator_timeout(mut self, timeout: Duration) -> Self {
        self.narrator_timeout = timeout;
        self
    }
}

/// One playable session.
pub struct GameSession {
    engine: GameEngine,
    state: GameState,
    log: EventLog,
    system_prompt: String,
}

impl GameSession {
    /// Create a session from a config.
    pub fn new(narrator: Arc<dyn Narrator>, config: SessionConfig) -> Self {
        let session_id = config.session_id.unwrap_or_else(new_session_id);
        let mut dice = match config.seed {
            Some(seed) => DiceStream::seeded(seed),
            None => DiceStream::from_entropy(),
        };

        let mut state = GameState::new(session_id.clone());
        state.player_id = config.player_id;
        state.mode = config.mode;
        state.player.name = config.player_name;
        state.player.class_id = config.class_id;
        state.player.race_id = config.race_id;
        if let Some(method) = config.ability_method {
            state.player.stats = Stats::generate(&mut dice, method);
        }

        let engine = GameEngine::new(narrator)
            .with_dice(dice)
            .with_narrator_timeout(config.narrator_timeout);

        Self {
            engine,
            state,
            log: EventLog::new(session_id),
            system_prompt: config.system_prompt,
        }
    }

    /// Process one player action. This is the main gameplay entry point.
    pub async fn player_action(&mut self, input: &str) -> TurnResult {
        self.engine
            .run_turn(&mut self.state, &mut self.log, input, &self.system_prompt)
            .await
    }

    pub fn session_id(&self) -> &str {
        &self.state.session_id
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Direct state access; bypasses the rules, use with caution.
    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn in_combat(&self) -> bool {
        crate::combat::is_combat_active(&self.state)
    }

    /// Current and maximum HP.
    pub fn hp_status(&self) -> (i32, i32) {
        (self.state.player.hp.max(0), self.state.player.max_hp)
    }

    /// Reseed the dice stream. Callers holding the session lock cannot race
    /// in-flight rolls.
    pub fn reseed(&mut self, seed: u64) {
        self.engine.dice_mut().reseed(seed);
    }

    /// Save state and events to a JSON file.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        SavedSession::new(self.state.clone(), self.log.clone())
            .save_json(path)
            .await?;
        Ok(())
    }

    /// Load a saved session, resuming with the given narrator.
    pub async fn load(
        narrator: Arc<dyn Narrator>,
        path: impl AsRef<Path>,
    ) -> Result<Self, SessionError> {
        let saved = SavedSession::load_json(path).await?;
        let engine = GameEngine::new(narrator);
        Ok(Self {
            engine,
            state: saved.state,
            log: saved.events,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        })
    }
}

/// Registry of live sessions with per-session locks.
///
/// `Arc<Mutex<GameSession>>` is the unit of mutual exclusion: callers lock
/// exactly the session they act on.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<Mutex<GameSession>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session under its own id.
    pub async fn insert(&self, session: GameSession) -> Arc<Mutex<GameSession>> {
        let id = session.session_id().to_string();
        let handle = Arc::new(Mutex::new(session));
        self.sessions.lock().await.insert(id, handle.clone());
        handle
    }

    /// Look up a session's lock.
    pub async fn get(&self, session_id: &str) -> Option<Arc<Mutex<GameSession>>> {
        self.sessions.lock().await.get(session_id).cloned()
    }

    /// Fetch or lazily create the session for an id.
    pub async fn get_or_create(
        &self,
        session_id: &str,
        narrator: Arc<dyn Narrator>,
        config: impl FnOnce() -> SessionConfig,
    ) -> Arc<Mutex<GameSession>> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                let config = config().with_session_id(session_id);
                Arc::new(Mutex::new(GameSession::new(narrator, config)))
            })
            .clone()
    }

    /// Drop a session from the registry.
    pub async fn remove(&self, session_id: &str) -> Option<Arc<Mutex<GameSession>>> {
        self.sessions.lock().await.remove(session_id)
    }

    pub async fn ids(&self) -> Vec<String> {
        self.sessions.lock().await.keys().cloned().collect()
    }
}
