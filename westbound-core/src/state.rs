//! Durable game state: the player, the story, and any combat record.
//!
//! The whole tree derives `Serialize`/`Deserialize`; a round-trip through
//! JSON reproduces every field exactly, which the persistence layer and the
//! session store rely on.

use crate::combat::CombatSession;
use crate::dice::{generate_ability_score, AbilityMethod, DiceStream};
use crate::directive::Attribute;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

/// Session threat level at which the finale flag raises.
pub const FINALE_THREAT: i32 = 6;

/// Flag recorded when the pacing clock runs out.
pub const FINALE_FLAG: &str = "finale";

const SESSION_ID_ATTEMPTS: usize = 64;

/// Player ability scores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub body: i32,
    pub mind: i32,
    pub spirit: i32,
    pub luck: i32,
}

impl Stats {
    pub fn get(&self, attribute: Attribute) -> i32 {
        match attribute {
            Attribute::Body => self.body,
            Attribute::Mind => self.mind,
            Attribute::Spirit => self.spirit,
            Attribute::Luck => self.luck,
        }
    }

    pub fn set(&mut self, attribute: Attribute, score: i32) {
        match attribute {
            Attribute::Body => self.body = score,
            Attribute::Mind => self.mind = score,
            Attribute::Spirit => self.spirit = score,
            Attribute::Luck => self.luck = score,
        }
    }

    /// Roll a full stat block with the given method.
    pub fn generate(dice: &mut DiceStream, method: AbilityMethod) -> Self {
        let mut stats = Stats::default();
        for attribute in Attribute::all() {
            stats.set(attribute, generate_ability_score(dice, method));
        }
        stats
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            body: 10,
            mind: 10,
            spirit: 10,
            luck: 10,
        }
    }
}

/// The player character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub name: String,
    pub race_id: String,
    pub class_id: String,
    pub stats: Stats,
    pub hp: i32,
    pub max_hp: i32,
    pub gold: i32,
    pub inventory: Vec<String>,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            name: "hero".to_string(),
            race_id: "human".to_string(),
            class_id: "martial".to_string(),
            stats: Stats::default(),
            hp: 12,
            max_hp: 12,
            gold: 50,
            inventory: Vec::new(),
        }
    }
}

/// The ongoing story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryState {
    pub location: String,
    pub quest_title: String,
    pub current_goal: String,
    pub turn: u32,
    pub progress: i32,
    pub threat_level: i32,
    pub flags: Vec<String>,
}

impl Default for StoryState {
    fn default() -> Self {
        Self {
            location: "Roadside Tea Stall".to_string(),
            quest_title: "First Chapter".to_string(),
            current_goal: "Observe and collect clues".to_string(),
            turn: 0,
            progress: 0,
            threat_level: 1,
            flags: Vec::new(),
        }
    }
}

/// Session pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PacingMode {
    /// Short sessions: a per-turn threat clock drives toward a finale.
    #[default]
    #[serde(rename = "fast15")]
    Fast15,
    /// Untimed play: no session clock.
    #[serde(rename = "standard")]
    Standard,
}

impl fmt::Display for PacingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PacingMode::Fast15 => "fast15",
            PacingMode::Standard => "standard",
        };
        write!(f, "{s}")
    }
}

/// Everything durable about one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub session_id: String,
    pub player_id: Option<String>,
    pub mode: PacingMode,
    /// The session clock in `[0, FINALE_THREAT]`-ish territory; distinct
    /// from the story's `threat_level`.
    pub threat: i32,
    pub player: PlayerState,
    pub story: StoryState,
    #[serde(default)]
    pub combat: Option<CombatSession>,
}

impl GameState {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            player_id: None,
            mode: PacingMode::default(),
            threat: 0,
            player: PlayerState::default(),
            story: StoryState::default(),
            combat: None,
        }
    }

    /// Advance the session clock one turn; raises the finale flag once the
    /// clock reaches [`FINALE_THREAT`]. No-op outside Fast15 pacing.
    pub fn advance_pacing_clock(&mut self) {
        if self.mode != PacingMode::Fast15 {
            return;
        }
        self.threat = (self.threat + 1).max(0);
        if self.threat >= FINALE_THREAT && !self.story.flags.iter().any(|f| f == FINALE_FLAG) {
            self.story.flags.push(FINALE_FLAG.to_string());
        }
    }
}

/// A fresh session id.
pub fn new_session_id() -> String {
    format!("sess_{}", Uuid::new_v4().simple())
}

/// Allocate a session id not present in `taken`.
///
/// Exhausting the attempt budget means the id generator is broken; that is
/// a programmer error, not a recoverable condition, so it panics.
pub fn allocate_session_id(taken: &HashSet<String>) -> String {
    for _ in 0..SESSION_ID_ATTEMPTS {
        let id = new_session_id();
        if !taken.contains(&id) {
            return id;
        }
    }
    panic!("failed to allocate a unique session id after {SESSION_ID_ATTEMPTS} attempts");
}
