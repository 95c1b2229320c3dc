//! Dice rolls and ability checks.
//!
//! All randomness flows through a [`DiceStream`] owned by the caller, so a
//! session can be reseeded for deterministic tests and replays without any
//! process-global state. Components that roll dice take `&mut DiceStream`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a d20 is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RollMode {
    #[default]
    #[serde(rename = "normal")]
    Normal,
    #[serde(rename = "adv")]
    Advantage,
    #[serde(rename = "dis")]
    Disadvantage,
}

/// A seedable stream of die rolls.
#[derive(Debug)]
pub struct DiceStream {
    rng: StdRng,
}

impl DiceStream {
    /// A stream seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// A stream with a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Reset the stream to a fixed seed, for replay and tests.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Roll `count` independent dice with the given number of sides.
    ///
    /// Every value is uniform in `[1, sides]`.
    pub fn roll(&mut self, count: u32, sides: u32) -> Vec<i32> {
        let sides = sides.max(1) as i32;
        (0..count).map(|_| self.rng.gen_range(1..=sides)).collect()
    }

    /// Roll a d20 with the given mode.
    ///
    /// Advantage rolls twice and keeps the highest, disadvantage keeps the
    /// lowest. Both raw rolls stay observable for auditing.
    pub fn roll_d20(&mut self, mode: RollMode) -> D20Roll {
        match mode {
            RollMode::Normal => {
                let rolls = self.roll(1, 20);
                D20Roll {
                    value: rolls[0],
                    rolls,
                }
            }
            RollMode::Advantage | RollMode::Disadvantage => {
                let rolls = self.roll(2, 20);
                let value = match mode {
                    RollMode::Advantage => rolls[0].max(rolls[1]),
                    _ => rolls[0].min(rolls[1]),
                };
                D20Roll { value, rolls }
            }
        }
    }
}

impl Default for DiceStream {
    fn default() -> Self {
        Self::from_entropy()
    }
}

/// Result of a d20 roll, with raw rolls retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct D20Roll {
    /// The value chosen after applying the roll mode.
    pub value: i32,
    /// The raw rolls (one for normal, two for advantage/disadvantage).
    pub rolls: Vec<i32>,
}

/// Ability modifier: `floor((score - 10) / 2)`, rounding toward negative
/// infinity (score 8 yields -1, not 0).
pub fn ability_modifier(score: i32) -> i32 {
    (score - 10).div_euclid(2)
}

/// Passive value: `10 + ability_modifier(score)`.
pub fn passive_value(score: i32) -> i32 {
    10 + ability_modifier(score)
}

/// A resolved ability check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Whether the check was resolved without a die roll.
    pub passive: bool,
    /// The roll mode that was requested (ignored when passive).
    pub mode: RollMode,
    /// The chosen d20 value, absent for passive checks.
    pub d20: Option<i32>,
    /// Raw d20 rolls, empty for passive checks.
    pub rolls: Vec<i32>,
    /// Ability modifier applied to the total.
    pub modifier: i32,
    /// Flat bonus applied to the total.
    pub bonus: i32,
    /// Final total compared against the DC.
    pub total: i32,
    /// Difficulty class.
    pub dc: i32,
    /// Whether `total >= dc`.
    pub success: bool,
}

/// Resolve an ability check against a DC.
pub fn resolve_check(
    dice: &mut DiceStream,
    score: i32,
    dc: i32,
    bonus: i32,
    mode: RollMode,
    use_passive: bool,
) -> CheckResult {
    let modifier = ability_modifier(score);
    if use_passive {
        let total = passive_value(score) + bonus;
        return CheckResult {
            passive: true,
            mode,
            d20: None,
            rolls: Vec::new(),
            modifier,
            bonus,
            total,
            dc,
            success: total >= dc,
        };
    }

    let roll = dice.roll_d20(mode);
    let total = roll.value + modifier + bonus;
    CheckResult {
        passive: false,
        mode,
        d20: Some(roll.value),
        rolls: roll.rolls,
        modifier,
        bonus,
        total,
        dc,
        success: total >= dc,
    }
}

/// Narrative tier of a check result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeTier {
    Critical,
    Success,
    Partial,
    Fail,
    Fumble,
}

impl OutcomeTier {
    /// Whether the tier counts as a success.
    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeTier::Critical | OutcomeTier::Success)
    }
}

impl fmt::Display for OutcomeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutcomeTier::Critical => "critical",
            OutcomeTier::Success => "success",
            OutcomeTier::Partial => "partial",
            OutcomeTier::Fail => "fail",
            OutcomeTier::Fumble => "fumble",
        };
        write!(f, "{s}")
    }
}

/// Tier a check total against its DC.
///
/// Boundaries are exact: `dc+5` critical, `dc` success, `dc-3` partial,
/// `dc-8` fail, below that fumble. They drive both narration and mechanics.
pub fn outcome_tier(total: i32, dc: i32) -> OutcomeTier {
    if total >= dc + 5 {
        OutcomeTier::Critical
    } else if total >= dc {
        OutcomeTier::Success
    } else if total >= dc - 3 {
        OutcomeTier::Partial
    } else if total >= dc - 8 {
        OutcomeTier::Fail
    } else {
        OutcomeTier::Fumble
    }
}

/// How ability scores are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbilityMethod {
    /// Sum of three d6.
    #[serde(rename = "3d6")]
    ThreeD6,
    /// Sum of four d6, dropping the lowest.
    #[serde(rename = "4d6dl")]
    FourD6DropLowest,
}

/// Generate one ability score, clamped to `[3, 18]`.
pub fn generate_ability_score(dice: &mut DiceStream, method: AbilityMethod) -> i32 {
    let total = match method {
        AbilityMethod::ThreeD6 => dice.roll(3, 6).iter().sum::<i32>(),
        AbilityMethod::FourD6DropLowest => {
            let mut rolls = dice.roll(4, 6);
            rolls.sort_unstable();
            rolls[1..].iter().sum::<i32>()
        }
    };
    total.clamp(3, 18)
}
