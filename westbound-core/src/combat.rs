//! Combat session state machine.
//!
//! A combat session is a self-contained, multi-round, multi-encounter
//! battle resolver. Its outcome depends only on the dice stream and the
//! player's chosen actions; nothing the narrator said can reach into it.
//!
//! Lifecycle: [`start_combat`] builds the session, [`apply_combat_action`]
//! advances it one player decision at a time, and once it goes inactive
//! [`finalize_combat`] converts the result into durable rewards and
//! collapses the session to a minimal terminal record.

use crate::content::{self, EncounterSpec, ItemEffect, ItemKind};
use crate::dice::{ability_modifier, DiceStream, RollMode};
use crate::directive::Attribute;
use crate::state::{GameState, PlayerState};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// DC of the Luck check made when fleeing.
pub const FLEE_DC: i32 = 12;

/// How a finished combat session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatOutcome {
    Victory,
    Defeat,
    Flee,
    ForcedEnd,
}

impl fmt::Display for CombatOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CombatOutcome::Victory => "victory",
            CombatOutcome::Defeat => "defeat",
            CombatOutcome::Flee => "flee",
            CombatOutcome::ForcedEnd => "forced_end",
        };
        write!(f, "{s}")
    }
}

/// Kinds of timed player effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Defend,
    Buff,
    FleeSuccess,
    EnemyPenalty,
}

/// A timed effect on the player, decremented once per round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effect {
    pub kind: EffectKind,
    pub turns_remaining: i32,
    #[serde(default)]
    pub roll_bonus: i32,
}

impl Effect {
    pub fn marker(kind: EffectKind, turns: i32) -> Self {
        Self {
            kind,
            turns_remaining: turns,
            roll_bonus: 0,
        }
    }

    pub fn buff(roll_bonus: i32, turns: i32) -> Self {
        Self {
            kind: EffectKind::Buff,
            turns_remaining: turns,
            roll_bonus,
        }
    }
}

/// One enemy in the current encounter. A dead enemy (hp 0) stays in the
/// roster for log and loot bookkeeping but is never targeted again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enemy {
    pub id: String,
    pub name: String,
    pub hp: i32,
    pub ac: i32,
    pub attack_dc: i32,
    pub dmg: i32,
    pub loot_gold: (i32, i32),
}

/// Mutable state for one battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatSession {
    pub active: bool,
    pub enemy_pack_id: String,
    pub encounter_index: u32,
    pub encounters_total: u32,
    pub round: i32,
    pub max_round: i32,
    pub enemies: Vec<Enemy>,
    pub player_effects: Vec<Effect>,
    pub skill_cooldowns: HashMap<String, i32>,
    pub loot_pending_gold: i32,
    pub result: Option<CombatOutcome>,
    pub log: Vec<String>,
}

impl CombatSession {
    /// The minimal record a session collapses to after finalize.
    fn terminal(result: Option<CombatOutcome>, log: Vec<String>) -> Self {
        Self {
            active: false,
            enemy_pack_id: String::new(),
            encounter_index: 0,
            encounters_total: 0,
            round: 0,
            max_round: 0,
            enemies: Vec::new(),
            player_effects: Vec::new(),
            skill_cooldowns: HashMap::new(),
            loot_pending_gold: 0,
            result,
            log,
        }
    }

    fn living(&self) -> impl Iterator<Item = &Enemy> {
        self.enemies.iter().filter(|e| e.hp > 0)
    }

    fn has_living(&self) -> bool {
        self.living().next().is_some()
    }

    fn first_living_index(&self) -> Option<usize> {
        self.enemies.iter().position(|e| e.hp > 0)
    }

    fn has_effect(&self, kind: EffectKind) -> bool {
        self.player_effects.iter().any(|e| e.kind == kind)
    }

    fn active_roll_bonus(&self) -> i32 {
        self.player_effects.iter().map(|e| e.roll_bonus).sum()
    }

    fn tick_effects(&mut self) {
        for effect in &mut self.player_effects {
            effect.turns_remaining -= 1;
        }
        self.player_effects.retain(|e| e.turns_remaining > 0);
    }

    fn tick_cooldowns(&mut self) {
        for left in self.skill_cooldowns.values_mut() {
            *left = (*left - 1).max(0);
        }
    }
}

/// One player decision per combat round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CombatAction {
    Attack,
    Skill { id: Option<String> },
    UseItem { id: Option<String> },
    Defend,
    Flee,
}

/// Map free-text combat input onto an action.
///
/// Unrecognized input defaults to `Attack` rather than rejecting the turn.
pub fn parse_combat_input(text: &str) -> CombatAction {
    let raw = text.trim().to_lowercase();
    if raw == "1" || raw == "attack" {
        return CombatAction::Attack;
    }
    if raw.starts_with('2') || raw.starts_with("skill") {
        return CombatAction::Skill {
            id: argument_of(&raw),
        };
    }
    if raw.starts_with('3') || raw.starts_with("use ") {
        return CombatAction::UseItem {
            id: argument_of(&raw),
        };
    }
    if raw == "4" || raw == "defend" {
        return CombatAction::Defend;
    }
    if raw == "5" || raw == "flee" {
        return CombatAction::Flee;
    }
    CombatAction::Attack
}

fn argument_of(raw: &str) -> Option<String> {
    raw.split_once(char::is_whitespace)
        .map(|(_, rest)| rest.trim().to_string())
        .filter(|rest| !rest.is_empty())
}

/// Whether a combat session is currently running.
pub fn is_combat_active(state: &GameState) -> bool {
    state.combat.as_ref().map(|cs| cs.active).unwrap_or(false)
}

/// Begin a combat session against the given pack.
///
/// Unknown or empty packs fall back to the default pack; the requested id
/// is kept for display and later encounter lookups.
pub fn start_combat(state: &mut GameState, enemy_pack_id: &str, dice: &mut DiceStream) {
    let pack = resolve_pack(enemy_pack_id);
    let encounters_total = (pack.encounters.len() as u32).clamp(1, 3);
    let first = pack.encounters.first();
    let enemies = build_encounter(enemy_pack_id, first);
    let max_round = roll_max_round(first, dice);

    state.combat = Some(CombatSession {
        active: true,
        enemy_pack_id: enemy_pack_id.to_string(),
        encounter_index: 1,
        encounters_total,
        round: 1,
        max_round,
        enemies,
        player_effects: Vec::new(),
        skill_cooldowns: HashMap::new(),
        loot_pending_gold: 0,
        result: None,
        log: vec![format!(
            "Combat started: {enemy_pack_id} (1/{encounters_total})."
        )],
    });
}

fn resolve_pack(id: &str) -> &'static content::EnemyPack {
    content::enemy_pack(id)
        .filter(|pack| !pack.encounters.is_empty())
        .unwrap_or_else(content::default_pack)
}

/// Roster construction with defensive minimums: hp >= 1, ac >= 8,
/// attack_dc >= max(8, ac), dmg >= 1.
fn build_encounter(pack_id: &str, encounter: Option<&EncounterSpec>) -> Vec<Enemy> {
    let specs = encounter.map(|e| e.enemies.as_slice()).unwrap_or(&[]);
    let mut out: Vec<Enemy> = specs
        .iter()
        .enumerate()
        .map(|(idx, spec)| {
            let ac = spec.ac.max(8);
            Enemy {
                id: format!("{pack_id}_mob_{}", idx + 1),
                name: spec.name.clone(),
                hp: spec.hp.max(1),
                ac,
                attack_dc: spec.attack_dc.max(8).max(ac),
                dmg: spec.dmg.max(1),
                loot_gold: spec.loot_gold,
            }
        })
        .collect();

    if out.is_empty() {
        out.push(Enemy {
            id: format!("{pack_id}_mob_1"),
            name: "Enemy".to_string(),
            hp: 1,
            ac: 11,
            attack_dc: 11,
            dmg: 1,
            loot_gold: (1, 3),
        });
    }
    out
}

fn roll_max_round(encounter: Option<&EncounterSpec>, dice: &mut DiceStream) -> i32 {
    encounter
        .and_then(|e| e.max_round)
        .unwrap_or_else(|| dice.roll(1, 3)[0] + 1)
        .clamp(2, 4)
}

/// Ordered forced-end pacing penalties; the first applicable entry wins.
#[derive(Debug, Clone, Copy)]
enum ForcedEndPenalty {
    LoseHp { amount: i32 },
    LoseGold { amount: i32 },
    RaiseThreat { amount: i32 },
}

const FORCED_END_PENALTIES: &[ForcedEndPenalty] = &[
    ForcedEndPenalty::LoseHp { amount: 1 },
    ForcedEndPenalty::LoseGold { amount: 5 },
    ForcedEndPenalty::RaiseThreat { amount: 1 },
];

impl ForcedEndPenalty {
    fn try_apply(&self, state: &mut GameState, log: &mut Vec<String>) -> bool {
        match *self {
            ForcedEndPenalty::LoseHp { amount } => {
                if state.player.hp <= amount {
                    return false;
                }
                state.player.hp -= amount;
                log.push(format!("Forced ending: you retreat with {amount} HP loss."));
                true
            }
            ForcedEndPenalty::LoseGold { amount } => {
                if state.player.gold < amount {
                    return false;
                }
                state.player.gold -= amount;
                log.push(format!(
                    "Forced ending: you lose {amount} gold while retreating."
                ));
                true
            }
            ForcedEndPenalty::RaiseThreat { amount } => {
                state.threat = (state.threat + amount).max(0);
                log.push(format!(
                    "Forced ending: pressure increases (threat +{amount})."
                ));
                true
            }
        }
    }
}

fn apply_forced_end_penalty(state: &mut GameState, log: &mut Vec<String>) {
    for penalty in FORCED_END_PENALTIES {
        if penalty.try_apply(state, log) {
            break;
        }
    }
}

/// Apply one player action to the active combat session.
///
/// No-op when combat is not active. All mutation happens through this call;
/// the session never advances on its own.
pub fn apply_combat_action(state: &mut GameState, action: &CombatAction, dice: &mut DiceStream) {
    let Some(mut cs) = state.combat.take() else {
        return;
    };
    if cs.active {
        step(state, &mut cs, action, dice);
        debug_assert!(state.player.hp >= 0, "player HP must never go negative");
        debug_assert!(
            cs.enemies.iter().all(|e| e.hp >= 0),
            "enemy HP must never go negative"
        );
    }
    state.combat = Some(cs);
}

fn step(state: &mut GameState, cs: &mut CombatSession, action: &CombatAction, dice: &mut DiceStream) {
    // A round-limit breach is checked before the new action spends the turn.
    if cs.round > cs.max_round {
        cs.active = false;
        cs.result = Some(CombatOutcome::ForcedEnd);
        return;
    }

    let mut skill_bonus = 0;
    let mut skill_extra_damage = 0;
    let mut attack_attribute = Attribute::Body;
    let mut mitigated = false;

    match action {
        CombatAction::Defend => {
            cs.player_effects.push(Effect::marker(EffectKind::Defend, 1));
            mitigated = true;
            cs.log.push("You defend this round.".to_string());
        }
        CombatAction::Flee => {
            if cs.has_effect(EffectKind::FleeSuccess) {
                cs.active = false;
                cs.result = Some(CombatOutcome::Flee);
                cs.log.push("You slip away under cover of smoke.".to_string());
                return;
            }
            let roll = dice.roll_d20(RollMode::Normal);
            let total = roll.value + ability_modifier(state.player.stats.get(Attribute::Luck));
            if total >= FLEE_DC {
                cs.active = false;
                cs.result = Some(CombatOutcome::Flee);
                cs.log.push("You escaped from combat.".to_string());
                return;
            }
            cs.log.push(format!("Flee failed ({total} vs {FLEE_DC})."));
        }
        CombatAction::UseItem { id } => {
            let item_id = id
                .clone()
                .filter(|id| !id.is_empty())
                .or_else(|| state.player.inventory.first().cloned());
            use_item(state, cs, item_id.as_deref());
        }
        CombatAction::Skill { id } => {
            // An unknown or unavailable skill degrades to a plain attack:
            // resolve_skill leaves every bonus at zero and the swing below
            // proceeds regardless.
            resolve_skill(
                state,
                cs,
                id.as_deref(),
                &mut skill_bonus,
                &mut skill_extra_damage,
                &mut attack_attribute,
            );
        }
        CombatAction::Attack => {}
    }

    let attacking = matches!(action, CombatAction::Attack | CombatAction::Skill { .. });
    let mut hit = false;
    if attacking {
        hit = resolve_attack(
            state,
            cs,
            dice,
            attack_attribute,
            skill_bonus,
            skill_extra_damage,
        );
    }

    let retaliation_due = (attacking && !hit)
        || matches!(
            action,
            CombatAction::Defend | CombatAction::Flee | CombatAction::UseItem { .. }
        );
    if cs.has_living() && retaliation_due {
        let dmg = enemy_retaliation(state, cs, mitigated);
        if dmg > 0 {
            cs.log.push(format!("Enemies retaliate for {dmg} damage."));
        }
    }

    if state.player.hp <= 0 {
        cs.active = false;
        cs.result = Some(CombatOutcome::Defeat);
        cs.log.push("You are down.".to_string());
        return;
    }

    if !cs.has_living() {
        if cs.encounter_index < cs.encounters_total {
            advance_encounter(cs, dice);
            return;
        }
        cs.active = false;
        cs.result = Some(CombatOutcome::Victory);
        cs.log.push("All encounters cleared.".to_string());
        return;
    }

    cs.round += 1;
    if cs.round > cs.max_round {
        apply_forced_end_penalty(state, &mut cs.log);
        cs.active = false;
        cs.result = Some(CombatOutcome::ForcedEnd);
        return;
    }

    cs.tick_effects();
    cs.tick_cooldowns();
}

fn use_item(state: &mut GameState, cs: &mut CombatSession, item_id: Option<&str>) {
    let found = item_id.and_then(content::item);
    let consumed = match (item_id, found) {
        (Some(id), Some(_)) => consume_inventory(&mut state.player, id),
        _ => false,
    };
    let Some(item) = found.filter(|_| consumed) else {
        cs.log.push(format!(
            "Item use failed: {}.",
            item_id.unwrap_or("none")
        ));
        return;
    };

    if item.heal > 0 {
        state.player.hp = (state.player.hp + item.heal).min(state.player.max_hp);
    }
    if item.roll_bonus > 0 {
        cs.player_effects
            .push(Effect::buff(item.roll_bonus, item.duration.max(1)));
    }
    match item.effect {
        // Lasts through the end-of-round tick so the next flee can use it.
        Some(ItemEffect::FleeSuccess) => cs
            .player_effects
            .push(Effect::marker(EffectKind::FleeSuccess, 2)),
        // Applies to this round's retaliation, then expires.
        Some(ItemEffect::EnemyPenalty) => cs
            .player_effects
            .push(Effect::marker(EffectKind::EnemyPenalty, 1)),
        None => {}
    }
    cs.log.push(format!("Used item: {}.", item.id));
}

fn consume_inventory(player: &mut PlayerState, item_id: &str) -> bool {
    if let Some(pos) = player.inventory.iter().position(|id| id == item_id) {
        player.inventory.remove(pos);
        true
    } else {
        false
    }
}

/// Resolve skill selection; returns false when the action must degrade to a
/// plain attack.
fn resolve_skill(
    state: &GameState,
    cs: &mut CombatSession,
    requested: Option<&str>,
    skill_bonus: &mut i32,
    skill_extra_damage: &mut i32,
    attack_attribute: &mut Attribute,
) -> bool {
    let allowed = content::class_skills(&state.player.class_id);
    let skill_id = requested
        .filter(|id| !id.is_empty())
        .or_else(|| allowed.first().copied())
        .unwrap_or("");
    let cooldown_left = cs.skill_cooldowns.get(skill_id).copied().unwrap_or(0);

    let available = !skill_id.is_empty() && allowed.contains(&skill_id) && cooldown_left <= 0;
    let skill = available.then(|| content::skill(skill_id)).flatten();
    let Some(skill) = skill else {
        cs.log.push(format!(
            "Skill unavailable: {}.",
            if skill_id.is_empty() { "none" } else { skill_id }
        ));
        return false;
    };

    *skill_bonus = skill.roll_bonus;
    *skill_extra_damage = skill.extra_damage;
    *attack_attribute = skill.attribute;
    cs.skill_cooldowns
        .insert(skill.id.clone(), skill.cooldown);
    cs.log.push(format!("Skill used: {}.", skill.id));
    true
}

/// Resolve an attack against the first living enemy. Returns whether it hit.
fn resolve_attack(
    state: &mut GameState,
    cs: &mut CombatSession,
    dice: &mut DiceStream,
    attribute: Attribute,
    skill_bonus: i32,
    skill_extra_damage: i32,
) -> bool {
    let Some(target) = cs.first_living_index() else {
        return false;
    };

    let roll = dice.roll_d20(RollMode::Normal);
    let nat = roll.value;
    let total = nat
        + ability_modifier(state.player.stats.get(attribute))
        + weapon_bonus(&state.player)
        + cs.active_roll_bonus()
        + skill_bonus;
    let ac = cs.enemies[target].ac;
    let hit = total >= ac;

    // A natural 1 always costs 1 HP, hit or miss.
    if nat == 1 {
        state.player.hp = (state.player.hp - 1).max(0);
        cs.log
            .push("Critical miss: you hurt yourself for 1 HP.".to_string());
    }

    if hit {
        let mut dmg = 1 + skill_extra_damage;
        if nat == 20 || total >= ac + 5 {
            dmg += 1;
        }
        let enemy = &mut cs.enemies[target];
        enemy.hp = (enemy.hp - dmg).max(0);
        cs.log.push(format!(
            "Hit {} for {dmg} (roll {total} vs AC {ac}).",
            enemy.name
        ));
        if enemy.hp == 0 {
            let gold = roll_loot(enemy.loot_gold, dice);
            cs.loot_pending_gold += gold;
        }
    } else {
        cs.log.push(format!("Missed (roll {total} vs AC {ac})."));
    }
    hit
}

fn roll_loot(range: (i32, i32), dice: &mut DiceStream) -> i32 {
    let (lo, hi) = if range.0 <= range.1 {
        range
    } else {
        (range.1, range.0)
    };
    dice.roll(1, (hi - lo + 1) as u32)[0] + lo - 1
}

fn weapon_bonus(player: &PlayerState) -> i32 {
    player
        .inventory
        .iter()
        .filter_map(|id| content::item(id))
        .find(|item| item.kind == ItemKind::Weapon)
        .map(|item| item.roll_bonus)
        .unwrap_or(0)
}

/// Retaliation damage: the first two living enemies strike together,
/// reduced by 1 (floor 0) under an active defend or enemy-penalty marker.
fn enemy_retaliation(state: &mut GameState, cs: &CombatSession, mitigated: bool) -> i32 {
    let mut dmg: i32 = cs.living().take(2).map(|e| e.dmg).sum();
    if mitigated {
        dmg = (dmg - 1).max(0);
    }
    if cs.has_effect(EffectKind::EnemyPenalty) {
        dmg = (dmg - 1).max(0);
    }
    state.player.hp = (state.player.hp - dmg).max(0);
    dmg
}

fn advance_encounter(cs: &mut CombatSession, dice: &mut DiceStream) {
    let cleared = cs.encounter_index;
    let pack_id = cs.enemy_pack_id.clone();
    let pack = resolve_pack(&pack_id);
    let next = pack.encounters.get(cs.encounter_index as usize);

    cs.encounter_index += 1;
    cs.round = 1;
    cs.max_round = roll_max_round(next, dice);
    cs.enemies = build_encounter(&pack_id, next);
    cs.log.push(format!(
        "Encounter {cleared} cleared. Next encounter begins."
    ));
    cs.tick_effects();
    cs.tick_cooldowns();
}

/// Convert an ended session's result into durable rewards and collapse it
/// to the terminal record. Call exactly once per session.
pub fn finalize_combat(state: &mut GameState, dice: &mut DiceStream) {
    let Some(cs) = state.combat.take() else {
        return;
    };
    let mut log = cs.log;
    match cs.result {
        Some(CombatOutcome::Victory) => {
            state.player.gold += cs.loot_pending_gold;
            // Flat 30% consumable drop on top of the gold.
            if dice.roll(1, 100)[0] <= 30 {
                state.player.inventory.push("healing_herbs".to_string());
            }
            log.push(format!("Victory reward: +{} gold.", cs.loot_pending_gold));
        }
        Some(CombatOutcome::Defeat) => log.push("Defeat: no loot.".to_string()),
        Some(CombatOutcome::Flee) => log.push("You fled. No loot gained.".to_string()),
        Some(CombatOutcome::ForcedEnd) => {
            log.push("Combat ended by time pressure.".to_string())
        }
        None => {}
    }
    state.combat = Some(CombatSession::terminal(cs.result, log));
}

/// Display text for the current combat state, with the action menu.
pub fn combat_prompt(state: &GameState) -> String {
    let Some(cs) = state.combat.as_ref() else {
        return "No combat.".to_string();
    };

    if !cs.active {
        let result = cs
            .result
            .map(|r| r.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let tail: Vec<&str> = cs
            .log
            .iter()
            .rev()
            .take(3)
            .rev()
            .map(String::as_str)
            .collect();
        let suffix = if tail.is_empty() {
            "Combat ended.".to_string()
        } else {
            tail.join("\n")
        };
        return format!("[combat] ended ({result}).\n{suffix}");
    }

    let enemy_lines = cs
        .living()
        .map(|e| format!("{} HP:{}", e.name, e.hp))
        .collect::<Vec<_>>()
        .join(", ");
    let enemy_lines = if enemy_lines.is_empty() {
        "none".to_string()
    } else {
        enemy_lines
    };
    let skills = content::class_skills(&state.player.class_id);
    let skill_hint = if skills.is_empty() {
        "none".to_string()
    } else {
        skills.join(",")
    };

    format!(
        "[combat] {} encounter {}/{}\n\
         Round {}/{}  HP {}/{}\n\
         Enemies: {}\n\
         Skills: {}\n\
         Actions:\n\
         1) attack\n\
         2) skill <skill_id>\n\
         3) use <item_id>\n\
         4) defend\n\
         5) flee",
        cs.enemy_pack_id,
        cs.encounter_index,
        cs.encounters_total,
        cs.round,
        cs.max_round,
        state.player.hp,
        state.player.max_hp,
        enemy_lines,
        skill_hint,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::GameState;

    fn combat_state() -> GameState {
        let mut state = GameState::new("sess_test");
        state.player.stats.set(Attribute::Body, 12);
        state.player.gold = 10;
        state.player.inventory = vec![
            "dagger".to_string(),
            "buff_potion".to_string(),
            "incense_charm".to_string(),
            "smoke_bomb".to_string(),
        ];
        state
    }

    #[test]
    fn test_parse_combat_input() {
        assert_eq!(parse_combat_input("1"), CombatAction::Attack);
        assert_eq!(parse_combat_input("  ATTACK "), CombatAction::Attack);
        assert_eq!(
            parse_combat_input("skill power_strike"),
            CombatAction::Skill {
                id: Some("power_strike".to_string())
            }
        );
        assert_eq!(parse_combat_input("2"), CombatAction::Skill { id: None });
        assert_eq!(
            parse_combat_input("use smoke_bomb"),
            CombatAction::UseItem {
                id: Some("smoke_bomb".to_string())
            }
        );
        assert_eq!(parse_combat_input("4"), CombatAction::Defend);
        assert_eq!(parse_combat_input("flee"), CombatAction::Flee);
        // Unrecognized input defaults to attack rather than rejecting the turn.
        assert_eq!(parse_combat_input("dance wildly"), CombatAction::Attack);
    }

    #[test]
    fn test_unknown_pack_falls_back_to_default() {
        let mut state = combat_state();
        let mut dice = DiceStream::seeded(3);
        start_combat(&mut state, "no_such_pack", &mut dice);
        let cs = state.combat.as_ref().unwrap();
        assert!(cs.active);
        assert_eq!(cs.enemy_pack_id, "no_such_pack");
        assert!(!cs.enemies.is_empty());
        assert!((2..=4).contains(&cs.max_round));
    }

    #[test]
    fn test_attack_only_combat_terminates() {
        let mut dice = DiceStream::seeded(7);
        let mut state = combat_state();
        start_combat(&mut state, "bandits_1", &mut dice);
        for _ in 0..10 {
            if !is_combat_active(&state) {
                break;
            }
            apply_combat_action(&mut state, &CombatAction::Attack, &mut dice);
            if !is_combat_active(&state) {
                finalize_combat(&mut state, &mut dice);
            }
        }
        assert!(!is_combat_active(&state));
        assert!(state.combat.as_ref().unwrap().result.is_some());
    }

    #[test]
    fn test_use_item_consumes_one_unit_and_buffs() {
        let mut dice = DiceStream::seeded(11);
        let mut state = combat_state();
        start_combat(&mut state, "bandits_1", &mut dice);
        let before = state.player.inventory.len();
        // incense_charm lasts two turns, so the buff is still visible after
        // the end-of-round effect tick.
        apply_combat_action(
            &mut state,
            &CombatAction::UseItem {
                id: Some("incense_charm".to_string()),
            },
            &mut dice,
        );
        assert_eq!(state.player.inventory.len(), before - 1);
        assert!(!state.player.inventory.contains(&"incense_charm".to_string()));
        let cs = state.combat.as_ref().unwrap();
        assert!(cs
            .player_effects
            .iter()
            .any(|e| e.kind == EffectKind::Buff && e.roll_bonus >= 1));
    }

    #[test]
    fn test_missing_item_logs_but_keeps_turn() {
        let mut dice = DiceStream::seeded(13);
        let mut state = combat_state();
        start_combat(&mut state, "bandits_1", &mut dice);
        apply_combat_action(
            &mut state,
            &CombatAction::UseItem {
                id: Some("phantom_elixir".to_string()),
            },
            &mut dice,
        );
        let cs = state.combat.as_ref().unwrap();
        assert!(cs
            .log
            .iter()
            .any(|line| line.contains("Item use failed: phantom_elixir")));
    }

    #[test]
    fn test_skill_sets_cooldown() {
        let mut dice = DiceStream::seeded(17);
        let mut state = combat_state();
        start_combat(&mut state, "bandits_1", &mut dice);
        apply_combat_action(
            &mut state,
            &CombatAction::Skill {
                id: Some("power_strike".to_string()),
            },
            &mut dice,
        );
        let cs = state.combat.as_ref().unwrap();
        assert!(cs.skill_cooldowns.get("power_strike").copied().unwrap_or(0) >= 1);
    }

    #[test]
    fn test_unknown_skill_degrades_to_attack() {
        let mut dice = DiceStream::seeded(19);
        let mut state = combat_state();
        start_combat(&mut state, "bandits_1", &mut dice);
        apply_combat_action(
            &mut state,
            &CombatAction::Skill {
                id: Some("no_such_skill".to_string()),
            },
            &mut dice,
        );
        let cs = state.combat.as_ref().unwrap();
        assert!(cs
            .log
            .iter()
            .any(|line| line.contains("Skill unavailable: no_such_skill")));
        // The turn still resolved an attack (hit or miss was logged).
        assert!(cs
            .log
            .iter()
            .any(|line| line.starts_with("Hit ") || line.starts_with("Missed ")));
    }

    #[test]
    fn test_hp_zero_causes_defeat() {
        let mut dice = DiceStream::seeded(23);
        let mut state = combat_state();
        state.player.hp = 1;
        start_combat(&mut state, "bandits_1", &mut dice);
        if let Some(cs) = state.combat.as_mut() {
            for enemy in &mut cs.enemies {
                enemy.ac = 30;
                enemy.dmg = 2;
            }
        }
        apply_combat_action(&mut state, &CombatAction::Attack, &mut dice);
        assert!(!is_combat_active(&state));
        assert_eq!(
            state.combat.as_ref().unwrap().result,
            Some(CombatOutcome::Defeat)
        );
    }

    #[test]
    fn test_victory_pays_out_gold() {
        let mut dice = DiceStream::seeded(1);
        let mut state = combat_state();
        start_combat(&mut state, "goblin_road", &mut dice);
        let before = state.player.gold;
        // Make every enemy trivially hittable, then swing until it ends.
        loop {
            if let Some(cs) = state.combat.as_mut() {
                for enemy in &mut cs.enemies {
                    enemy.ac = 1;
                    enemy.dmg = 0;
                }
            }
            if !is_combat_active(&state) {
                break;
            }
            apply_combat_action(&mut state, &CombatAction::Attack, &mut dice);
        }
        finalize_combat(&mut state, &mut dice);
        let cs = state.combat.as_ref().unwrap();
        if cs.result == Some(CombatOutcome::Victory) {
            assert!(state.player.gold > before);
        } else {
            // Bounded rounds can still force the end; gold never increases then.
            assert!(state.player.gold <= before);
        }
        assert!(cs.enemies.is_empty(), "terminal record keeps no roster");
    }

    #[test]
    fn test_smoke_bomb_guarantees_escape() {
        let mut dice = DiceStream::seeded(29);
        let mut state = combat_state();
        start_combat(&mut state, "bandits_1", &mut dice);
        apply_combat_action(
            &mut state,
            &CombatAction::UseItem {
                id: Some("smoke_bomb".to_string()),
            },
            &mut dice,
        );
        assert!(is_combat_active(&state));
        apply_combat_action(&mut state, &CombatAction::Flee, &mut dice);
        assert_eq!(
            state.combat.as_ref().unwrap().result,
            Some(CombatOutcome::Flee)
        );
        assert!(state
            .combat
            .as_ref()
            .unwrap()
            .log
            .iter()
            .any(|line| line.contains("cover of smoke")));
    }

    #[test]
    fn test_forced_end_penalty_priority() {
        let mut log = Vec::new();

        // HP above 1: lose HP.
        let mut state = GameState::new("s1");
        state.player.hp = 5;
        state.player.gold = 100;
        apply_forced_end_penalty(&mut state, &mut log);
        assert_eq!(state.player.hp, 4);
        assert_eq!(state.player.gold, 100);

        // HP at 1 with gold: lose gold.
        let mut state = GameState::new("s2");
        state.player.hp = 1;
        state.player.gold = 6;
        apply_forced_end_penalty(&mut state, &mut log);
        assert_eq!(state.player.hp, 1);
        assert_eq!(state.player.gold, 1);

        // Neither: threat rises.
        let mut state = GameState::new("s3");
        state.player.hp = 1;
        state.player.gold = 4;
        apply_forced_end_penalty(&mut state, &mut log);
        assert_eq!(state.player.gold, 4);
        assert_eq!(state.threat, 1);
    }

    #[test]
    fn test_defend_reduces_retaliation() {
        let mut dice = DiceStream::seeded(31);
        let mut state = combat_state();
        start_combat(&mut state, "bandits_1", &mut dice);
        let hp_before = state.player.hp;
        apply_combat_action(&mut state, &CombatAction::Defend, &mut dice);
        // bandits_1 opens with a single dmg-1 enemy; defend floors it to 0.
        assert_eq!(state.player.hp, hp_before);
    }

    #[test]
    fn test_effects_expire_after_their_duration() {
        let mut cs = CombatSession::terminal(None, Vec::new());
        cs.player_effects = vec![Effect::buff(2, 1), Effect::buff(1, 2)];
        cs.tick_effects();
        assert_eq!(cs.player_effects.len(), 1);
        assert_eq!(cs.player_effects[0].roll_bonus, 1);
        cs.tick_effects();
        assert!(cs.player_effects.is_empty());
    }

    #[test]
    fn test_dead_enemy_is_never_retargeted() {
        let mut cs = CombatSession::terminal(None, Vec::new());
        cs.enemies = vec![
            Enemy {
                id: "a".into(),
                name: "Fallen".into(),
                hp: 0,
                ac: 10,
                attack_dc: 10,
                dmg: 1,
                loot_gold: (1, 2),
            },
            Enemy {
                id: "b".into(),
                name: "Standing".into(),
                hp: 2,
                ac: 10,
                attack_dc: 10,
                dmg: 1,
                loot_gold: (1, 2),
            },
        ];
        assert_eq!(cs.first_living_index(), Some(1));
        assert_eq!(cs.living().count(), 1);
        // The dead enemy stays in the roster for bookkeeping.
        assert_eq!(cs.enemies.len(), 2);
    }
}
