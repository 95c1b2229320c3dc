//! Directive schema, allow-lists and defaults.
//!
//! A [`Directive`] is the normalized instruction a narration turn may carry.
//! It is built fresh from raw narrator text each turn, never persisted, and
//! every field on a sanitized instance is well-typed and inside its
//! allow-list or range.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// DCs a directive check may request.
pub const ALLOWED_DCS: [i32; 4] = [10, 15, 20, 25];

/// Default DC when a directive omits or mangles one.
pub const DEFAULT_DC: i32 = 15;

/// Default check reason for repaired or fallback directives.
pub const DEFAULT_REASON: &str = "fallback";

/// Caps on list-shaped directive fields.
pub const MAX_FLAGS: usize = 8;
pub const MAX_NPC_CHANGES: usize = 5;
pub const MAX_OFFER_ACTIONS: usize = 5;
pub const MAX_TONE_TAGS: usize = 6;

/// Character cap on free-text note fields.
pub const MAX_NOTE_CHARS: usize = 160;

/// An ability a check can target. Shared between the directive schema, the
/// player stat block and the skill tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Attribute {
    Body,
    Mind,
    Spirit,
    #[default]
    Luck,
}

impl Attribute {
    pub fn all() -> [Attribute; 4] {
        [
            Attribute::Body,
            Attribute::Mind,
            Attribute::Spirit,
            Attribute::Luck,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Attribute::Body => "Body",
            Attribute::Mind => "Mind",
            Attribute::Spirit => "Spirit",
            Attribute::Luck => "Luck",
        }
    }

    /// Parse the wire spelling. Case-sensitive: the allow-list admits only
    /// the canonical capitalized names.
    pub fn parse(s: &str) -> Option<Attribute> {
        match s {
            "Body" => Some(Attribute::Body),
            "Mind" => Some(Attribute::Mind),
            "Spirit" => Some(Attribute::Spirit),
            "Luck" => Some(Attribute::Luck),
            _ => None,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// NPC attitude levels a directive may set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Attitude {
    Hostile,
    Unfriendly,
    Neutral,
    Friendly,
    Allied,
}

impl Attitude {
    pub fn parse(s: &str) -> Option<Attitude> {
        match s.trim().to_lowercase().as_str() {
            "hostile" => Some(Attitude::Hostile),
            "unfriendly" => Some(Attitude::Unfriendly),
            "neutral" => Some(Attitude::Neutral),
            "friendly" => Some(Attitude::Friendly),
            "allied" => Some(Attitude::Allied),
            _ => None,
        }
    }
}

/// The check a directive may request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSpec {
    pub attribute: Attribute,
    pub dc: i32,
    pub reason: String,
}

impl CheckSpec {
    /// The canonical safe check used by repaired and fallback directives.
    pub fn fallback() -> Self {
        Self {
            attribute: Attribute::Luck,
            dc: DEFAULT_DC,
            reason: DEFAULT_REASON.to_string(),
        }
    }
}

impl Default for CheckSpec {
    fn default() -> Self {
        Self {
            attribute: Attribute::Luck,
            dc: DEFAULT_DC,
            reason: String::new(),
        }
    }
}

/// Combat entry payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CombatSpec {
    pub enemy_pack_id: String,
}

/// Clue payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ClueSpec {
    pub title: String,
    pub detail: String,
}

/// Per-turn world advancement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldTick {
    /// Clamped to `[-2, 3]`.
    pub threat_delta: i32,
    /// Clamped to `[1, 6]`.
    pub clock_delta: i32,
    /// Truncated to [`MAX_NOTE_CHARS`].
    pub notes: String,
}

impl Default for WorldTick {
    fn default() -> Self {
        Self {
            threat_delta: 0,
            clock_delta: 1,
            notes: String::new(),
        }
    }
}

/// One NPC attitude adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpcAttitudeChange {
    pub npc_id: String,
    pub name: String,
    /// Clamped to `[-2, 2]`.
    pub delta: i32,
    pub set_to: Option<Attitude>,
    pub reason: String,
}

/// The normalized instruction extracted from one narration turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Directive {
    pub need_check: bool,
    pub check: CheckSpec,
    pub enter_combat: bool,
    pub combat: CombatSpec,
    pub grant_clue: bool,
    pub clue: ClueSpec,
    pub flags_to_add: Vec<String>,
    pub world_tick: WorldTick,
    pub npc_attitude_changes: Vec<NpcAttitudeChange>,
    pub offer_actions: Vec<String>,
    pub tone_tags: Vec<String>,
}

impl Directive {
    /// The canonical minimal safe directive, used whenever extraction or
    /// parsing fails entirely.
    pub fn fallback() -> Self {
        Self {
            check: CheckSpec::fallback(),
            ..Self::default()
        }
    }

    /// Default-filling constructor over a raw JSON object.
    ///
    /// Missing or mistyped fields become defaults, list fields are capped,
    /// numeric fields are clamped to their documented ranges. This handles
    /// the extended fields the guardrail does not own; callers overwrite
    /// the core fields from the sanitized value afterwards.
    pub fn normalized(raw: &Value) -> Self {
        let mut d = Directive::default();
        let Some(obj) = raw.as_object() else {
            return d;
        };

        d.need_check = obj.get("need_check").and_then(Value::as_bool).unwrap_or(false);
        d.enter_combat = obj.get("enter_combat").and_then(Value::as_bool).unwrap_or(false);
        d.grant_clue = obj.get("grant_clue").and_then(Value::as_bool).unwrap_or(false);

        if let Some(check) = obj.get("check").and_then(Value::as_object) {
            d.check.attribute = check
                .get("attribute")
                .and_then(Value::as_str)
                .and_then(Attribute::parse)
                .unwrap_or_default();
            d.check.dc = check
                .get("dc")
                .and_then(as_int)
                .filter(|dc| ALLOWED_DCS.contains(dc))
                .unwrap_or(DEFAULT_DC);
            d.check.reason = check
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
        }

        if let Some(combat) = obj.get("combat").and_then(Value::as_object) {
            d.combat.enemy_pack_id = combat
                .get("enemy_pack_id")
                .map(coerce_string)
                .unwrap_or_default();
        }

        if let Some(clue) = obj.get("clue").and_then(Value::as_object) {
            d.clue.title = clue
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            d.clue.detail = clue
                .get("detail")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
        }

        if let Some(flags) = obj.get("flags_to_add").and_then(Value::as_array) {
            d.flags_to_add = flags
                .iter()
                .map(coerce_string)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .take(MAX_FLAGS)
                .collect();
        }

        if let Some(wt) = obj.get("world_tick").and_then(Value::as_object) {
            d.world_tick.threat_delta = wt
                .get("threat_delta")
                .and_then(as_int)
                .unwrap_or(0)
                .clamp(-2, 3);
            d.world_tick.clock_delta = wt
                .get("clock_delta")
                .and_then(as_int)
                .unwrap_or(1)
                .clamp(1, 6);
            d.world_tick.notes = truncate_chars(
                wt.get("notes").and_then(Value::as_str).unwrap_or_default(),
                MAX_NOTE_CHARS,
            );
        }

        if let Some(rows) = obj.get("npc_attitude_changes").and_then(Value::as_array) {
            d.npc_attitude_changes = rows
                .iter()
                .take(MAX_NPC_CHANGES)
                .filter_map(|row| {
                    let row = row.as_object()?;
                    let npc_id = row
                        .get("npc_id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .trim()
                        .to_string();
                    if npc_id.is_empty() {
                        return None;
                    }
                    Some(NpcAttitudeChange {
                        npc_id,
                        name: row
                            .get("name")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .trim()
                            .to_string(),
                        delta: row.get("delta").and_then(as_int).unwrap_or(0).clamp(-2, 2),
                        set_to: row
                            .get("set_to")
                            .and_then(Value::as_str)
                            .and_then(Attitude::parse),
                        reason: truncate_chars(
                            row.get("reason").and_then(Value::as_str).unwrap_or_default().trim(),
                            MAX_NOTE_CHARS,
                        ),
                    })
                })
                .collect();
        }

        if let Some(acts) = obj.get("offer_actions").and_then(Value::as_array) {
            d.offer_actions = acts.iter().take(MAX_OFFER_ACTIONS).map(coerce_string).collect();
        }

        if let Some(tags) = obj.get("tone_tags").and_then(Value::as_array) {
            d.tone_tags = tags.iter().take(MAX_TONE_TAGS).map(coerce_string).collect();
        }

        d
    }
}

/// Integer view of a JSON value; floats are not silently rounded.
pub(crate) fn as_int(value: &Value) -> Option<i32> {
    if value.is_i64() || value.is_u64() {
        value.as_i64().and_then(|v| i32::try_from(v).ok())
    } else {
        None
    }
}

/// String view of a JSON value; non-strings render as their JSON form.
pub(crate) fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Truncate to a character count, respecting UTF-8 boundaries.
pub(crate) fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fallback_shape() {
        let d = Directive::fallback();
        assert!(!d.need_check);
        assert!(!d.enter_combat);
        assert_eq!(d.check.attribute, Attribute::Luck);
        assert_eq!(d.check.dc, 15);
        assert_eq!(d.check.reason, "fallback");
        assert!(d.flags_to_add.is_empty());
        assert_eq!(d.world_tick.clock_delta, 1);
    }

    #[test]
    fn test_normalized_clamps_world_tick() {
        let raw = json!({
            "world_tick": {"threat_delta": 99, "clock_delta": 0, "notes": "n"},
        });
        let d = Directive::normalized(&raw);
        assert_eq!(d.world_tick.threat_delta, 3);
        assert_eq!(d.world_tick.clock_delta, 1);
    }

    #[test]
    fn test_normalized_caps_lists() {
        let raw = json!({
            "flags_to_add": ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"],
            "offer_actions": [1, 2, 3, 4, 5, 6, 7],
            "tone_tags": ["t1", "t2", "t3", "t4", "t5", "t6", "t7"],
        });
        let d = Directive::normalized(&raw);
        assert_eq!(d.flags_to_add.len(), MAX_FLAGS);
        assert_eq!(d.offer_actions.len(), MAX_OFFER_ACTIONS);
        assert_eq!(d.offer_actions[0], "1");
        assert_eq!(d.tone_tags.len(), MAX_TONE_TAGS);
    }

    #[test]
    fn test_normalized_npc_rows_require_id() {
        let raw = json!({
            "npc_attitude_changes": [
                {"npc_id": "", "delta": 5},
                {"npc_id": "npc_1", "name": "Old Monk", "delta": 5, "set_to": "Friendly", "reason": "helped"},
                "not an object",
            ],
        });
        let d = Directive::normalized(&raw);
        assert_eq!(d.npc_attitude_changes.len(), 1);
        let row = &d.npc_attitude_changes[0];
        assert_eq!(row.npc_id, "npc_1");
        assert_eq!(row.delta, 2);
        assert_eq!(row.set_to, Some(Attitude::Friendly));
    }

    #[test]
    fn test_normalized_rejects_string_dc() {
        let raw = json!({"check": {"attribute": "Body", "dc": "20", "reason": "r"}});
        let d = Directive::normalized(&raw);
        assert_eq!(d.check.attribute, Attribute::Body);
        assert_eq!(d.check.dc, DEFAULT_DC);
    }
}
