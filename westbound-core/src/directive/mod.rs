//! The directive pipeline.
//!
//! Narrator output is untrusted free text that should embed one
//! machine-readable instruction object. Before any game rule may act on it,
//! the text passes through extraction ([`extract`]), hard validation and
//! best-effort repair ([`validate`]), and guardrail sanitization
//! ([`guardrail`]); the result is a typed [`Directive`] whose every field is
//! well-typed and within its allow-list or range.

mod extract;
mod guardrail;
mod schema;
mod validate;

pub use extract::{extract_first_balanced_json, extract_json_blob, strip_blob_from_narrative};
pub use guardrail::{sanitize_value, strip_pollution, ALLOWED_TOP_LEVEL};
pub use schema::{
    Attitude, Attribute, CheckSpec, ClueSpec, CombatSpec, Directive, NpcAttitudeChange, WorldTick,
    ALLOWED_DCS, DEFAULT_DC, DEFAULT_REASON, MAX_FLAGS, MAX_NPC_CHANGES, MAX_OFFER_ACTIONS,
    MAX_TONE_TAGS,
};
pub use validate::{fallback_value, repair, validate, REQUIRED_CHECK, REQUIRED_TOP};

use serde_json::Value;

/// Split narrator output into narrative text and a normalized directive.
///
/// Never fails: extraction or parse trouble yields the original text with
/// the fallback directive, and everything that does parse is repaired,
/// sanitized and clamped before it reaches the caller.
pub fn parse_narration(text: &str) -> (String, Directive) {
    let Some(blob) = extract_json_blob(text) else {
        return (text.trim().to_string(), Directive::fallback());
    };

    let narrative = strip_blob_from_narrative(text, &blob);
    let raw = match serde_json::from_str::<Value>(&blob) {
        Ok(value @ Value::Object(_)) => value,
        _ => return (narrative, Directive::fallback()),
    };

    // Extended fields (flags, world tick, NPC attitudes) survive from the
    // pollution-stripped raw with their clamps applied.
    let stripped = strip_pollution(raw.clone());
    let mut directive = Directive::normalized(&stripped);

    // The guardrail-owned core goes through repair, hard validation and
    // sanitization; a directive that cannot be repaired collapses to the
    // fallback core.
    let repaired = repair(&raw);
    let core = if validate(&repaired) {
        repaired
    } else {
        fallback_value()
    };
    apply_core(&mut directive, &sanitize_value(core));

    (narrative, directive)
}

/// Overwrite the guardrail-owned fields from a sanitized value.
///
/// The input must come from [`sanitize_value`], which guarantees shape; the
/// reads below still fall back to defaults rather than panic.
fn apply_core(directive: &mut Directive, core: &Value) {
    directive.need_check = core["need_check"].as_bool().unwrap_or(false);
    directive.enter_combat = core["enter_combat"].as_bool().unwrap_or(false);
    directive.grant_clue = core["grant_clue"].as_bool().unwrap_or(false);

    directive.check = CheckSpec {
        attribute: core["check"]["attribute"]
            .as_str()
            .and_then(Attribute::parse)
            .unwrap_or_default(),
        dc: core["check"]["dc"].as_i64().map(|dc| dc as i32).unwrap_or(DEFAULT_DC),
        reason: core["check"]["reason"].as_str().unwrap_or(DEFAULT_REASON).to_string(),
    };
    directive.combat = CombatSpec {
        enemy_pack_id: core["combat"]["enemy_pack_id"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
    };
    directive.clue = ClueSpec {
        title: core["clue"]["title"].as_str().unwrap_or_default().to_string(),
        detail: core["clue"]["detail"].as_str().unwrap_or_default().to_string(),
    };
    directive.offer_actions = value_strings(&core["offer_actions"]);
    directive.tone_tags = value_strings(&core["tone_tags"]);
}

fn value_strings(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|item| item.as_str().unwrap_or_default().to_string())
                .collect()
        })
        .unwrap_or_default()
}
