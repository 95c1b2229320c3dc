//! Directive sanitization against adversarial narrator output.
//!
//! The narrator writes the directive, and the narrator is fed untrusted
//! prose, so the directive is a prompt-injection surface: a key like
//! `"gold_change"` or `"inventory_change"` could trick a naive consumer
//! into mutating protected player state. The guardrail strips anything of
//! that shape at any depth and clamps what remains to an allow-list.
//!
//! Safe to call standalone: it re-checks everything independently of the
//! validator, and it is idempotent.

use super::schema::{
    coerce_string, Attribute, ALLOWED_DCS, DEFAULT_DC, DEFAULT_REASON, MAX_OFFER_ACTIONS,
    MAX_TONE_TAGS,
};
use serde_json::{json, Map, Value};

/// Top-level keys the guardrail lets through.
pub const ALLOWED_TOP_LEVEL: [&str; 8] = [
    "need_check",
    "check",
    "enter_combat",
    "combat",
    "grant_clue",
    "clue",
    "offer_actions",
    "tone_tags",
];

/// Substring tokens that mark a key as touching protected state.
const PROTECTED_TOKENS: [&str; 4] = ["gold", "hp", "inventory", "state"];

/// Whether a key name touches protected state, by exact match or substring.
fn is_polluted_key(key: &str) -> bool {
    let lowered = key.trim().to_lowercase();
    PROTECTED_TOKENS.iter().any(|token| lowered.contains(token))
}

/// Recursively drop every object key that names protected state.
pub fn strip_pollution(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut cleaned = Map::new();
            for (key, inner) in map {
                if is_polluted_key(&key) {
                    tracing::warn!(key = %key, "directive pollution key dropped");
                    continue;
                }
                cleaned.insert(key, strip_pollution(inner));
            }
            Value::Object(cleaned)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(strip_pollution).collect()),
        other => other,
    }
}

/// Sanitize a raw directive value.
///
/// The output is an object carrying exactly the allow-listed keys, each
/// well-typed and inside its range; no key naming protected state survives
/// at any depth.
pub fn sanitize_value(raw: Value) -> Value {
    let stripped = match strip_pollution(raw) {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    let mut out = Map::new();
    for key in ALLOWED_TOP_LEVEL {
        if let Some(value) = stripped.get(key) {
            out.insert(key.to_string(), value.clone());
        }
    }

    for key in ["need_check", "enter_combat", "grant_clue"] {
        let coerced = out.get(key).and_then(Value::as_bool).unwrap_or(false);
        out.insert(key.to_string(), Value::Bool(coerced));
    }
    let enter_combat = out["enter_combat"].as_bool().unwrap_or(false);

    out.insert("check".to_string(), sanitize_check(out.get("check")));
    out.insert(
        "combat".to_string(),
        sanitize_combat(out.get("combat"), enter_combat),
    );
    out.insert("clue".to_string(), sanitize_clue(out.get("clue")));

    let actions = string_list(out.get("offer_actions"), MAX_OFFER_ACTIONS);
    out.insert("offer_actions".to_string(), Value::Array(actions));
    let tags = string_list(out.get("tone_tags"), MAX_TONE_TAGS);
    out.insert("tone_tags".to_string(), Value::Array(tags));

    Value::Object(out)
}

fn sanitize_check(check: Option<&Value>) -> Value {
    let check = check.and_then(Value::as_object);
    let attribute = check
        .and_then(|c| c.get("attribute"))
        .and_then(Value::as_str)
        .and_then(Attribute::parse)
        .unwrap_or_default();
    let dc = check
        .and_then(|c| c.get("dc"))
        .filter(|dc| dc.is_i64() || dc.is_u64())
        .and_then(Value::as_i64)
        .filter(|dc| ALLOWED_DCS.iter().any(|allowed| i64::from(*allowed) == *dc))
        .unwrap_or(i64::from(DEFAULT_DC));
    let reason = check
        .and_then(|c| c.get("reason"))
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_REASON);
    json!({"attribute": attribute.name(), "dc": dc, "reason": reason})
}

fn sanitize_combat(combat: Option<&Value>, enter_combat: bool) -> Value {
    // A combat payload must not linger when combat was not requested.
    let enemy_pack_id = if enter_combat {
        combat
            .and_then(Value::as_object)
            .and_then(|c| c.get("enemy_pack_id"))
            .map(coerce_string)
            .unwrap_or_default()
    } else {
        String::new()
    };
    json!({"enemy_pack_id": enemy_pack_id})
}

fn sanitize_clue(clue: Option<&Value>) -> Value {
    let clue = clue.and_then(Value::as_object);
    let title = clue
        .and_then(|c| c.get("title"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let detail = clue
        .and_then(|c| c.get("detail"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    json!({"title": title, "detail": detail})
}

fn string_list(value: Option<&Value>, cap: usize) -> Vec<Value> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .take(cap)
                .map(|item| Value::String(coerce_string(item)))
                .collect()
        })
        .unwrap_or_default()
}
