//! Directive validation and best-effort repair.
//!
//! Validation is a hard pass/fail against the schema's required keys and
//! allow-lists. Repair only narrows toward safe defaults: it never invents
//! `true` values and never widens an allow-list.

use super::schema::{Attribute, ALLOWED_DCS, DEFAULT_DC, DEFAULT_REASON};
use serde_json::{json, Map, Value};

/// Top-level keys a directive must carry to validate.
pub const REQUIRED_TOP: [&str; 3] = ["need_check", "check", "enter_combat"];

/// Keys the check substructure must carry to validate.
pub const REQUIRED_CHECK: [&str; 3] = ["attribute", "dc", "reason"];

/// Hard pass/fail schema check. Any violation fails the whole directive;
/// there is no partial acceptance.
pub fn validate(raw: &Value) -> bool {
    let Some(obj) = raw.as_object() else {
        return false;
    };

    if REQUIRED_TOP.iter().any(|key| !obj.contains_key(*key)) {
        return false;
    }
    if !obj["need_check"].is_boolean() || !obj["enter_combat"].is_boolean() {
        return false;
    }

    let Some(check) = obj["check"].as_object() else {
        return false;
    };
    if REQUIRED_CHECK.iter().any(|key| !check.contains_key(*key)) {
        return false;
    }

    let attribute_ok = check["attribute"]
        .as_str()
        .and_then(Attribute::parse)
        .is_some();
    let dc_ok = is_allowed_dc(&check["dc"]);
    let reason_ok = check["reason"].is_string();

    attribute_ok && dc_ok && reason_ok
}

/// Best-effort coercion used when validation fails.
///
/// Missing or mistyped booleans become `false`; a missing or structurally
/// invalid check is replaced wholesale; an out-of-list attribute or DC is
/// reset to the default while a string `reason` is preserved.
pub fn repair(raw: &Value) -> Value {
    let Some(obj) = raw.as_object() else {
        return fallback_value();
    };

    let mut repaired = obj.clone();
    repaired.insert(
        "need_check".to_string(),
        Value::Bool(obj.get("need_check").and_then(Value::as_bool).unwrap_or(false)),
    );
    repaired.insert(
        "enter_combat".to_string(),
        Value::Bool(obj.get("enter_combat").and_then(Value::as_bool).unwrap_or(false)),
    );

    let check = match obj.get("check").and_then(Value::as_object) {
        Some(check) if REQUIRED_CHECK.iter().all(|key| check.contains_key(*key)) => {
            repair_check(check)
        }
        _ => fallback_check_value(),
    };
    repaired.insert("check".to_string(), check);

    Value::Object(repaired)
}

fn repair_check(check: &Map<String, Value>) -> Value {
    let attribute = check
        .get("attribute")
        .and_then(Value::as_str)
        .and_then(Attribute::parse)
        .unwrap_or_default();
    let dc = check
        .get("dc")
        .filter(|dc| is_allowed_dc(dc))
        .and_then(Value::as_i64)
        .map(|dc| dc as i32)
        .unwrap_or(DEFAULT_DC);
    let reason = check
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_REASON);
    json!({"attribute": attribute.name(), "dc": dc, "reason": reason})
}

/// The canonical fallback check as a raw value.
pub fn fallback_check_value() -> Value {
    json!({"attribute": "Luck", "dc": DEFAULT_DC, "reason": DEFAULT_REASON})
}

/// The canonical minimal safe directive as a raw value.
pub fn fallback_value() -> Value {
    json!({
        "need_check": false,
        "check": fallback_check_value(),
        "enter_combat": false,
    })
}

fn is_allowed_dc(value: &Value) -> bool {
    if !value.is_i64() && !value.is_u64() {
        return false;
    }
    value
        .as_i64()
        .map(|dc| ALLOWED_DCS.iter().any(|allowed| i64::from(*allowed) == dc))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_validates() {
        assert!(validate(&fallback_value()));
    }

    #[test]
    fn test_validate_rejects_missing_keys() {
        assert!(!validate(&json!({})));
        assert!(!validate(&json!({"need_check": false, "enter_combat": false})));
        assert!(!validate(&json!("not an object")));
    }

    #[test]
    fn test_validate_rejects_bad_types() {
        let base = json!({
            "need_check": "yes",
            "check": {"attribute": "Luck", "dc": 15, "reason": "r"},
            "enter_combat": false,
        });
        assert!(!validate(&base));

        let bad_dc = json!({
            "need_check": false,
            "check": {"attribute": "Luck", "dc": 15.0, "reason": "r"},
            "enter_combat": false,
        });
        assert!(!validate(&bad_dc));

        let off_list = json!({
            "need_check": false,
            "check": {"attribute": "Charm", "dc": 15, "reason": "r"},
            "enter_combat": false,
        });
        assert!(!validate(&off_list));
    }

    #[test]
    fn test_repair_coerces_booleans_to_false() {
        let raw = json!({
            "need_check": "true",
            "enter_combat": 1,
            "check": {"attribute": "Body", "dc": 10, "reason": "r"},
        });
        let repaired = repair(&raw);
        assert_eq!(repaired["need_check"], Value::Bool(false));
        assert_eq!(repaired["enter_combat"], Value::Bool(false));
        assert!(validate(&repaired));
    }

    #[test]
    fn test_repair_replaces_broken_check_wholesale() {
        let raw = json!({"need_check": true, "enter_combat": false, "check": "dc 15"});
        let repaired = repair(&raw);
        assert_eq!(repaired["check"], fallback_check_value());
        // Repair never invents `true`: an existing boolean survives as-is.
        assert_eq!(repaired["need_check"], Value::Bool(true));
    }

    #[test]
    fn test_repair_preserves_string_reason() {
        let raw = json!({
            "need_check": false,
            "enter_combat": false,
            "check": {"attribute": "Charm", "dc": 13, "reason": "squinting at runes"},
        });
        let repaired = repair(&raw);
        assert_eq!(repaired["check"]["attribute"], "Luck");
        assert_eq!(repaired["check"]["dc"], 15);
        assert_eq!(repaired["check"]["reason"], "squinting at runes");
    }

    #[test]
    fn test_repair_non_object_yields_fallback() {
        assert_eq!(repair(&json!(["array"])), fallback_value());
        assert_eq!(repair(&Value::Null), fallback_value());
    }
}
