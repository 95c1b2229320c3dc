//! Locating a directive JSON object inside arbitrary narrator text.
//!
//! Narrator output mixes prose with one intended JSON object, possibly in a
//! fenced code block, possibly behind a marker phrase, and possibly next to
//! unrelated braces inside the prose itself. The scanner here only trusts a
//! span that is brace-balanced outside of string literals *and* parses as a
//! JSON object.

use serde_json::Value;

/// Marker phrases that tend to precede the directive object.
const MARKERS: [&str; 2] = ["part b", "directive json"];

/// Extract the directive JSON blob from narrator text.
///
/// Preference order: a fenced ```json block; then the first balanced object
/// after a marker phrase; then the first balanced object anywhere. Returns
/// `None` for anything that does not contain a parseable object.
pub fn extract_json_blob(text: &str) -> Option<String> {
    if let Some(blob) = fenced_json_block(text) {
        return Some(blob);
    }

    if let Some(after) = marker_end(text) {
        if let Some(blob) = extract_first_balanced_json(&text[after..]) {
            return Some(blob.to_string());
        }
        // The marker's tail had nothing usable; rescan the whole text.
        return extract_first_balanced_json(text).map(str::to_string);
    }

    extract_first_balanced_json(text).map(str::to_string)
}

/// Remove the extracted blob and any ```json fencing from the text.
pub fn strip_blob_from_narrative(text: &str, blob: &str) -> String {
    let cleaned = if blob.is_empty() {
        text.to_string()
    } else {
        text.replace(blob, "")
    };
    let cleaned = remove_ascii_ci(&cleaned, "```json");
    cleaned.replace("```", "").trim().to_string()
}

/// Find the first syntactically balanced `{...}` span that parses as a JSON
/// object. String contents (including escaped quotes) are never mistaken for
/// structural braces; arrays and scalars are rejected and scanning resumes
/// from the next opening brace.
pub fn extract_first_balanced_json(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    let n = bytes.len();
    let mut i = 0;

    while i < n {
        let start = find_byte(bytes, b'{', i)?;
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escape = false;
        let mut j = start;
        let mut resume = None;

        while j < n {
            let ch = bytes[j];
            if in_string {
                if escape {
                    escape = false;
                } else if ch == b'\\' {
                    escape = true;
                } else if ch == b'"' {
                    in_string = false;
                }
            } else {
                match ch {
                    b'"' => in_string = true,
                    b'{' => depth += 1,
                    b'}' => {
                        depth -= 1;
                        if depth == 0 {
                            let candidate = &s[start..=j];
                            if matches!(
                                serde_json::from_str::<Value>(candidate),
                                Ok(Value::Object(_))
                            ) {
                                return Some(candidate);
                            }
                            resume = Some(start + 1);
                            break;
                        }
                    }
                    _ => {}
                }
            }
            j += 1;
        }

        i = resume?;
    }

    None
}

/// Content of the first ```json fenced block, when it holds an object.
fn fenced_json_block(text: &str) -> Option<String> {
    let open = find_ascii_ci(text, "```json")?;
    let body_start = open + "```json".len();
    let rest = &text[body_start..];
    let close = rest.find("```")?;
    let content = rest[..close].trim();
    if content.starts_with('{') && content.ends_with('}') {
        Some(content.to_string())
    } else {
        None
    }
}

/// Byte offset just past the first marker phrase, if any.
fn marker_end(text: &str) -> Option<usize> {
    MARKERS
        .iter()
        .filter_map(|marker| find_ascii_ci(text, marker).map(|pos| pos + marker.len()))
        .min()
}

fn find_byte(bytes: &[u8], needle: u8, from: usize) -> Option<usize> {
    bytes[from..]
        .iter()
        .position(|&b| b == needle)
        .map(|p| from + p)
}

/// ASCII case-insensitive substring search. The pattern must be ASCII; the
/// haystack may be arbitrary UTF-8 (continuation bytes never match ASCII).
fn find_ascii_ci(haystack: &str, pattern: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let pat = pattern.as_bytes();
    if pat.is_empty() || hay.len() < pat.len() {
        return None;
    }
    (0..=hay.len() - pat.len()).find(|&i| hay[i..i + pat.len()].eq_ignore_ascii_case(pat))
}

/// Remove every ASCII case-insensitive occurrence of `pattern`.
fn remove_ascii_ci(text: &str, pattern: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = find_ascii_ci(rest, pattern) {
        out.push_str(&rest[..pos]);
        rest = &rest[pos + pattern.len()..];
    }
    out.push_str(rest);
    out
}
