//! Tool-argument normalization.
//!
//! Providers are inconsistent about how they deliver "function arguments":
//! some emit a JSON object, some wrap the object in a JSON string, some
//! truncate mid-stream and leave garbage. Downstream code wants exactly one
//! shape — a valid JSON object — so everything funnels through here.

use serde_json::{Map, Value};

/// Convert raw provider-supplied argument text into canonical form.
///
/// Returns the parsed key/value map and the compact JSON encoding of the
/// object. Anything that is not (or does not unwrap to) a JSON object
/// becomes `{}`:
///
/// - empty input or the literal `null` → `{}`
/// - a JSON string wrapping an object → the unwrapped object (one level only)
/// - arrays, scalars, malformed text → `{}`
pub fn normalize_arguments(raw: &str) -> (Map<String, Value>, String) {
    normalize_at_depth(raw, 0)
}

fn normalize_at_depth(raw: &str, depth: u8) -> (Map<String, Value>, String) {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return empty();
    }

    // A leading quote means the payload is a JSON-encoded string wrapping
    // the real arguments. Unwrap once and retry.
    if depth == 0 && trimmed.starts_with('"') {
        return match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::String(inner)) => normalize_at_depth(&inner, 1),
            _ => empty(),
        };
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => {
            let canonical = serde_json::to_string(&map).unwrap_or_else(|_| "{}".into());
            (map, canonical)
        }
        _ => empty(),
    }
}

fn empty() -> (Map<String, Value>, String) {
    (Map::new(), "{}".into())
}
