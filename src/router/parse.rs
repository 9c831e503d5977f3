//! Defensive JSON extraction for auxiliary LLM output
//!
//! Auxiliary models are asked for strict JSON but do not always comply.
//! This parser is the only boundary that touches their unstructured text:
//! it tries a full parse, then a fenced code block, then the first balanced
//! object, and finally gives up with an empty map. It never errors; missing
//! fields fall back to defaults at the call site.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

fn fenced_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"```(?:json)?\s*(\{[\s\S]*?\})\s*```").expect("fenced block regex is valid")
    })
}

fn balanced_object_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Matches one object with at most one level of nesting, which covers
    // every auxiliary response shape in use.
    RE.get_or_init(|| {
        Regex::new(r"\{[^{}]*(?:\{[^{}]*\}[^{}]*)*\}").expect("balanced object regex is valid")
    })
}

/// Normalize a parsed value to an object: arrays yield their first object
/// element, non-objects yield the empty map.
fn normalize(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        Value::Array(items) => items
            .into_iter()
            .find_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Map::new(),
    }
}

/// Extract and parse a JSON object from auxiliary model output.
pub fn safe_json_parse(text: &str) -> Map<String, Value> {
    let text = text.trim();

    if let Ok(value) = serde_json::from_str::<Value>(text) {
        let map = normalize(value);
        if !map.is_empty() {
            return map;
        }
    }

    if let Some(captures) = fenced_block_re().captures(text) {
        if let Ok(value) = serde_json::from_str::<Value>(&captures[1]) {
            let map = normalize(value);
            if !map.is_empty() {
                return map;
            }
        }
    }

    if let Some(found) = balanced_object_re().find(text) {
        if let Ok(value) = serde_json::from_str::<Value>(found.as_str()) {
            return normalize(value);
        }
    }

    Map::new()
}

/// String field with default.
pub fn get_str(map: &Map<String, Value>, key: &str, default: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

/// Bool field coerced with default.
pub fn get_bool(map: &Map<String, Value>, key: &str, default: bool) -> bool {
    map.get(key).and_then(Value::as_bool).unwrap_or(default)
}

/// Numeric confidence clamped into `[0, 100]`.
pub fn get_confidence(map: &Map<String, Value>, key: &str, default: u8) -> u8 {
    map.get(key)
        .and_then(Value::as_f64)
        .map(|v| v.clamp(0.0, 100.0) as u8)
        .unwrap_or(default)
}

/// String-array field; non-string elements are dropped.
pub fn get_str_list(map: &Map<String, Value>, key: &str) -> Vec<String> {
    map.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
