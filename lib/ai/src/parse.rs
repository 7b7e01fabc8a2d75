//! Lenient parsing of model output.
//!
//! Models asked for JSON still wrap it in prose or code fences often enough
//! that a strict `serde_json::from_str` is not sufficient on its own.

use serde_json::Value as JsonValue;

/// Extracts the first JSON object from model output.
///
/// Tries, in order: the whole text, the contents of a fenced code block, and
/// the span between the first `{` and the last `}`.
#[must_use]
pub fn extract_json_object(text: &str) -> Option<JsonValue> {
    let trimmed = text.trim();
    if let Some(value) = parse_object(trimmed) {
        return Some(value);
    }

    if let Some(fenced) = fenced_block(trimmed)
        && let Some(value) = parse_object(fenced)
    {
        return Some(value);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    parse_object(&trimmed[start..=end])
}

fn parse_object(text: &str) -> Option<JsonValue> {
    serde_json::from_str::<JsonValue>(text)
        .ok()
        .filter(JsonValue::is_object)
}

fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_open = &text[open + 3..];
    // Skip an info string such as `json`.
    let body_start = after_open.find('\n').map_or(0, |i| i + 1);
    let body = &after_open[body_start..];
    let close = body.find("```")?;
    Some(body[..close].trim())
}

/// Returns the first string value found under any of `keys`.
#[must_use]
pub fn string_field<'a>(value: &'a JsonValue, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(JsonValue::as_str))
}

/// Collects the `observations` array as strings.
///
/// Non-string entries are kept in their JSON form rather than dropped.
#[must_use]
pub fn observations(value: &JsonValue) -> Vec<String> {
    value
        .get("observations")
        .and_then(JsonValue::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| match item {
                    JsonValue::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Normalizes a verdict label for comparison: lowercase, with `_` and `-`
/// treated as spaces and runs of whitespace collapsed.
#[must_use]
pub fn normalize_label(label: &str) -> String {
    label
        .to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
