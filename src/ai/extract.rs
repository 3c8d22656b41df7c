//! Response-text extraction.
//!
//! The provider's response shape varies across API versions (nested
//! candidate/content arrays, an `output` path, a bare `text` field). Each
//! layout gets one strategy returning `Option<String>`; the first match
//! wins, and a truncated JSON stringification guarantees the caller never
//! receives nothing.

use serde_json::Value;

const STRINGIFY_LIMIT: usize = 4000;

type Strategy = fn(&Value) -> Option<String>;

const STRATEGIES: &[Strategy] = &[from_candidates, from_output, from_text_field];

/// Extract display text from a raw provider response.
pub fn extract_text(response: &Value) -> String {
    STRATEGIES
        .iter()
        .find_map(|strategy| strategy(response))
        .unwrap_or_else(|| stringify_truncated(response))
}

/// `candidates[0].content` — a parts object, a parts array, or a plain
/// string depending on the API version.
fn from_candidates(response: &Value) -> Option<String> {
    let content = response.get("candidates")?.get(0)?.get("content")?;
    match content {
        Value::String(text) => Some(text.clone()),
        Value::Array(parts) => first_text_part(parts),
        Value::Object(_) => {
            let parts = content.get("parts")?.as_array()?;
            first_text_part(parts)
        }
        _ => None,
    }
}

fn first_text_part(parts: &[Value]) -> Option<String> {
    parts
        .iter()
        .find_map(|part| part.get("text").and_then(Value::as_str))
        .map(str::to_string)
}

/// `output[0].content[0].text`
fn from_output(response: &Value) -> Option<String> {
    response
        .get("output")?
        .get(0)?
        .get("content")?
        .get(0)?
        .get("text")?
        .as_str()
        .map(str::to_string)
}

/// Top-level string `text` field.
fn from_text_field(response: &Value) -> Option<String> {
    response.get("text")?.as_str().map(str::to_string)
}

fn stringify_truncated(response: &Value) -> String {
    let json = response.to_string();
    if json.chars().count() <= STRINGIFY_LIMIT {
        json
    } else {
        json.chars().take(STRINGIFY_LIMIT).collect()
    }
}
