//! Usage normalization helpers
//!
//! Providers spell token accounting differently (snake_case, camelCase, and
//! the older prompt/completion names); everything is folded into one
//! canonical [`Usage`] shape.

use serde_json::Value;

use crate::types::response::Usage;

const INPUT_KEYS: &[&str] = &["input_tokens", "inputTokens", "prompt_tokens", "promptTokens"];
const CACHED_KEYS: &[&str] = &[
    "cached_input_tokens",
    "cachedInputTokens",
    "cache_read_input_tokens",
    "cacheReadInputTokens",
];
const OUTPUT_KEYS: &[&str] = &[
    "output_tokens",
    "outputTokens",
    "completion_tokens",
    "completionTokens",
];
const CONTEXT_KEYS: &[&str] = &["context_window", "contextWindow", "context_length", "contextLength"];

const USAGE_CONTAINER_KEYS: &[&str] = &["usage", "tokenUsage", "token_usage"];

/// Locate the usage object within a terminal payload
#[must_use]
pub fn find_usage_object(result: &Value) -> Option<&Value> {
    let obj = result.as_object()?;
    USAGE_CONTAINER_KEYS
        .iter()
        .find_map(|k| obj.get(*k))
        .filter(|v| v.is_object())
}

/// Normalize a usage object into the canonical shape
///
/// Unrecognized fields are preserved in `raw_usage`.
#[must_use]
pub fn normalize_usage(usage: &Value) -> Usage {
    Usage {
        input_tokens: first_number(usage, INPUT_KEYS),
        cached_input_tokens: first_number(usage, CACHED_KEYS),
        output_tokens: first_number(usage, OUTPUT_KEYS),
        context_window: first_number(usage, CONTEXT_KEYS),
        raw_usage: usage.clone(),
    }
}

/// Normalize usage straight out of a terminal payload, if present
#[must_use]
pub fn usage_from_result(result: &Value) -> Usage {
    find_usage_object(result).map(normalize_usage).unwrap_or_default()
}

/// First non-negative integer found under any of the given keys
fn first_number(value: &Value, keys: &[&str]) -> Option<u64> {
    let obj = value.as_object()?;
    keys.iter().find_map(|k| obj.get(*k).and_then(as_count))
}

/// Coerce a JSON value to a token count
///
/// Accepts integers and numeric strings; anything else is ignored.
fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
