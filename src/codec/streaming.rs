//! Streaming-notification dialect codec
//!
//! The `session/prompt` result carries only a stop marker; visible assistant
//! text and tool calls are reconstructed from the session-update
//! notifications collected during the call. Thought/reasoning content is
//! never promoted into the visible text field, neither from notifications
//! nor from the terminal-payload fallback scan.

use serde_json::{Map, Value, json};

use crate::error::{AcpError, Result};
use crate::types::identifiers::{ProviderId, SessionId};
use crate::types::request::GenerateRequest;
use crate::types::response::{CanonicalResponse, ToolCallRecord};

use super::flat::coerce_tool_call;
use super::usage::usage_from_result;
use super::{Codec, base_session_new_params, session_id_from_result};

const FINISH_KEYS: &[&str] = &["stopReason", "stop_reason", "finishReason", "finish_reason"];
const UPDATE_KIND_KEYS: &[&str] = &["sessionUpdate", "session_update", "kind", "type"];
const THOUGHT_TOKENS: &[&str] = &["thought", "thinking", "reasoning"];

/// Codec for providers that stream content as session updates
#[derive(Debug, Default)]
pub struct StreamingCodec;

impl Codec for StreamingCodec {
    fn build_session_new_params(&self, req: &GenerateRequest, _provider_id: &ProviderId) -> Value {
        base_session_new_params(req)
    }

    fn extract_session_id(&self, result: &Value) -> Result<(SessionId, &'static str)> {
        session_id_from_result(result)
    }

    fn build_prompt_params(
        &self,
        req: &GenerateRequest,
        _provider_id: &ProviderId,
        session_id: &SessionId,
        session_key: &str,
    ) -> Value {
        let mut params = Map::new();
        params.insert(session_key.to_string(), json!(session_id.as_str()));
        params.insert(
            "prompt".to_string(),
            json!([{ "type": "text", "text": req.prompt }]),
        );
        for (key, value) in &req.extra_params {
            params.insert(key.clone(), value.clone());
        }
        Value::Object(params)
    }

    fn normalize_prompt_payload(
        &self,
        result: &Value,
        notifications: &[Value],
        _provider_id: &ProviderId,
    ) -> Result<CanonicalResponse> {
        let obj = result
            .as_object()
            .ok_or_else(|| AcpError::contract("streaming prompt result is not an object"))?;

        let finish_reason = FINISH_KEYS
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .ok_or_else(|| {
                AcpError::contract("streaming prompt result has no recognizable stop marker")
            })?
            .to_string();

        let mut text_chunks: Vec<String> = Vec::new();
        let mut tool_calls: Vec<ToolCallRecord> = Vec::new();

        for notification in notifications {
            scan_notification(notification, &mut text_chunks, &mut tool_calls);
        }

        let assistant_text = if text_chunks.is_empty() {
            // No visible chunks were streamed; best-effort scan of the
            // terminal payload, still refusing thought content.
            fallback_visible_text(result).unwrap_or_default()
        } else {
            text_chunks.concat()
        };

        Ok(CanonicalResponse {
            assistant_text,
            tool_calls,
            finish_reason,
            usage: usage_from_result(result),
            raw: result.clone(),
        })
    }
}

/// Extract visible chunks and tool-call updates from one notification
fn scan_notification(
    notification: &Value,
    text_chunks: &mut Vec<String>,
    tool_calls: &mut Vec<ToolCallRecord>,
) {
    let Some(obj) = notification.as_object() else {
        return;
    };
    let method = obj.get("method").and_then(Value::as_str).unwrap_or("");
    if method != "session/update" {
        return;
    }
    let Some(params) = obj.get("params") else {
        return;
    };
    let update = params.get("update").unwrap_or(params);
    let Some(update_obj) = update.as_object() else {
        return;
    };

    let kind = UPDATE_KIND_KEYS
        .iter()
        .find_map(|k| update_obj.get(*k).and_then(Value::as_str))
        .unwrap_or("");

    if is_thoughtlike(kind) || update_obj.get("thought").and_then(Value::as_bool) == Some(true) {
        return;
    }

    if kind.contains("tool_call") {
        merge_tool_call(update, tool_calls);
        return;
    }

    if kind.contains("message") {
        collect_visible_text(update_obj.get("content"), text_chunks);
        if let Some(text) = update_obj.get("text").and_then(Value::as_str) {
            text_chunks.push(text.to_string());
        }
    }
}

/// Append visible text from a content object or content list
fn collect_visible_text(content: Option<&Value>, text_chunks: &mut Vec<String>) {
    match content {
        Some(Value::Object(item)) => {
            let item_type = item.get("type").and_then(Value::as_str).unwrap_or("text");
            if is_thoughtlike(item_type) {
                return;
            }
            if let Some(text) = item.get("text").and_then(Value::as_str) {
                text_chunks.push(text.to_string());
            }
        }
        Some(Value::Array(items)) => {
            for item in items {
                collect_visible_text(Some(item), text_chunks);
            }
        }
        Some(Value::String(text)) => text_chunks.push(text.clone()),
        _ => {}
    }
}

/// Record a tool call, merging `tool_call_update` events into earlier records
fn merge_tool_call(update: &Value, tool_calls: &mut Vec<ToolCallRecord>) {
    let Some(record) = coerce_tool_call(update) else {
        return;
    };
    if let Some(id) = record.id.as_deref() {
        if let Some(existing) = tool_calls
            .iter_mut()
            .find(|c| c.id.as_deref() == Some(id))
        {
            if record.status.is_some() {
                existing.status = record.status;
            }
            if !record.arguments.is_null() {
                existing.arguments = record.arguments;
            }
            return;
        }
    }
    tool_calls.push(record);
}

/// Best-effort scan of the terminal payload for a plausible visible message
///
/// Never descends into thought/reasoning-flagged nodes or keys.
fn fallback_visible_text(value: &Value) -> Option<String> {
    const TEXT_KEYS: &[&str] = &[
        "text",
        "assistant_text",
        "assistantText",
        "output_text",
        "outputText",
        "message",
        "content",
    ];

    match value {
        Value::Object(obj) => {
            let declared_type = UPDATE_KIND_KEYS
                .iter()
                .find_map(|k| obj.get(*k).and_then(Value::as_str))
                .unwrap_or("");
            if is_thoughtlike(declared_type)
                || obj.get("thought").and_then(Value::as_bool) == Some(true)
            {
                return None;
            }

            for key in TEXT_KEYS.iter().copied() {
                match obj.get(key) {
                    Some(Value::String(s)) if !s.trim().is_empty() => {
                        return Some(s.clone());
                    }
                    Some(nested @ (Value::Object(_) | Value::Array(_))) => {
                        if let Some(found) = fallback_visible_text(nested) {
                            return Some(found);
                        }
                    }
                    _ => {}
                }
            }
            None
        }
        Value::Array(items) => items.iter().find_map(fallback_visible_text),
        _ => None,
    }
}

/// Whether a type/kind token marks internal reasoning content
fn is_thoughtlike(token: &str) -> bool {
    let lower = token.to_ascii_lowercase();
    THOUGHT_TOKENS.iter().any(|t| lower.contains(t))
}
