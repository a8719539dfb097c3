//! Flat-result dialect codec
//!
//! The `session/prompt` result itself carries assistant text, tool calls,
//! finish reason and usage; normalization is a direct field copy plus
//! tool-call coercion.

use serde_json::{Map, Value, json};

use crate::error::{AcpError, Result};
use crate::types::identifiers::{ProviderId, SessionId};
use crate::types::request::GenerateRequest;
use crate::types::response::{CanonicalResponse, ToolCallRecord};

use super::usage::usage_from_result;
use super::{Codec, base_session_new_params, session_id_from_result};

const TEXT_KEYS: &[&str] = &["assistant_text", "assistantText", "text"];
const TOOL_CALL_KEYS: &[&str] = &["tool_calls", "toolCalls"];
const FINISH_KEYS: &[&str] = &["finish_reason", "finishReason", "stop_reason", "stopReason"];

/// Codec for providers whose prompt result is self-contained
#[derive(Debug, Default)]
pub struct FlatCodec;

impl Codec for FlatCodec {
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
        params.insert("prompt".to_string(), json!(req.prompt));
        for (key, value) in &req.extra_params {
            params.insert(key.clone(), value.clone());
        }
        Value::Object(params)
    }

    fn normalize_prompt_payload(
        &self,
        result: &Value,
        _notifications: &[Value],
        _provider_id: &ProviderId,
    ) -> Result<CanonicalResponse> {
        let obj = result
            .as_object()
            .ok_or_else(|| AcpError::contract("flat prompt result is not an object"))?;

        let finish_reason = FINISH_KEYS
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .ok_or_else(|| {
                AcpError::contract("flat prompt result has no recognizable finish marker")
            })?
            .to_string();

        let assistant_text = TEXT_KEYS
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string();

        let tool_calls = TOOL_CALL_KEYS
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_array))
            .map(|calls| calls.iter().filter_map(coerce_tool_call).collect())
            .unwrap_or_default();

        Ok(CanonicalResponse {
            assistant_text,
            tool_calls,
            finish_reason,
            usage: usage_from_result(result),
            raw: result.clone(),
        })
    }
}

/// Coerce one loosely shaped tool-call object into a record
pub(crate) fn coerce_tool_call(value: &Value) -> Option<ToolCallRecord> {
    let obj = value.as_object()?;

    let name = ["name", "tool_name", "toolName", "tool", "title"]
        .iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))?
        .to_string();

    let id = ["id", "tool_call_id", "toolCallId", "call_id", "callId"]
        .iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(ToString::to_string);

    let arguments = ["arguments", "args", "input", "rawInput", "raw_input"]
        .iter()
        .find_map(|k| obj.get(*k))
        .cloned()
        .unwrap_or(Value::Null);

    let status = obj
        .get("status")
        .and_then(Value::as_str)
        .map(ToString::to_string);

    Some(ToolCallRecord {
        id,
        name,
        arguments,
        status,
    })
}
