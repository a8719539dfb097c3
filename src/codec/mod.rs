//! Per-provider wire-format codecs
//!
//! A codec hides dialect differences behind four pure operations so the
//! client lifecycle logic stays dialect-agnostic: build `session/new`
//! params, extract the session id, build `session/prompt` params, and
//! normalize the prompt payload (plus streamed notifications) into a
//! canonical response.

pub mod flat;
pub mod streaming;
pub mod usage;

use serde_json::{Map, Value, json};

use crate::config::WireDialect;
use crate::error::{AcpError, Result};
use crate::types::identifiers::{ProviderId, SessionId};
use crate::types::request::GenerateRequest;
use crate::types::response::CanonicalResponse;

pub use flat::FlatCodec;
pub use streaming::StreamingCodec;

/// Wire key for injected skills in `session/new` params
pub const SESSION_FIELD_SKILLS: &str = "skills";

/// Wire key for injected MCP servers in `session/new` params
pub const SESSION_FIELD_MCP_SERVERS: &str = "mcpServers";

/// Session-id key spellings accepted in `session/new` results
pub const SESSION_ID_KEYS: &[&str] = &["sessionId", "session_id"];

/// Stateless per-dialect translation strategy
pub trait Codec: Send + Sync {
    /// Build full `session/new` parameters, including optional capabilities
    fn build_session_new_params(&self, req: &GenerateRequest, provider_id: &ProviderId) -> Value;

    /// Extract the session id and the key spelling it was found under
    ///
    /// # Errors
    /// Returns a protocol error if no known key carries a string id
    fn extract_session_id(&self, result: &Value) -> Result<(SessionId, &'static str)>;

    /// Build `session/prompt` parameters
    fn build_prompt_params(
        &self,
        req: &GenerateRequest,
        provider_id: &ProviderId,
        session_id: &SessionId,
        session_key: &str,
    ) -> Value;

    /// Normalize the terminal prompt payload plus observed notifications
    ///
    /// # Errors
    /// Returns a contract error if the payload lacks any recognizable
    /// completion marker
    fn normalize_prompt_payload(
        &self,
        result: &Value,
        notifications: &[Value],
        provider_id: &ProviderId,
    ) -> Result<CanonicalResponse>;
}

/// Select the codec for a configured dialect
#[must_use]
pub fn codec_for(dialect: WireDialect) -> &'static dyn Codec {
    match dialect {
        WireDialect::Flat => &FlatCodec,
        WireDialect::Streaming => &StreamingCodec,
    }
}

/// Shared `session/new` parameter builder
///
/// Both dialects inject the same optional capability fields; the degrade
/// ladder strips them by key.
pub(crate) fn base_session_new_params(req: &GenerateRequest) -> Value {
    let mut params = Map::new();
    if let Some(system) = &req.system_prompt {
        params.insert("systemPrompt".to_string(), json!(system));
    }
    if !req.skills.is_empty() {
        params.insert(SESSION_FIELD_SKILLS.to_string(), json!(req.skills));
    }
    if !req.mcp_servers.is_empty() {
        params.insert(SESSION_FIELD_MCP_SERVERS.to_string(), json!(req.mcp_servers));
    }
    Value::Object(params)
}

/// Shared session-id extraction accepting both known key spellings
pub(crate) fn session_id_from_result(result: &Value) -> Result<(SessionId, &'static str)> {
    let obj = result
        .as_object()
        .ok_or_else(|| AcpError::unexpected_shape("session/new result is not an object"))?;

    for key in SESSION_ID_KEYS.iter().copied() {
        if let Some(id) = obj.get(key).and_then(Value::as_str) {
            if !id.is_empty() {
                return Ok((SessionId::new(id), key));
            }
        }
    }

    Err(AcpError::unexpected_shape(
        "session/new result carries no session id under any known key",
    ))
}
