//! Canonical response types
//!
//! The dialect-agnostic shape every provider payload is normalized into.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One tool invocation observed during the turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Provider-assigned call id, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Tool name
    pub name: String,
    /// Tool arguments as the provider reported them
    #[serde(default)]
    pub arguments: Value,
    /// Last observed status (e.g. `pending`, `completed`), if reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Token accounting, normalized across provider spellings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt-side tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    /// Prompt-side tokens served from cache
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_input_tokens: Option<u64>,
    /// Completion-side tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    /// Context window size reported by the provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_window: Option<u64>,
    /// The usage object as the provider sent it
    #[serde(skip_serializing_if = "Value::is_null", default)]
    pub raw_usage: Value,
}

impl Usage {
    /// Whether no token counts were recognized at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.input_tokens.is_none()
            && self.cached_input_tokens.is_none()
            && self.output_tokens.is_none()
            && self.context_window.is_none()
    }
}

/// Canonical result of one [`generate`](crate::client::Client::generate) call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalResponse {
    /// Visible assistant text (never thought/reasoning content)
    pub assistant_text: String,
    /// Tool calls observed during the turn
    pub tool_calls: Vec<ToolCallRecord>,
    /// Stop/finish marker as reported by the provider
    pub finish_reason: String,
    /// Normalized token accounting
    pub usage: Usage,
    /// The terminal provider payload, untouched
    pub raw: Value,
}
