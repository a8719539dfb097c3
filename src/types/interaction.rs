//! Interaction value types
//!
//! Immutable descriptions of a pending confirmation (question, options,
//! free-text allowance) and its answer. An [`InteractionRequest`] is created
//! when a provider notification is classified as a permission request and is
//! never mutated after publication; an [`InteractionAnswer`] is created
//! exactly once per interaction.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::identifiers::{InteractionId, ProviderId, SessionId};

/// One selectable option of a pending confirmation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionOption {
    /// 1-based dense index, stable for numeric selection
    pub index: u32,
    /// Provider-assigned option identifier
    pub option_id: String,
    /// Short human-readable label
    pub label: String,
    /// Longer description, if the provider supplied one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Provider-specific extras carried through untouched
    #[serde(skip_serializing_if = "Value::is_null", default)]
    pub metadata: Value,
}

/// A pending confirmation question raised by the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRequest {
    /// Correlation id for this interaction
    pub interaction_id: InteractionId,
    /// The question to put to the human
    pub question: String,
    /// Declared options, densely indexed from 1
    pub options: Vec<InteractionOption>,
    /// Whether free-text answers are accepted
    pub allow_custom_input: bool,
    /// Wire method of the notification this was built from
    pub source_method: String,
    /// Conversation the interaction belongs to, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Run the interaction belongs to, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    /// Trace id for cross-system correlation, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    /// Provider session the interaction was raised in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Provider that raised the interaction
    pub provider_id: ProviderId,
    /// Raw notification params, untouched
    pub raw: Value,
}

impl InteractionRequest {
    /// Find a declared option by its 1-based index
    #[must_use]
    pub fn option_at(&self, index: u32) -> Option<&InteractionOption> {
        self.options.iter().find(|o| o.index == index)
    }
}

/// Where an answer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    /// Typed at the local terminal
    Terminal,
    /// Delivered through the messaging-channel bridge
    Channel,
    /// Supplied programmatically (tests, automation)
    Api,
}

impl std::fmt::Display for AnswerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Terminal => "terminal",
            Self::Channel => "channel",
            Self::Api => "api",
        };
        f.write_str(s)
    }
}

/// The human's answer to an [`InteractionRequest`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionAnswer {
    /// Interaction this answers
    pub interaction_id: InteractionId,
    /// 1-based index of the selected option, when one was selected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_index: Option<u32>,
    /// Provider id of the selected option, when one was selected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_option_id: Option<String>,
    /// Free-text answer, when custom input was used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_text: Option<String>,
    /// Where the answer came from
    pub source: AnswerSource,
    /// Conversation carried over from the request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Run carried over from the request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    /// Trace id carried over from the request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    /// Session carried over from the request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

impl InteractionAnswer {
    /// Build an option-selection answer for the given request
    #[must_use]
    pub fn selection(
        request: &InteractionRequest,
        option: &InteractionOption,
        source: AnswerSource,
    ) -> Self {
        Self {
            interaction_id: request.interaction_id.clone(),
            selected_index: Some(option.index),
            selected_option_id: Some(option.option_id.clone()),
            custom_text: None,
            source,
            conversation_id: request.conversation_id.clone(),
            run_id: request.run_id.clone(),
            trace_id: request.trace_id.clone(),
            session_id: request.session_id.clone(),
        }
    }

    /// Build a free-text answer for the given request
    #[must_use]
    pub fn free_text(
        request: &InteractionRequest,
        text: impl Into<String>,
        source: AnswerSource,
    ) -> Self {
        Self {
            interaction_id: request.interaction_id.clone(),
            selected_index: None,
            selected_option_id: None,
            custom_text: Some(text.into()),
            source,
            conversation_id: request.conversation_id.clone(),
            run_id: request.run_id.clone(),
            trace_id: request.trace_id.clone(),
            session_id: request.session_id.clone(),
        }
    }
}

/// Outcome of [`submit_answer`](crate::coordinator::InteractionCoordinator::submit_answer)
///
/// Rejections are data, not errors: the input is untrusted (chat messages,
/// keystrokes), so the caller gets a human-readable reason back instead of a
/// raised error.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitResult {
    /// Whether the answer was accepted
    pub accepted: bool,
    /// Human-readable acceptance or rejection reason
    pub message: String,
    /// The recorded answer, when accepted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<InteractionAnswer>,
}

impl SubmitResult {
    /// Build an accepted result
    #[must_use]
    pub fn accepted(message: impl Into<String>, answer: InteractionAnswer) -> Self {
        Self {
            accepted: true,
            message: message.into(),
            answer: Some(answer),
        }
    }

    /// Build a rejected result
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            message: message.into(),
            answer: None,
        }
    }
}
