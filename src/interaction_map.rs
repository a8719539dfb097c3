//! Interaction request/answer mapping helpers
//!
//! Translates between the provider's permission wire shapes and the
//! immutable interaction value types: classifying a notification as a
//! permission request, building an [`InteractionRequest`] from its params
//! (tolerant of per-provider key spellings), and building the
//! `session/reply` outcome params from an [`InteractionAnswer`].

use serde_json::{Value, json};

use crate::protocol::WireNotification;
use crate::types::identifiers::{InteractionId, ProviderId, SessionId};
use crate::types::interaction::{InteractionAnswer, InteractionOption, InteractionRequest};

/// Method of the side-request answering a permission notification
pub const SESSION_REPLY_METHOD: &str = "session/reply";

const INTERACTION_ID_KEYS: &[&str] = &[
    "interactionId",
    "interaction_id",
    "requestId",
    "request_id",
    "id",
];
const QUESTION_KEYS: &[&str] = &["question", "prompt", "message", "title"];
const OPTION_LIST_KEYS: &[&str] = &["options", "choices"];
const OPTION_ID_KEYS: &[&str] = &["optionId", "option_id", "id", "value"];
const OPTION_LABEL_KEYS: &[&str] = &["label", "name", "title", "text"];
const CUSTOM_INPUT_KEYS: &[&str] = &[
    "allowCustomInput",
    "allow_custom_input",
    "allowFreeText",
    "allow_free_text",
];

/// Correlation context threaded into every interaction built during a call
#[derive(Debug, Clone)]
pub struct InteractionContext {
    /// Provider the session belongs to
    pub provider_id: ProviderId,
    /// Session the prompt call is running in
    pub session_id: SessionId,
    /// Conversation id from the generate request, if any
    pub conversation_id: Option<String>,
    /// Run id from the generate request, if any
    pub run_id: Option<String>,
    /// Trace id from the generate request, if any
    pub trace_id: Option<String>,
}

/// Whether a notification method is a request-permission variant
#[must_use]
pub fn is_permission_method(method: &str) -> bool {
    method.to_ascii_lowercase().contains("permission")
}

/// Build an [`InteractionRequest`] from a permission notification
///
/// Option indexes are re-assigned densely from 1 regardless of what the
/// provider sent, so numeric selection stays deterministic. A missing
/// interaction id is generated locally.
#[must_use]
pub fn interaction_request_from_notification(
    notification: &WireNotification,
    context: &InteractionContext,
) -> InteractionRequest {
    let params = &notification.params;

    let interaction_id = first_string(params, INTERACTION_ID_KEYS)
        .map(InteractionId::new)
        .unwrap_or_else(InteractionId::generate);

    let question = first_string(params, QUESTION_KEYS)
        .or_else(|| tool_call_title(params))
        .unwrap_or_else(|| format!("Confirmation requested ({})", notification.method));

    let options = OPTION_LIST_KEYS
        .iter()
        .find_map(|k| params.get(*k).and_then(Value::as_array))
        .map(|raw| parse_options(raw))
        .unwrap_or_default();

    let allow_custom_input = CUSTOM_INPUT_KEYS
        .iter()
        .find_map(|k| params.get(*k).and_then(Value::as_bool))
        .unwrap_or(false);

    InteractionRequest {
        interaction_id,
        question,
        options,
        allow_custom_input,
        source_method: notification.method.clone(),
        conversation_id: context.conversation_id.clone(),
        run_id: context.run_id.clone(),
        trace_id: context.trace_id.clone(),
        session_id: Some(context.session_id.clone()),
        provider_id: context.provider_id.clone(),
        raw: params.clone(),
    }
}

/// Build the `session/reply` params answering an interaction
///
/// The outcome carries `option_id`/`index` for a selected option or `text`
/// for free input, plus the interaction id for correlation.
#[must_use]
pub fn reply_params_from_answer(answer: &InteractionAnswer) -> Value {
    let outcome = match (&answer.selected_option_id, &answer.custom_text) {
        (Some(option_id), _) => json!({
            "option_id": option_id,
            "index": answer.selected_index,
        }),
        (None, Some(text)) => json!({ "text": text }),
        (None, None) => json!({}),
    };

    json!({
        "interaction_id": answer.interaction_id.as_str(),
        "outcome": outcome,
    })
}

/// Parse a provider option list into densely indexed options
fn parse_options(raw: &[Value]) -> Vec<InteractionOption> {
    let mut options = Vec::with_capacity(raw.len());
    for entry in raw {
        let Some(obj) = entry.as_object() else {
            continue;
        };

        let option_id = OPTION_ID_KEYS
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .map(ToString::to_string);
        let label = OPTION_LABEL_KEYS
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .map(ToString::to_string);

        // An option with neither id nor label is unanswerable; skip it.
        let (option_id, label) = match (option_id, label) {
            (Some(id), Some(label)) => (id, label),
            (Some(id), None) => (id.clone(), id),
            (None, Some(label)) => (label.clone(), label),
            (None, None) => continue,
        };

        let index = options.len() as u32 + 1;
        options.push(InteractionOption {
            index,
            option_id,
            label,
            description: obj
                .get("description")
                .and_then(Value::as_str)
                .map(ToString::to_string),
            metadata: obj.get("metadata").cloned().unwrap_or(Value::Null),
        });
    }
    options
}

/// Question fallback: the title of the tool call awaiting approval
fn tool_call_title(params: &Value) -> Option<String> {
    ["toolCall", "tool_call"]
        .iter()
        .find_map(|k| params.get(*k))
        .and_then(|tc| {
            ["title", "name", "label"]
                .iter()
                .find_map(|k| tc.get(*k).and_then(Value::as_str))
        })
        .map(|title| format!("Allow {title}?"))
}

/// First non-empty string under any of the given keys
fn first_string(params: &Value, keys: &[&str]) -> Option<String> {
    let obj = params.as_object()?;
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}
