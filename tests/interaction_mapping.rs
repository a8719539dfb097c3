//! Permission notification classification and reply mapping

mod common;

use acp_runtime::interaction_map::{
    InteractionContext, interaction_request_from_notification, is_permission_method,
    reply_params_from_answer,
};
use acp_runtime::{AnswerSource, InteractionAnswer, ProviderId, SessionId, WireNotification};
use serde_json::json;

use common::sample_request;

fn context() -> InteractionContext {
    InteractionContext {
        provider_id: ProviderId::new("test"),
        session_id: SessionId::new("sess-1"),
        conversation_id: Some("conv-1".to_string()),
        run_id: Some("run-1".to_string()),
        trace_id: None,
    }
}

fn notification(method: &str, params: serde_json::Value) -> WireNotification {
    WireNotification {
        method: method.to_string(),
        params,
    }
}

#[test]
fn permission_methods_are_matched_case_insensitively() {
    assert!(is_permission_method("session/request_permission"));
    assert!(is_permission_method("session/requestPermission"));
    assert!(is_permission_method("PERMISSION/ask"));
    assert!(!is_permission_method("session/update"));
    assert!(!is_permission_method("session/prompt"));
}

#[test]
fn request_is_built_from_a_well_formed_notification() {
    let request = interaction_request_from_notification(
        &notification(
            "session/request_permission",
            json!({
                "interactionId": "int-9",
                "question": "Run the migration?",
                "options": [
                    { "optionId": "yes", "label": "Yes", "description": "apply it" },
                    { "optionId": "no", "label": "No" },
                ],
                "allowCustomInput": true,
            }),
        ),
        &context(),
    );

    assert_eq!(request.interaction_id.as_str(), "int-9");
    assert_eq!(request.question, "Run the migration?");
    assert!(request.allow_custom_input);
    assert_eq!(request.options.len(), 2);
    assert_eq!(request.options[0].index, 1);
    assert_eq!(request.options[0].option_id, "yes");
    assert_eq!(request.options[0].description.as_deref(), Some("apply it"));
    assert_eq!(request.options[1].index, 2);
    assert_eq!(request.conversation_id.as_deref(), Some("conv-1"));
    assert_eq!(request.run_id.as_deref(), Some("run-1"));
    assert_eq!(request.session_id.as_ref().unwrap().as_str(), "sess-1");
    assert_eq!(request.source_method, "session/request_permission");
}

#[test]
fn missing_interaction_id_is_generated_locally() {
    let a = interaction_request_from_notification(
        &notification("session/request_permission", json!({ "question": "ok?" })),
        &context(),
    );
    let b = interaction_request_from_notification(
        &notification("session/request_permission", json!({ "question": "ok?" })),
        &context(),
    );
    assert!(!a.interaction_id.as_str().is_empty());
    assert_ne!(a.interaction_id, b.interaction_id);
}

#[test]
fn question_falls_back_to_the_tool_call_title() {
    let request = interaction_request_from_notification(
        &notification(
            "session/request_permission",
            json!({ "toolCall": { "title": "rm -rf ./build" } }),
        ),
        &context(),
    );
    assert_eq!(request.question, "Allow rm -rf ./build?");

    let bare = interaction_request_from_notification(
        &notification("session/request_permission", json!({})),
        &context(),
    );
    assert_eq!(
        bare.question,
        "Confirmation requested (session/request_permission)"
    );
}

#[test]
fn option_spellings_are_tolerated_and_reindexed_densely() {
    let request = interaction_request_from_notification(
        &notification(
            "session/request_permission",
            json!({
                "question": "pick one",
                "choices": [
                    { "value": "a", "name": "Alpha" },
                    "not an object",
                    { "no_id_no_label": true },
                    { "id": "b" },
                    { "label": "Gamma" },
                ],
            }),
        ),
        &context(),
    );

    // Junk entries are skipped and the survivors re-indexed from 1.
    let summary: Vec<(u32, &str, &str)> = request
        .options
        .iter()
        .map(|o| (o.index, o.option_id.as_str(), o.label.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![(1, "a", "Alpha"), (2, "b", "b"), (3, "Gamma", "Gamma")]
    );
    assert!(!request.allow_custom_input);
}

#[test]
fn reply_params_carry_the_selection_outcome() {
    let request = sample_request("int-1", &[("allow", "Allow"), ("deny", "Deny")], false);
    let answer = InteractionAnswer::selection(&request, &request.options[1], AnswerSource::Channel);

    let params = reply_params_from_answer(&answer);
    assert_eq!(params["interaction_id"], "int-1");
    assert_eq!(params["outcome"]["option_id"], "deny");
    assert_eq!(params["outcome"]["index"], 2);
}

#[test]
fn reply_params_carry_free_text_outcomes() {
    let request = sample_request("int-1", &[], true);
    let answer = InteractionAnswer::free_text(&request, "only the docs dir", AnswerSource::Terminal);

    let params = reply_params_from_answer(&answer);
    assert_eq!(params["interaction_id"], "int-1");
    assert_eq!(params["outcome"]["text"], "only the docs dir");
    assert!(params["outcome"].get("option_id").is_none());
}
