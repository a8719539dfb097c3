//! Full session lifecycle over a scripted transport

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::{Value, json};

use acp_runtime::{
    AcpError, AnswerSource, Client, ClientConfig, FailurePolicy, GenerateRequest,
    InteractionAnswer, InteractionCoordinator, InteractionHandler, ProtocolErrorKind,
    RuntimeEvent, WireDialect,
};
use common::{MockTransport, RecordingSink, notify, respond, respond_err};

fn config(dialect: WireDialect) -> ClientConfig {
    ClientConfig::builder("test", "/usr/bin/provider")
        .dialect(dialect)
        .build()
}

/// Methods written to the wire, in order
fn methods(writes: &Arc<Mutex<Vec<Value>>>) -> Vec<String> {
    writes
        .lock()
        .iter()
        .filter_map(|w| w["method"].as_str().map(ToString::to_string))
        .collect()
}

#[tokio::test]
async fn happy_path_runs_the_full_lifecycle() -> anyhow::Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let transport = MockTransport::responding(|msg| {
        let id = msg["id"].clone();
        match msg["method"].as_str().unwrap() {
            "initialize" => vec![respond(&id, json!({ "protocolVersion": 1 }))],
            "session/new" => vec![respond(&id, json!({ "sessionId": "sess-1" }))],
            "session/prompt" => vec![respond(
                &id,
                json!({ "assistant_text": "four", "finish_reason": "stop" }),
            )],
            "session/close" => vec![respond(&id, json!({}))],
            other => panic!("unexpected method {other}"),
        }
    });
    let writes = transport.writes_handle();
    let events = RecordingSink::new();
    let mut client =
        Client::new(config(WireDialect::Flat), transport).with_events(events.clone());

    let response = client.generate(&GenerateRequest::new("What is 2 + 2?")).await?;

    assert_eq!(response.assistant_text, "four");
    assert_eq!(response.finish_reason, "stop");
    assert_eq!(
        methods(&writes),
        ["initialize", "session/new", "session/prompt", "session/close"]
    );
    assert_eq!(events.names(), ["session_started", "session_closed"]);
    Ok(())
}

#[tokio::test]
async fn discovered_session_key_spelling_is_echoed_back() -> anyhow::Result<()> {
    let transport = MockTransport::responding(|msg| {
        let id = msg["id"].clone();
        match msg["method"].as_str().unwrap() {
            "initialize" => vec![respond(&id, json!({}))],
            "session/new" => vec![respond(&id, json!({ "session_id": "snake-1" }))],
            "session/prompt" => vec![respond(&id, json!({ "finish_reason": "stop" }))],
            "session/close" => vec![respond(&id, json!({}))],
            other => panic!("unexpected method {other}"),
        }
    });
    let writes = transport.writes_handle();
    let mut client = Client::new(config(WireDialect::Flat), transport);

    client.generate(&GenerateRequest::new("hi")).await?;

    let writes = writes.lock();
    let prompt = writes.iter().find(|w| w["method"] == "session/prompt").unwrap();
    let close = writes.iter().find(|w| w["method"] == "session/close").unwrap();
    assert_eq!(prompt["params"]["session_id"], "snake-1");
    assert_eq!(close["params"]["session_id"], "snake-1");
    Ok(())
}

#[tokio::test]
async fn degrade_ladder_drops_one_field_per_attempt() {
    let mut session_new_attempts = 0u32;
    let transport = MockTransport::responding(move |msg| {
        let id = msg["id"].clone();
        match msg["method"].as_str().unwrap() {
            "initialize" => vec![respond(&id, json!({}))],
            "session/new" => {
                session_new_attempts += 1;
                if session_new_attempts <= 2 {
                    vec![respond_err(&id, -32602, "invalid params")]
                } else {
                    vec![respond(&id, json!({ "sessionId": "sess-1" }))]
                }
            }
            "session/prompt" => vec![respond(&id, json!({ "finish_reason": "stop" }))],
            "session/close" => vec![respond(&id, json!({}))],
            other => panic!("unexpected method {other}"),
        }
    });
    let writes = transport.writes_handle();
    let events = RecordingSink::new();
    let mut client =
        Client::new(config(WireDialect::Flat), transport).with_events(events.clone());

    let request = GenerateRequest::builder()
        .prompt("hi")
        .skills(vec![json!({ "name": "search" })])
        .mcp_servers(vec![json!({ "name": "files" })])
        .build();
    client.generate(&request).await.unwrap();

    let writes = writes.lock();
    let session_news: Vec<&Value> = writes
        .iter()
        .filter(|w| w["method"] == "session/new")
        .collect();
    assert_eq!(session_news.len(), 3);
    assert!(session_news[0]["params"].get("skills").is_some());
    assert!(session_news[0]["params"].get("mcpServers").is_some());
    assert!(session_news[1]["params"].get("skills").is_none());
    assert!(session_news[1]["params"].get("mcpServers").is_some());
    assert!(session_news[2]["params"].get("skills").is_none());
    assert!(session_news[2]["params"].get("mcpServers").is_none());

    let drops: Vec<(String, u32)> = events
        .events()
        .iter()
        .filter_map(|e| match e {
            RuntimeEvent::CapabilityDropped { field, attempt, .. } => {
                Some((field.clone(), *attempt))
            }
            _ => None,
        })
        .collect();
    assert_eq!(drops, [("skills".to_string(), 1), ("mcpServers".to_string(), 2)]);
}

#[tokio::test]
async fn text_heuristic_drops_the_field_the_message_names() {
    let mut rejected = false;
    let transport = MockTransport::responding(move |msg| {
        let id = msg["id"].clone();
        match msg["method"].as_str().unwrap() {
            "initialize" => vec![respond(&id, json!({}))],
            "session/new" => {
                if !rejected {
                    rejected = true;
                    // Non-authoritative code; the message names the field.
                    vec![respond_err(&id, -1, "unknown field mcpServers")]
                } else {
                    vec![respond(&id, json!({ "sessionId": "sess-1" }))]
                }
            }
            "session/prompt" => vec![respond(&id, json!({ "finish_reason": "stop" }))],
            "session/close" => vec![respond(&id, json!({}))],
            other => panic!("unexpected method {other}"),
        }
    });
    let writes = transport.writes_handle();
    let mut client = Client::new(config(WireDialect::Flat), transport);

    let request = GenerateRequest::builder()
        .prompt("hi")
        .skills(vec![json!({ "name": "search" })])
        .mcp_servers(vec![json!({ "name": "files" })])
        .build();
    client.generate(&request).await.unwrap();

    // Skills survive; only the named field was dropped.
    let writes = writes.lock();
    let retry = writes
        .iter()
        .filter(|w| w["method"] == "session/new")
        .nth(1)
        .unwrap();
    assert!(retry["params"].get("skills").is_some());
    assert!(retry["params"].get("mcpServers").is_none());
}

#[tokio::test]
async fn fail_policy_propagates_the_first_rejection() {
    let transport = MockTransport::responding(|msg| {
        let id = msg["id"].clone();
        match msg["method"].as_str().unwrap() {
            "initialize" => vec![respond(&id, json!({}))],
            "session/new" => vec![respond_err(&id, -32602, "invalid params")],
            other => panic!("unexpected method {other}"),
        }
    });
    let writes = transport.writes_handle();
    let config = ClientConfig::builder("test", "/usr/bin/provider")
        .dialect(WireDialect::Flat)
        .failure_policy(FailurePolicy::Fail)
        .build();
    let mut client = Client::new(config, transport);

    let request = GenerateRequest::builder()
        .prompt("hi")
        .skills(vec![json!({ "name": "search" })])
        .build();
    let err = client.generate(&request).await.unwrap_err();

    assert_eq!(err.protocol_kind(), Some(ProtocolErrorKind::MissingResult));
    assert_eq!(
        methods(&writes)
            .iter()
            .filter(|m| m.as_str() == "session/new")
            .count(),
        1
    );
}

#[tokio::test]
async fn exhausting_the_ladder_propagates_the_rejection() {
    let transport = MockTransport::responding(|msg| {
        let id = msg["id"].clone();
        match msg["method"].as_str().unwrap() {
            "initialize" => vec![respond(&id, json!({}))],
            "session/new" => vec![respond_err(&id, -32602, "invalid params")],
            other => panic!("unexpected method {other}"),
        }
    });
    let writes = transport.writes_handle();
    let mut client = Client::new(config(WireDialect::Flat), transport);

    let request = GenerateRequest::builder()
        .prompt("hi")
        .skills(vec![json!({ "name": "search" })])
        .mcp_servers(vec![json!({ "name": "files" })])
        .build();
    let err = client.generate(&request).await.unwrap_err();

    assert_eq!(err.protocol_kind(), Some(ProtocolErrorKind::MissingResult));
    // Two fields were injected, so the original try plus one retry per field.
    assert_eq!(
        methods(&writes)
            .iter()
            .filter(|m| m.as_str() == "session/new")
            .count(),
        3
    );
}

#[tokio::test]
async fn unsupported_close_is_swallowed() {
    let transport = MockTransport::responding(|msg| {
        let id = msg["id"].clone();
        match msg["method"].as_str().unwrap() {
            "initialize" => vec![respond(&id, json!({}))],
            "session/new" => vec![respond(&id, json!({ "sessionId": "sess-1" }))],
            "session/prompt" => vec![respond(&id, json!({ "finish_reason": "stop" }))],
            "session/close" => vec![respond_err(&id, -32601, "method not found")],
            other => panic!("unexpected method {other}"),
        }
    });
    let events = RecordingSink::new();
    let mut client =
        Client::new(config(WireDialect::Flat), transport).with_events(events.clone());

    client.generate(&GenerateRequest::new("hi")).await.unwrap();
    assert_eq!(events.names(), ["session_started", "close_unsupported"]);
}

#[tokio::test]
async fn real_close_failure_is_surfaced_when_the_prompt_succeeded() {
    let transport = MockTransport::responding(|msg| {
        let id = msg["id"].clone();
        match msg["method"].as_str().unwrap() {
            "initialize" => vec![respond(&id, json!({}))],
            "session/new" => vec![respond(&id, json!({ "sessionId": "sess-1" }))],
            "session/prompt" => vec![respond(&id, json!({ "finish_reason": "stop" }))],
            "session/close" => vec![respond_err(&id, -32000, "internal error")],
            other => panic!("unexpected method {other}"),
        }
    });
    let mut client = Client::new(config(WireDialect::Flat), transport);

    let err = client.generate(&GenerateRequest::new("hi")).await.unwrap_err();
    assert!(err.to_string().contains("session/close failed"));
}

#[tokio::test]
async fn close_failure_never_masks_the_prompt_failure() {
    let transport = MockTransport::responding(|msg| {
        let id = msg["id"].clone();
        match msg["method"].as_str().unwrap() {
            "initialize" => vec![respond(&id, json!({}))],
            "session/new" => vec![respond(&id, json!({ "sessionId": "sess-1" }))],
            "session/prompt" => vec![respond_err(&id, -32050, "provider blew up")],
            "session/close" => vec![respond_err(&id, -32000, "also broken")],
            other => panic!("unexpected method {other}"),
        }
    });
    let writes = transport.writes_handle();
    let mut client = Client::new(config(WireDialect::Flat), transport);

    let err = client.generate(&GenerateRequest::new("hi")).await.unwrap_err();

    // Close was still attempted, but the prompt error is the one surfaced.
    assert!(methods(&writes).contains(&"session/close".to_string()));
    assert!(err.to_string().contains("session/prompt failed"));
    assert!(err.to_string().contains("provider blew up"));
}

#[tokio::test]
async fn permission_request_is_answered_mid_prompt() {
    let _ = env_logger::builder().is_test(true).try_init();

    let prompt_id: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
    let transport = MockTransport::responding({
        let prompt_id = prompt_id.clone();
        move |msg| {
            let id = msg["id"].clone();
            match msg["method"].as_str().unwrap() {
                "initialize" => vec![respond(&id, json!({}))],
                "session/new" => vec![respond(&id, json!({ "sessionId": "sess-1" }))],
                "session/prompt" => {
                    *prompt_id.lock() = Some(id);
                    vec![
                        notify(
                            "session/update",
                            json!({ "update": {
                                "sessionUpdate": "agent_message_chunk",
                                "content": { "type": "text", "text": "Asking first. " },
                            }}),
                        ),
                        notify(
                            "session/request_permission",
                            json!({
                                "interactionId": "int-1",
                                "question": "Delete ./build?",
                                "options": [
                                    { "optionId": "allow", "label": "Allow" },
                                    { "optionId": "deny", "label": "Deny" },
                                ],
                            }),
                        ),
                    ]
                }
                "session/reply" => {
                    let prompt_id = prompt_id.lock().take().unwrap();
                    vec![
                        notify(
                            "session/update",
                            json!({ "update": {
                                "sessionUpdate": "agent_message_chunk",
                                "content": { "type": "text", "text": "Approved; done." },
                            }}),
                        ),
                        // Main response first: it must be withheld until the
                        // reply is acknowledged.
                        respond(&prompt_id, json!({ "stopReason": "end_turn" })),
                        respond(&id, json!({ "accepted": true })),
                    ]
                }
                "session/close" => vec![respond(&id, json!({}))],
                other => panic!("unexpected method {other}"),
            }
        }
    });
    let writes = transport.writes_handle();
    let events = RecordingSink::new();
    let coordinator = Arc::new(InteractionCoordinator::with_events(events.clone()));
    let mut client = Client::new(config(WireDialect::Streaming), transport)
        .with_events(events.clone())
        .with_coordinator(coordinator.clone());

    let answerer = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            loop {
                if coordinator.has_pending() {
                    let outcome = coordinator.submit_answer("2", AnswerSource::Api);
                    assert!(outcome.accepted, "{}", outcome.message);
                    break;
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
    };

    let response = client.generate(&GenerateRequest::new("clean up")).await.unwrap();
    answerer.await.unwrap();

    assert_eq!(response.assistant_text, "Asking first. Approved; done.");
    assert_eq!(response.finish_reason, "end_turn");

    // The reply side-request carried the selected option.
    let writes = writes.lock();
    let reply = writes.iter().find(|w| w["method"] == "session/reply").unwrap();
    assert_eq!(reply["params"]["interaction_id"], "int-1");
    assert_eq!(reply["params"]["outcome"]["option_id"], "deny");
    assert_eq!(reply["params"]["outcome"]["index"], 2);
    drop(writes);

    // The coordinator slot was cleared once the reply was acknowledged.
    assert!(!coordinator.has_pending());
    assert_eq!(
        events.names(),
        [
            "session_started",
            "interaction_published",
            "interaction_answered",
            "reply_sent",
            "interaction_resolved",
            "session_closed",
        ]
    );
}

#[tokio::test]
async fn rejected_reply_fails_the_prompt() {
    let prompt_id: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
    let transport = MockTransport::responding({
        let prompt_id = prompt_id.clone();
        move |msg| {
            let id = msg["id"].clone();
            match msg["method"].as_str().unwrap() {
                "initialize" => vec![respond(&id, json!({}))],
                "session/new" => vec![respond(&id, json!({ "sessionId": "sess-1" }))],
                "session/prompt" => {
                    *prompt_id.lock() = Some(id);
                    vec![notify(
                        "session/request_permission",
                        json!({
                            "interactionId": "int-1",
                            "question": "Proceed?",
                            "options": [{ "optionId": "allow", "label": "Allow" }],
                        }),
                    )]
                }
                "session/reply" => {
                    let prompt_id = prompt_id.lock().take().unwrap();
                    vec![
                        respond_err(&id, -32000, "reply rejected"),
                        respond(&prompt_id, json!({ "stopReason": "end_turn" })),
                    ]
                }
                "session/close" => vec![respond(&id, json!({}))],
                other => panic!("unexpected method {other}"),
            }
        }
    });
    let handler: InteractionHandler = Arc::new(|request| {
        async move {
            let option = request.options[0].clone();
            Ok(InteractionAnswer::selection(&request, &option, AnswerSource::Api))
        }
        .boxed()
    });
    let mut client = Client::new(config(WireDialect::Streaming), transport)
        .with_interaction_handler(handler);

    let err = client.generate(&GenerateRequest::new("hi")).await.unwrap_err();
    assert_eq!(
        err.protocol_kind(),
        Some(ProtocolErrorKind::SessionReplyFailed)
    );
    assert!(err.to_string().contains("reply rejected"));
}

#[tokio::test]
async fn handler_failure_aborts_the_prompt() {
    let transport = MockTransport::responding(|msg| {
        let id = msg["id"].clone();
        match msg["method"].as_str().unwrap() {
            "initialize" => vec![respond(&id, json!({}))],
            "session/new" => vec![respond(&id, json!({ "sessionId": "sess-1" }))],
            "session/prompt" => vec![notify(
                "session/request_permission",
                json!({ "interactionId": "int-1", "question": "Proceed?" }),
            )],
            "session/close" => vec![respond(&id, json!({}))],
            other => panic!("unexpected method {other}"),
        }
    });
    let handler: InteractionHandler = Arc::new(|_request| {
        async { Err(AcpError::interaction("nobody is listening")) }.boxed()
    });
    let mut client = Client::new(config(WireDialect::Streaming), transport)
        .with_interaction_handler(handler);

    let err = client.generate(&GenerateRequest::new("hi")).await.unwrap_err();
    assert!(err.to_string().contains("nobody is listening"));
}
