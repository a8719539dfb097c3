//! Lifecycle orchestration for [`Client::generate`]
//!
//! One `generate` call runs exactly one session: `initialize`, then
//! `session/new` with the degrade ladder, then the unbounded
//! `session/prompt` with the permission side-channel wired in, then a
//! guaranteed `session/close` attempt that never masks an earlier failure.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::config::FailurePolicy;
use crate::connection::{NotificationHandler, RequestHooks, SideResponseSink};
use crate::error::{AcpError, ProtocolErrorKind, Result};
use crate::events::{self, RuntimeEvent};
use crate::interaction_map::{
    InteractionContext, SESSION_REPLY_METHOD, interaction_request_from_notification,
    is_permission_method, reply_params_from_answer,
};
use crate::protocol::{RequestEnvelope, WireError, WireNotification, WireResponse};
use crate::transport::Transport;
use crate::types::identifiers::{InteractionId, SessionId};
use crate::types::request::GenerateRequest;
use crate::types::response::CanonicalResponse;

use super::Client;

const METHOD_INITIALIZE: &str = "initialize";
const METHOD_SESSION_NEW: &str = "session/new";
const METHOD_SESSION_PROMPT: &str = "session/prompt";
const METHOD_SESSION_CLOSE: &str = "session/close";

/// Protocol version announced in `initialize`
const PROTOCOL_VERSION: u32 = 1;

/// JSON-RPC codes treated as authoritative "capability unsupported" signals
const CAPABILITY_REJECTION_CODES: &[i64] = &[-32600, -32601, -32602];

/// Code providers use for an unknown method
const METHOD_NOT_FOUND: i64 = -32601;

/// Optional `session/new` fields in degrade order, with the message tokens
/// the best-effort text heuristic matches against
const DEGRADABLE_FIELDS: &[(&str, &[&str])] = &[
    ("skills", &["skill"]),
    ("mcpServers", &["mcpservers", "mcp_servers", "mcp servers", "mcp"]),
];

/// Rejection tokens for the best-effort text heuristic
const REJECTION_TOKENS: &[&str] = &[
    "unsupported",
    "not supported",
    "unknown",
    "unexpected",
    "invalid",
];

impl<T: Transport> Client<T> {
    /// Run one conversation turn and return the canonical response
    ///
    /// Exactly one session id is created, and a matching `session/close` is
    /// attempted regardless of the prompt outcome. There are no automatic
    /// retries of `session/prompt`: resending a long, possibly side-effectful
    /// prompt is unsafe, so retry is a whole-turn decision left to the
    /// caller.
    ///
    /// # Errors
    /// Returns transport, protocol or contract errors per the stage that
    /// failed; a close failure is surfaced only when nothing else failed
    pub async fn generate(&mut self, req: &GenerateRequest) -> Result<CanonicalResponse> {
        self.initialize().await?;

        let (session_id, session_key) = self.open_session(req).await?;
        events::emit(
            &self.events,
            RuntimeEvent::SessionStarted {
                provider_id: self.config.provider_id.clone(),
                session_id: session_id.clone(),
            },
        );

        let prompt_outcome = self.run_prompt(req, &session_id, session_key).await;
        let close_outcome = self.close_session(&session_id, session_key).await;

        let (result, notifications) = match prompt_outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                // The prompt failure is the true cause; a close failure on
                // top of it is only worth a log line.
                if let Err(close_err) = close_outcome {
                    log::warn!("session/close also failed after prompt error: {close_err}");
                }
                return Err(e);
            }
        };

        close_outcome?;

        self.codec
            .normalize_prompt_payload(&result, &notifications, &self.config.provider_id)
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.request_timeout_secs)
    }

    /// `initialize` - single attempt, no payload-specific retries
    async fn initialize(&mut self) -> Result<()> {
        let request_id = self.connection.id_generator().next_id();
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": crate::VERSION,
            },
        });
        let envelope = RequestEnvelope::new(request_id.clone(), METHOD_INITIALIZE, params);
        let timeout = self.request_timeout();

        let response = self
            .connection
            .request(envelope, Some(timeout))
            .await
            .map_err(|e| {
                e.with_call_context(&self.config.provider_id, METHOD_INITIALIZE, &request_id)
            })?;

        response_result(response, METHOD_INITIALIZE).map_err(|e| {
            e.with_call_context(&self.config.provider_id, METHOD_INITIALIZE, &request_id)
        })?;
        Ok(())
    }

    /// `session/new` with the degrade ladder
    ///
    /// When the failure policy is degrade and the provider rejects the call
    /// with a recognized capability-unsupported signal, exactly one
    /// previously-injected optional field is dropped per attempt, in fixed
    /// order, until success or no optional fields remain.
    async fn open_session(&mut self, req: &GenerateRequest) -> Result<(SessionId, &'static str)> {
        let full_params = self
            .codec
            .build_session_new_params(req, &self.config.provider_id);
        let injected = injected_fields(&full_params);
        let degrade = self.config.failure_policy == FailurePolicy::Degrade;
        let timeout = self.request_timeout();

        let mut dropped: Vec<&'static str> = Vec::new();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let params = strip_fields(&full_params, &dropped);
            let request_id = self.connection.id_generator().next_id();
            let envelope = RequestEnvelope::new(request_id.clone(), METHOD_SESSION_NEW, params);

            let response = self
                .connection
                .request(envelope, Some(timeout))
                .await
                .map_err(|e| {
                    e.with_call_context(&self.config.provider_id, METHOD_SESSION_NEW, &request_id)
                })?;

            let error = match response.error {
                None => {
                    let result = response.result.ok_or_else(|| {
                        AcpError::missing_result("session/new response carries no result")
                            .with_call_context(
                                &self.config.provider_id,
                                METHOD_SESSION_NEW,
                                &request_id,
                            )
                    })?;
                    return self.codec.extract_session_id(&result).map_err(|e| {
                        e.with_call_context(
                            &self.config.provider_id,
                            METHOD_SESSION_NEW,
                            &request_id,
                        )
                    });
                }
                Some(error) => error,
            };

            if degrade {
                if let Some(field) = droppable_field(&error, &injected, &dropped) {
                    log::info!(
                        "session/new rejected {field} (code {}); retrying without it",
                        error.code
                    );
                    dropped.push(field);
                    events::emit(
                        &self.events,
                        RuntimeEvent::CapabilityDropped {
                            provider_id: self.config.provider_id.clone(),
                            field: field.to_string(),
                            attempt,
                        },
                    );
                    continue;
                }
            }

            return Err(AcpError::missing_result(format!(
                "session/new failed: {} (code {})",
                error.message, error.code
            ))
            .with_call_context(&self.config.provider_id, METHOD_SESSION_NEW, &request_id));
        }
    }

    /// `session/prompt` with the permission side-channel wired in
    ///
    /// No local hard timeout: reasoning turns are unbounded in duration, and
    /// a false timeout followed by a resend could duplicate side effects.
    async fn run_prompt(
        &mut self,
        req: &GenerateRequest,
        session_id: &SessionId,
        session_key: &'static str,
    ) -> Result<(Value, Vec<Value>)> {
        let params =
            self.codec
                .build_prompt_params(req, &self.config.provider_id, session_id, session_key);
        let request_id = self.connection.id_generator().next_id();
        let envelope = RequestEnvelope::new(request_id.clone(), METHOD_SESSION_PROMPT, params);

        let context = InteractionContext {
            provider_id: self.config.provider_id.clone(),
            session_id: session_id.clone(),
            conversation_id: req.conversation_id.clone(),
            run_id: req.run_id.clone(),
            trace_id: req.trace_id.clone(),
        };

        // State scoped to this one prompt call: observed notifications, the
        // wire-id -> interaction-id correlation map, and any reply
        // rejections to surface after the prompt returns.
        let notifications: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
        let correlations: Arc<Mutex<HashMap<String, InteractionId>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let reply_failures: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        let mut hooks = RequestHooks {
            notification_sink: Some(Box::new({
                let notifications = notifications.clone();
                move |notification: &WireNotification| {
                    notifications.lock().push(json!({
                        "method": notification.method,
                        "params": notification.params,
                    }));
                }
            })),
            notification_handler: self.interaction_handler.clone().map(|handler| {
                self.permission_handler(handler, context, correlations.clone())
            }),
            side_response_sink: Some(self.reply_response_sink(
                correlations.clone(),
                reply_failures.clone(),
            )),
        };

        let response = self
            .connection
            .request_with_hooks(envelope, None, &mut hooks)
            .await
            .map_err(|e| {
                e.with_call_context(&self.config.provider_id, METHOD_SESSION_PROMPT, &request_id)
            })?;

        let failures = std::mem::take(&mut *reply_failures.lock());
        if !failures.is_empty() {
            return Err(AcpError::protocol(
                ProtocolErrorKind::SessionReplyFailed,
                failures.join("; "),
            )
            .with_call_context(&self.config.provider_id, METHOD_SESSION_PROMPT, &request_id));
        }

        let result = response_result(response, METHOD_SESSION_PROMPT).map_err(|e| {
            e.with_call_context(&self.config.provider_id, METHOD_SESSION_PROMPT, &request_id)
        })?;

        let collected = std::mem::take(&mut *notifications.lock());
        Ok((result, collected))
    }

    /// Build the notification handler that answers permission requests
    ///
    /// Maps the notification to an interaction request, blocks on the
    /// caller-supplied handler for the human's answer, and synthesizes the
    /// `session/reply` side-request, recording the wire-id correlation so
    /// the eventual side-response can be routed to the resolver.
    fn permission_handler(
        &self,
        handler: super::InteractionHandler,
        context: InteractionContext,
        correlations: Arc<Mutex<HashMap<String, InteractionId>>>,
    ) -> NotificationHandler {
        let ids = self.connection.id_generator();
        let events = self.events.clone();

        Box::new(move |notification: WireNotification| {
            let handler = handler.clone();
            let ids = ids.clone();
            let correlations = correlations.clone();
            let events = events.clone();
            let context = context.clone();

            Box::pin(async move {
                if !is_permission_method(&notification.method) {
                    return Ok(Vec::new());
                }

                let request = interaction_request_from_notification(&notification, &context);
                let interaction_id = request.interaction_id.clone();

                let answer = handler(request).await?;
                let params = reply_params_from_answer(&answer);

                let wire_id = ids.next_id();
                correlations
                    .lock()
                    .insert(wire_id.as_str().to_string(), interaction_id.clone());

                events::emit(&events, RuntimeEvent::ReplySent { interaction_id });

                Ok(vec![RequestEnvelope::new(
                    wire_id,
                    SESSION_REPLY_METHOD,
                    params,
                )])
            })
        })
    }

    /// Build the sink routing reply acknowledgements to the resolver
    fn reply_response_sink(
        &self,
        correlations: Arc<Mutex<HashMap<String, InteractionId>>>,
        reply_failures: Arc<Mutex<Vec<String>>>,
    ) -> SideResponseSink {
        let resolver = self.interaction_resolver.clone();
        let events = self.events.clone();

        Box::new(move |response: WireResponse| {
            let Some(interaction_id) = correlations.lock().remove(response.id.as_str()) else {
                let detail =
                    format!("side response {} has no interaction correlation", response.id);
                log::warn!("protocol anomaly: {detail}");
                events::emit(&events, RuntimeEvent::ProtocolAnomaly { detail });
                return;
            };

            if let Some(error) = &response.error {
                reply_failures.lock().push(format!(
                    "reply for interaction {interaction_id} rejected: {} (code {})",
                    error.message, error.code
                ));
                return;
            }

            if let Some(resolver) = &resolver {
                resolver(interaction_id);
            }
        })
    }

    /// `session/close` - always attempted, never masks the true cause
    ///
    /// A rejection that looks like "method/session not supported" is
    /// swallowed into a close_unsupported event.
    async fn close_session(
        &mut self,
        session_id: &SessionId,
        session_key: &'static str,
    ) -> Result<()> {
        let params = json!({ session_key: session_id.as_str() });
        let request_id = self.connection.id_generator().next_id();
        let envelope = RequestEnvelope::new(request_id.clone(), METHOD_SESSION_CLOSE, params);
        let timeout = self.request_timeout();

        let response = self
            .connection
            .request(envelope, Some(timeout))
            .await
            .map_err(|e| {
                e.with_call_context(&self.config.provider_id, METHOD_SESSION_CLOSE, &request_id)
            })?;

        match response.error {
            None => {
                events::emit(
                    &self.events,
                    RuntimeEvent::SessionClosed {
                        provider_id: self.config.provider_id.clone(),
                        session_id: session_id.clone(),
                    },
                );
                Ok(())
            }
            Some(error) if is_close_unsupported(&error) => {
                events::emit(
                    &self.events,
                    RuntimeEvent::CloseUnsupported {
                        provider_id: self.config.provider_id.clone(),
                        session_id: session_id.clone(),
                    },
                );
                Ok(())
            }
            Some(error) => Err(AcpError::missing_result(format!(
                "session/close failed: {} (code {})",
                error.message, error.code
            ))
            .with_call_context(&self.config.provider_id, METHOD_SESSION_CLOSE, &request_id)),
        }
    }
}

/// Unwrap a lifecycle response into its result payload
fn response_result(response: WireResponse, method: &str) -> Result<Value> {
    if let Some(error) = response.error {
        return Err(AcpError::missing_result(format!(
            "{method} failed: {} (code {})",
            error.message, error.code
        )));
    }
    response
        .result
        .ok_or_else(|| AcpError::missing_result(format!("{method} response carries no result")))
}

/// Optional fields actually present in the full params, in degrade order
fn injected_fields(params: &Value) -> Vec<&'static str> {
    let Some(obj) = params.as_object() else {
        return Vec::new();
    };
    DEGRADABLE_FIELDS
        .iter()
        .filter(|(field, _)| obj.contains_key(*field))
        .map(|(field, _)| *field)
        .collect()
}

/// Clone the full params with the dropped fields removed
fn strip_fields(params: &Value, dropped: &[&'static str]) -> Value {
    let mut params = params.clone();
    if let Some(obj) = params.as_object_mut() {
        for field in dropped {
            obj.remove(*field);
        }
    }
    params
}

/// Decide which optional field, if any, this rejection allows dropping
///
/// An authoritative JSON-RPC code drops the next field in fixed order. The
/// text heuristic is best-effort only: it needs both a rejection token and a
/// field-name token in the error message, and drops the named field.
fn droppable_field(
    error: &WireError,
    injected: &[&'static str],
    dropped: &[&'static str],
) -> Option<&'static str> {
    let remaining: Vec<&'static str> = injected
        .iter()
        .filter(|f| !dropped.contains(f))
        .copied()
        .collect();
    if remaining.is_empty() {
        return None;
    }

    if CAPABILITY_REJECTION_CODES.contains(&error.code) {
        return Some(remaining[0]);
    }

    let message = error.message.to_ascii_lowercase();
    if !REJECTION_TOKENS.iter().any(|t| message.contains(t)) {
        return None;
    }
    for field in remaining {
        let tokens = DEGRADABLE_FIELDS
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, tokens)| *tokens)
            .unwrap_or_default();
        if tokens.iter().any(|t| message.contains(t)) {
            return Some(field);
        }
    }
    None
}

/// Whether a close rejection means the method or session is unsupported
fn is_close_unsupported(error: &WireError) -> bool {
    if error.code == METHOD_NOT_FOUND {
        return true;
    }
    let message = error.message.to_ascii_lowercase();
    ["method not found", "not supported", "unknown method", "unknown session", "session not found"]
        .iter()
        .any(|t| message.contains(t))
}
