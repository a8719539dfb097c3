//! Interaction coordinator
//!
//! A thread-safe single-slot rendezvous between "something needs an answer"
//! (the protocol thread blocked inside a prompt call) and "somebody answers
//! it" (the terminal or messaging-channel thread). The slot holds at most
//! one `(request, answer?)` pair; a new publish discards an unanswered
//! predecessor rather than queueing behind it, and the first accepted answer
//! wins.

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Notify;

use crate::error::{AcpError, Result};
use crate::events::{self, NullEventSink, RuntimeEvent, SharedEventSink};
use crate::types::identifiers::InteractionId;
use crate::types::interaction::{
    AnswerSource, InteractionAnswer, InteractionRequest, SubmitResult,
};

/// The pending slot: one request and, once accepted, its answer
struct Slot {
    request: InteractionRequest,
    answer: Option<InteractionAnswer>,
}

/// Read-only view of the pending slot for UI and diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorSnapshot {
    /// The pending request, if any
    pub request: Option<InteractionRequest>,
    /// Whether an answer has been recorded for it
    pub answered: bool,
}

/// Single-slot rendezvous for confirmation questions and their answers
pub struct InteractionCoordinator {
    slot: Mutex<Option<Slot>>,
    notify: Notify,
    events: SharedEventSink,
}

impl Default for InteractionCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionCoordinator {
    /// Create a coordinator with no telemetry
    #[must_use]
    pub fn new() -> Self {
        Self::with_events(std::sync::Arc::new(NullEventSink))
    }

    /// Create a coordinator emitting lifecycle events into the given sink
    #[must_use]
    pub fn with_events(events: SharedEventSink) -> Self {
        Self {
            slot: Mutex::new(None),
            notify: Notify::new(),
            events,
        }
    }

    /// Install a new pending request, discarding any unanswered predecessor
    ///
    /// Never queues: if the previous request is still unanswered it is
    /// dropped and a replaced event is emitted, so any thread still waiting
    /// on the old id errors out instead of receiving a stale answer.
    pub fn publish(&self, request: InteractionRequest) {
        let new_id = request.interaction_id.clone();
        let discarded = {
            let mut slot = self.slot.lock();
            let discarded = match slot.take() {
                Some(old) if old.answer.is_none() => Some(old.request.interaction_id),
                _ => None,
            };
            *slot = Some(Slot {
                request,
                answer: None,
            });
            discarded
        };

        if let Some(discarded_id) = discarded {
            events::emit(
                &self.events,
                RuntimeEvent::InteractionReplacedByNewRequest {
                    discarded_id,
                    new_id: new_id.clone(),
                },
            );
        }
        events::emit(
            &self.events,
            RuntimeEvent::InteractionPublished {
                interaction_id: new_id,
            },
        );

        self.notify.notify_waiters();
    }

    /// Whether a request is currently pending
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Non-blocking view of the pending slot
    #[must_use]
    pub fn snapshot(&self) -> CoordinatorSnapshot {
        let slot = self.slot.lock();
        CoordinatorSnapshot {
            request: slot.as_ref().map(|s| s.request.clone()),
            answered: slot.as_ref().is_some_and(|s| s.answer.is_some()),
        }
    }

    /// Submit a raw human answer for the pending request
    ///
    /// Rejections are returned as data, not raised: no pending request,
    /// already answered, empty text, or a non-option answer while custom
    /// input is disallowed. All-digit input matching a declared option index
    /// maps deterministically to that option. First accepted answer wins.
    pub fn submit_answer(&self, raw_text: &str, source: AnswerSource) -> SubmitResult {
        let text = raw_text.trim();
        if text.is_empty() {
            return SubmitResult::rejected("empty answer");
        }

        let (result, answered_id) = {
            let mut slot = self.slot.lock();
            let Some(current) = slot.as_mut() else {
                return SubmitResult::rejected("no pending interaction");
            };
            if current.answer.is_some() {
                return SubmitResult::rejected("interaction already answered");
            }

            let answer = match map_answer(&current.request, text, source) {
                Ok(answer) => answer,
                Err(reason) => return SubmitResult::rejected(reason),
            };

            current.answer = Some(answer.clone());
            let id = current.request.interaction_id.clone();
            (SubmitResult::accepted("answer recorded", answer), id)
        };

        events::emit(
            &self.events,
            RuntimeEvent::InteractionAnswered {
                interaction_id: answered_id,
            },
        );
        self.notify.notify_waiters();
        result
    }

    /// Block until an answer for exactly this interaction id is available
    ///
    /// # Errors
    /// Returns an interaction error if no request is pending or the slot has
    /// been swapped for a different interaction while waiting - the caller
    /// must not assume the original question is still live.
    pub async fn wait_for_answer(&self, interaction_id: &InteractionId) -> Result<InteractionAnswer> {
        loop {
            // Register before checking so a wake between the check and the
            // await cannot be missed.
            let notified = self.notify.notified();

            {
                let slot = self.slot.lock();
                match slot.as_ref() {
                    None => {
                        return Err(AcpError::interaction(format!(
                            "interaction {interaction_id} is no longer pending"
                        )));
                    }
                    Some(current) if current.request.interaction_id != *interaction_id => {
                        return Err(AcpError::interaction(format!(
                            "interaction {interaction_id} was replaced by {}",
                            current.request.interaction_id
                        )));
                    }
                    Some(current) => {
                        if let Some(answer) = &current.answer {
                            return Ok(answer.clone());
                        }
                    }
                }
            }

            notified.await;
        }
    }

    /// Clear the pending slot if it still holds this interaction
    ///
    /// Idempotent no-op when the slot holds a different interaction or is
    /// already empty. Emits a resolved event noting whether an answer had
    /// been recorded.
    pub fn resolve(&self, interaction_id: &InteractionId) {
        let resolved = {
            let mut slot = self.slot.lock();
            match slot.as_ref() {
                Some(current) if current.request.interaction_id == *interaction_id => {
                    let answered = current.answer.is_some();
                    *slot = None;
                    Some(answered)
                }
                _ => None,
            }
        };

        if let Some(answered) = resolved {
            events::emit(
                &self.events,
                RuntimeEvent::InteractionResolved {
                    interaction_id: interaction_id.clone(),
                    answered,
                },
            );
            self.notify.notify_waiters();
        }
    }
}

/// Map raw text onto the pending request's answer shape
///
/// All-digit input is an option index; anything else is free text, accepted
/// only when the request allows custom input.
fn map_answer(
    request: &InteractionRequest,
    text: &str,
    source: AnswerSource,
) -> std::result::Result<InteractionAnswer, String> {
    if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(index) = text.parse::<u32>() {
            if let Some(option) = request.option_at(index) {
                return Ok(InteractionAnswer::selection(request, option, source));
            }
        }
        if !request.allow_custom_input {
            return Err(format!("invalid option: {text}"));
        }
    }

    if request.allow_custom_input {
        Ok(InteractionAnswer::free_text(request, text, source))
    } else {
        Err(format!("invalid option: {text}"))
    }
}
