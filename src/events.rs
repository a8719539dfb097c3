//! Structured runtime telemetry
//!
//! Events are best-effort: a sink that fails must never propagate the
//! failure into the protocol stack. Every event is wrapped in a timestamped
//! record before delivery.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::identifiers::{InteractionId, ProviderId, SessionId};

/// Structured events emitted by the client, coordinator and codec layers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    /// A provider session was opened
    SessionStarted {
        /// Provider the session belongs to
        provider_id: ProviderId,
        /// Session id returned by the provider
        session_id: SessionId,
    },
    /// One optional capability field was dropped by the degrade ladder
    CapabilityDropped {
        /// Provider that rejected the field
        provider_id: ProviderId,
        /// Wire key of the dropped field
        field: String,
        /// Attempt number the drop happened on (1-based)
        attempt: u32,
    },
    /// A confirmation question was published to the coordinator
    InteractionPublished {
        /// Id of the published interaction
        interaction_id: InteractionId,
    },
    /// A new publish discarded an unanswered pending interaction
    InteractionReplacedByNewRequest {
        /// Id of the discarded interaction
        discarded_id: InteractionId,
        /// Id of the interaction that replaced it
        new_id: InteractionId,
    },
    /// An answer was accepted for the pending interaction
    InteractionAnswered {
        /// Id of the answered interaction
        interaction_id: InteractionId,
    },
    /// The pending slot was cleared for the given interaction
    InteractionResolved {
        /// Id of the resolved interaction
        interaction_id: InteractionId,
        /// Whether an answer had been recorded before resolution
        answered: bool,
    },
    /// A `session/reply` side-request was sent for an interaction
    ReplySent {
        /// Interaction the reply answers
        interaction_id: InteractionId,
    },
    /// `session/close` was rejected as unsupported and swallowed
    CloseUnsupported {
        /// Provider that rejected the close
        provider_id: ProviderId,
        /// Session the close targeted
        session_id: SessionId,
    },
    /// A malformed, duplicate or unroutable wire message was skipped
    ProtocolAnomaly {
        /// Description of the anomaly
        detail: String,
    },
    /// A provider session was closed
    SessionClosed {
        /// Provider the session belonged to
        provider_id: ProviderId,
        /// Session that was closed
        session_id: SessionId,
    },
}

impl RuntimeEvent {
    /// Snake-case name of this event, for logging and filtering
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "session_started",
            Self::CapabilityDropped { .. } => "capability_dropped",
            Self::InteractionPublished { .. } => "interaction_published",
            Self::InteractionReplacedByNewRequest { .. } => "interaction_replaced_by_new_request",
            Self::InteractionAnswered { .. } => "interaction_answered",
            Self::InteractionResolved { .. } => "interaction_resolved",
            Self::ReplySent { .. } => "reply_sent",
            Self::CloseUnsupported { .. } => "close_unsupported",
            Self::ProtocolAnomaly { .. } => "protocol_anomaly",
            Self::SessionClosed { .. } => "session_closed",
        }
    }
}

/// A timestamped event as delivered to sinks
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    /// When the event was emitted
    pub at: DateTime<Utc>,
    /// The event itself
    #[serde(flatten)]
    pub event: RuntimeEvent,
}

impl EventRecord {
    /// Wrap an event with the current timestamp
    #[must_use]
    pub fn now(event: RuntimeEvent) -> Self {
        Self {
            at: Utc::now(),
            event,
        }
    }
}

/// Best-effort structured telemetry sink
///
/// Implementations must not panic; any internal failure is theirs to absorb.
pub trait EventSink: Send + Sync {
    /// Deliver one event record
    fn emit(&self, record: &EventRecord);
}

/// Shared handle to an event sink
pub type SharedEventSink = Arc<dyn EventSink>;

/// Emit an event through a sink, wrapping it in a timestamped record
pub fn emit(sink: &SharedEventSink, event: RuntimeEvent) {
    sink.emit(&EventRecord::now(event));
}

/// Sink that writes events to the `log` facade at debug level
#[derive(Debug, Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, record: &EventRecord) {
        match serde_json::to_string(&record.event) {
            Ok(payload) => log::debug!("event {}: {payload}", record.event.name()),
            Err(e) => log::debug!("event {} (unserializable: {e})", record.event.name()),
        }
    }
}

/// Sink that drops all events
#[derive(Debug, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _record: &EventRecord) {}
}
