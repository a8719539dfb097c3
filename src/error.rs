//! Error types for the ACP runtime
//!
//! Callers branch on the error subtype (timeout vs protocol vs contract) to
//! decide whether to surface, degrade, or abort, so the taxonomy is explicit
//! rather than stringly typed.

use thiserror::Error;

use crate::types::identifiers::{ProviderId, RequestId};

/// Transport-level failure subtypes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The per-call deadline expired before the main response arrived
    Timeout,
    /// The provider process exited while a request was in flight
    ProcessExit,
    /// The stdout pipe closed while a request was in flight
    PipeClosed,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Timeout => "timeout",
            Self::ProcessExit => "process_exit",
            Self::PipeClosed => "pipe_closed",
        };
        f.write_str(s)
    }
}

/// Protocol-level failure subtypes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolErrorKind {
    /// A response arrived without a result where one was required
    MissingResult,
    /// A payload did not have the shape the lifecycle stage requires
    UnexpectedShape,
    /// A `session/reply` side-request was rejected by the provider
    SessionReplyFailed,
    /// A response id matched neither the main request nor a pending side id
    UnexpectedResponseId,
}

impl std::fmt::Display for ProtocolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::MissingResult => "missing_result",
            Self::UnexpectedShape => "unexpected_shape",
            Self::SessionReplyFailed => "session_reply_failed",
            Self::UnexpectedResponseId => "unexpected_response_id",
        };
        f.write_str(s)
    }
}

/// Call-site context attached to an error once, at the client layer
///
/// The transport raises with minimal context; the client adds provider,
/// method and request id on first occurrence so the original subtype is
/// preserved.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Provider profile the call was made against
    pub provider_id: ProviderId,
    /// Lifecycle method in flight
    pub method: String,
    /// Wire id of the request in flight
    pub request_id: RequestId,
}

impl std::fmt::Display for CallContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "provider={} method={} request_id={}",
            self.provider_id, self.method, self.request_id
        )
    }
}

/// Main error type for the ACP runtime
#[derive(Error, Debug)]
pub enum AcpError {
    /// Transport layer failure (process, pipe, deadline)
    #[error("transport error ({kind}): {message}{}", fmt_context(.context))]
    Transport {
        /// Failure subtype
        kind: TransportErrorKind,
        /// Human-readable description
        message: String,
        /// Last few stderr lines from the provider, for diagnostics
        stderr_tail: Vec<String>,
        /// Client-layer call context, attached once
        context: Option<CallContext>,
    },

    /// Protocol-level failure (shape, correlation, reply rejection)
    #[error("protocol error ({kind}): {message}{}", fmt_context(.context))]
    Protocol {
        /// Failure subtype
        kind: ProtocolErrorKind,
        /// Human-readable description
        message: String,
        /// Client-layer call context, attached once
        context: Option<CallContext>,
    },

    /// Codec-level invariant violation (e.g. completion claimed without any
    /// recognizable stop marker)
    #[error("contract error: {0}")]
    Contract(String),

    /// Interaction coordination failure (pending slot missing or swapped)
    #[error("interaction error: {0}")]
    Interaction(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Provider executable not found
    #[error("provider executable not found: {0}")]
    ExecutableNotFound(String),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn fmt_context(context: &Option<CallContext>) -> String {
    context
        .as_ref()
        .map(|c| format!(" [{c}]"))
        .unwrap_or_default()
}

/// Result type alias for ACP runtime operations
pub type Result<T> = std::result::Result<T, AcpError>;

impl AcpError {
    /// Create a transport timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Transport {
            kind: TransportErrorKind::Timeout,
            message: msg.into(),
            stderr_tail: Vec::new(),
            context: None,
        }
    }

    /// Create a transport process-exit error
    pub fn process_exit(msg: impl Into<String>, stderr_tail: Vec<String>) -> Self {
        Self::Transport {
            kind: TransportErrorKind::ProcessExit,
            message: msg.into(),
            stderr_tail,
            context: None,
        }
    }

    /// Create a transport pipe-closed error
    pub fn pipe_closed(msg: impl Into<String>, stderr_tail: Vec<String>) -> Self {
        Self::Transport {
            kind: TransportErrorKind::PipeClosed,
            message: msg.into(),
            stderr_tail,
            context: None,
        }
    }

    /// Create a protocol error with the given subtype
    pub fn protocol(kind: ProtocolErrorKind, msg: impl Into<String>) -> Self {
        Self::Protocol {
            kind,
            message: msg.into(),
            context: None,
        }
    }

    /// Create a `missing_result` protocol error
    pub fn missing_result(msg: impl Into<String>) -> Self {
        Self::protocol(ProtocolErrorKind::MissingResult, msg)
    }

    /// Create an `unexpected_shape` protocol error
    pub fn unexpected_shape(msg: impl Into<String>) -> Self {
        Self::protocol(ProtocolErrorKind::UnexpectedShape, msg)
    }

    /// Create a contract error
    pub fn contract(msg: impl Into<String>) -> Self {
        Self::Contract(msg.into())
    }

    /// Create an interaction error
    pub fn interaction(msg: impl Into<String>) -> Self {
        Self::Interaction(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Attach call context if none is present yet
    ///
    /// Keeps the first (innermost) context so re-raising at an outer layer
    /// never overwrites where the failure actually happened.
    #[must_use]
    pub fn with_call_context(
        mut self,
        provider_id: &ProviderId,
        method: &str,
        request_id: &RequestId,
    ) -> Self {
        let ctx = CallContext {
            provider_id: provider_id.clone(),
            method: method.to_string(),
            request_id: request_id.clone(),
        };
        match &mut self {
            Self::Transport { context, .. } | Self::Protocol { context, .. } => {
                if context.is_none() {
                    *context = Some(ctx);
                }
            }
            _ => {}
        }
        self
    }

    /// Transport failure subtype, if this is a transport error
    #[must_use]
    pub fn transport_kind(&self) -> Option<TransportErrorKind> {
        match self {
            Self::Transport { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Protocol failure subtype, if this is a protocol error
    #[must_use]
    pub fn protocol_kind(&self) -> Option<ProtocolErrorKind> {
        match self {
            Self::Protocol { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
