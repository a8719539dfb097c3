//! # ACP Runtime
//!
//! A Rust client stack for the Agent Client Protocol (ACP): a local runtime
//! that drives an external reasoning provider process over line-delimited
//! JSON-RPC on stdio and reconciles its asynchronous permission requests
//! with a human answering through a terminal or messaging bridge.
//!
//! ## Quick Start
//!
//! ```no_run
//! use acp_runtime::{AcpClient, ClientConfig, GenerateRequest, WireDialect};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder("codex", "codex-acp")
//!         .dialect(WireDialect::Streaming)
//!         .build();
//!
//!     let mut client = AcpClient::spawn(config);
//!     let response = client.generate(&GenerateRequest::new("What is 2 + 2?")).await?;
//!     log::info!("assistant: {}", response.assistant_text);
//!
//!     client.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Human-in-the-loop permissions
//!
//! Providers raise permission questions as notifications *during* the
//! otherwise-synchronous prompt call. Wire an
//! [`InteractionCoordinator`] into the client and feed it answers from your
//! terminal or channel bridge:
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use acp_runtime::{AcpClient, AnswerSource, ClientConfig, InteractionCoordinator};
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let coordinator = Arc::new(InteractionCoordinator::new());
//! let client = AcpClient::spawn(ClientConfig::new("codex", "codex-acp"))
//!     .with_coordinator(coordinator.clone());
//!
//! // Elsewhere, on the UI thread:
//! let outcome = coordinator.submit_answer("2", AnswerSource::Terminal);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`types`]: identifier newtypes, interaction values, request/response shapes
//! - [`config`]: per-provider [`ClientConfig`]
//! - [`protocol`]: wire envelopes and the response/notification tagged union
//! - [`transport`]: the [`Transport`] trait and the subprocess implementation
//! - [`connection`]: request/response correlation with side-request bookkeeping
//! - [`codec`]: per-dialect translation into the canonical response
//! - [`coordinator`]: the single-slot question/answer rendezvous
//! - [`interaction_map`]: permission notification and reply mapping helpers
//! - [`client`]: the session lifecycle orchestrator
//! - [`events`]: best-effort structured telemetry
//! - [`error`]: the transport/protocol/contract error taxonomy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod interaction_map;
pub mod protocol;
pub mod transport;
pub mod types;

// Re-export commonly used types for a flat public API
pub use client::{
    AcpClient, Client, InteractionHandler, InteractionResolver, coordinator_interaction_handler,
    coordinator_interaction_resolver,
};
pub use codec::{Codec, FlatCodec, StreamingCodec, codec_for};
pub use config::{ClientConfig, ClientConfigBuilder, FailurePolicy, WireDialect};
pub use connection::{AcpConnection, IdGenerator, RequestHooks};
pub use coordinator::{CoordinatorSnapshot, InteractionCoordinator};
pub use error::{AcpError, ProtocolErrorKind, Result, TransportErrorKind};
pub use events::{EventRecord, EventSink, LogEventSink, NullEventSink, RuntimeEvent, SharedEventSink};
pub use protocol::{RequestEnvelope, WireError, WireMessage, WireNotification, WireResponse};
pub use transport::{SubprocessTransport, Transport};
pub use types::identifiers::{InteractionId, ProviderId, RequestId, SessionId};
pub use types::interaction::{
    AnswerSource, InteractionAnswer, InteractionOption, InteractionRequest, SubmitResult,
};
pub use types::request::{GenerateRequest, GenerateRequestBuilder};
pub use types::response::{CanonicalResponse, ToolCallRecord, Usage};

/// Version of the runtime
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
