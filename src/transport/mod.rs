//! Transport layer for the provider process
//!
//! This module provides the transport abstraction and the subprocess
//! implementation that owns one provider child process and its pipes.
//! Request/response correlation lives one layer up, in
//! [`AcpConnection`](crate::connection::AcpConnection), which is generic over
//! this trait so it can be driven by an in-memory transport in tests.

pub mod subprocess;

use tokio::sync::mpsc;

use crate::error::Result;

/// Raw line-level transport to a provider
///
/// Implementations move bytes only: one write per outgoing line, one
/// background reader pushing parsed lines into the returned channel. They
/// know nothing about requests, responses, or interactions.
pub trait Transport: Send + Sync {
    /// Start the transport (spawn the process, begin the readers)
    ///
    /// Idempotent if already running.
    ///
    /// # Errors
    /// Returns error if the process cannot be spawned
    fn connect(&mut self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Write one line of data (typically a serialized request)
    ///
    /// # Errors
    /// Returns error if the write fails or the transport is not ready
    fn write(&mut self, data: &str) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Take the incoming message queue
    ///
    /// Yields one parsed JSON value per well-formed line. The channel closes
    /// when the pipe closes or the process exits. May be taken once per
    /// connect.
    fn read_messages(&mut self) -> mpsc::UnboundedReceiver<Result<serde_json::Value>>;

    /// Whether the transport is running and the process is believed alive
    fn is_ready(&self) -> bool;

    /// Last few stderr lines from the provider, for diagnostics
    fn stderr_tail(&self) -> Vec<String>;

    /// Close the transport and clean up resources
    ///
    /// Idempotent.
    ///
    /// # Errors
    /// Returns error if cleanup fails
    fn close(&mut self) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub use subprocess::SubprocessTransport;
