//! Session lifecycle client
//!
//! [`Client`] drives the four-stage lifecycle (`initialize` → `session/new`
//! → `session/prompt` → `session/close`) over an
//! [`AcpConnection`](crate::connection::AcpConnection), wiring the
//! permission side-channel into a caller-supplied interaction handler. It is
//! generic over the transport so tests can drive it with an in-memory
//! implementation.

mod generate;

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::codec::{Codec, codec_for};
use crate::config::ClientConfig;
use crate::connection::AcpConnection;
use crate::coordinator::InteractionCoordinator;
use crate::error::Result;
use crate::events::{LogEventSink, SharedEventSink};
use crate::transport::{SubprocessTransport, Transport};
use crate::types::identifiers::InteractionId;
use crate::types::interaction::{InteractionAnswer, InteractionRequest};

/// Caller-supplied handler exchanging a confirmation question for an answer
///
/// Typically publishes to an [`InteractionCoordinator`] and blocks on
/// [`wait_for_answer`](InteractionCoordinator::wait_for_answer).
pub type InteractionHandler =
    Arc<dyn Fn(InteractionRequest) -> BoxFuture<'static, Result<InteractionAnswer>> + Send + Sync>;

/// Callback invoked after the provider acknowledges a reply, so the pending
/// slot can be cleared
pub type InteractionResolver = Arc<dyn Fn(InteractionId) + Send + Sync>;

/// Client driving one provider over one transport
pub struct Client<T: Transport> {
    pub(crate) config: ClientConfig,
    pub(crate) connection: AcpConnection<T>,
    pub(crate) codec: &'static dyn Codec,
    pub(crate) events: SharedEventSink,
    pub(crate) interaction_handler: Option<InteractionHandler>,
    pub(crate) interaction_resolver: Option<InteractionResolver>,
}

/// Client over the standard subprocess transport
pub type AcpClient = Client<SubprocessTransport>;

impl AcpClient {
    /// Create a client that spawns the configured provider executable
    ///
    /// The process is started lazily on the first request.
    #[must_use]
    pub fn spawn(config: ClientConfig) -> Self {
        let transport = SubprocessTransport::new(config.clone());
        Self::new(config, transport)
    }
}

impl<T: Transport> Client<T> {
    /// Create a client over an existing transport
    #[must_use]
    pub fn new(config: ClientConfig, transport: T) -> Self {
        let codec = codec_for(config.dialect);
        Self {
            config,
            connection: AcpConnection::new(transport),
            codec,
            events: Arc::new(LogEventSink),
            interaction_handler: None,
            interaction_resolver: None,
        }
    }

    /// Replace the telemetry sink
    #[must_use]
    pub fn with_events(mut self, events: SharedEventSink) -> Self {
        self.events = events;
        self
    }

    /// Set the interaction handler invoked for permission notifications
    #[must_use]
    pub fn with_interaction_handler(mut self, handler: InteractionHandler) -> Self {
        self.interaction_handler = Some(handler);
        self
    }

    /// Set the resolver invoked when a reply is acknowledged
    #[must_use]
    pub fn with_interaction_resolver(mut self, resolver: InteractionResolver) -> Self {
        self.interaction_resolver = Some(resolver);
        self
    }

    /// Wire both the handler and the resolver to a coordinator
    #[must_use]
    pub fn with_coordinator(self, coordinator: Arc<InteractionCoordinator>) -> Self {
        self.with_interaction_handler(coordinator_interaction_handler(coordinator.clone()))
            .with_interaction_resolver(coordinator_interaction_resolver(coordinator))
    }

    /// The configuration this client was built from
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Close the underlying transport; idempotent
    ///
    /// # Errors
    /// Returns error if transport cleanup fails
    pub async fn shutdown(&mut self) -> Result<()> {
        self.connection.close().await
    }

    /// Close the current provider process; the next call reconnects
    ///
    /// # Errors
    /// Returns error if transport cleanup fails
    pub async fn restart_transport(&mut self) -> Result<()> {
        self.connection.restart().await
    }
}

/// Handler that publishes to a coordinator and blocks for the answer
#[must_use]
pub fn coordinator_interaction_handler(
    coordinator: Arc<InteractionCoordinator>,
) -> InteractionHandler {
    Arc::new(move |request: InteractionRequest| {
        let coordinator = coordinator.clone();
        Box::pin(async move {
            let interaction_id = request.interaction_id.clone();
            coordinator.publish(request);
            coordinator.wait_for_answer(&interaction_id).await
        })
    })
}

/// Resolver that clears the coordinator's pending slot
#[must_use]
pub fn coordinator_interaction_resolver(
    coordinator: Arc<InteractionCoordinator>,
) -> InteractionResolver {
    Arc::new(move |interaction_id: InteractionId| {
        coordinator.resolve(&interaction_id);
    })
}
