//! Request/response correlation over a raw transport
//!
//! [`AcpConnection`] turns one logical request into one logical response
//! while never losing or misrouting interleaved traffic: provider
//! notifications arrive *during* the otherwise-synchronous call, and a
//! notification handler may synthesize side-requests (permission replies)
//! whose own responses must be captured before the main response is handed
//! back. Requests are strictly sequential; at most one `request()` is in
//! flight per connection.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::{AcpError, ProtocolErrorKind, Result};
use crate::protocol::{RequestEnvelope, WireMessage, WireNotification, WireResponse};
use crate::transport::Transport;
use crate::types::identifiers::RequestId;

/// Interval between child-liveness re-checks during an unbounded wait
pub const LIVENESS_CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Monotonic wire-id generator, cloneable into callbacks
///
/// Ids are unique within the lifetime of one connection; a collision is a
/// programmer error.
#[derive(Debug, Clone)]
pub struct IdGenerator(Arc<AtomicU64>);

impl IdGenerator {
    fn new() -> Self {
        Self(Arc::new(AtomicU64::new(1)))
    }

    /// Mint the next request id
    #[must_use]
    pub fn next_id(&self) -> RequestId {
        let n = self.0.fetch_add(1, Ordering::SeqCst);
        RequestId::new(format!("req-{n}"))
    }
}

/// Callback receiving every notification observed during a call
pub type NotificationSink = Box<dyn FnMut(&WireNotification) + Send>;

/// Callback that may synthesize side-request envelopes for a notification
///
/// Returned envelopes are written immediately and their ids tracked; the
/// main response is withheld until each has received its own response.
pub type NotificationHandler =
    Box<dyn FnMut(WireNotification) -> BoxFuture<'static, Result<Vec<RequestEnvelope>>> + Send>;

/// Callback receiving the response to each synthesized side-request
pub type SideResponseSink = Box<dyn FnMut(WireResponse) + Send>;

/// Optional per-call hooks for notification and side-response traffic
#[derive(Default)]
pub struct RequestHooks {
    /// Forwarded every notification observed during the call
    pub notification_sink: Option<NotificationSink>,
    /// May synthesize side-requests in response to notifications
    pub notification_handler: Option<NotificationHandler>,
    /// Receives each side-request's own response
    pub side_response_sink: Option<SideResponseSink>,
}

impl RequestHooks {
    /// Hooks that observe and synthesize nothing
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }
}

/// Mutable correlation state local to one `request()` call
///
/// An explicit struct rather than connection fields, so the
/// one-active-call invariant is structurally obvious.
struct RequestScope {
    request_id: RequestId,
    pending_side_ids: HashSet<RequestId>,
    stashed_main: Option<WireResponse>,
    consumed_ids: HashSet<RequestId>,
}

impl RequestScope {
    fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            pending_side_ids: HashSet::new(),
            stashed_main: None,
            consumed_ids: HashSet::new(),
        }
    }
}

/// One logical request/response channel to a provider process
pub struct AcpConnection<T: Transport> {
    transport: T,
    incoming: Option<mpsc::UnboundedReceiver<Result<serde_json::Value>>>,
    ids: IdGenerator,
}

impl<T: Transport> AcpConnection<T> {
    /// Wrap a transport
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            incoming: None,
            ids: IdGenerator::new(),
        }
    }

    /// Cloneable handle minting wire ids for this connection
    #[must_use]
    pub fn id_generator(&self) -> IdGenerator {
        self.ids.clone()
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Last few provider stderr lines, for diagnostics
    #[must_use]
    pub fn stderr_tail(&self) -> Vec<String> {
        self.transport.stderr_tail()
    }

    /// Start the transport lazily; idempotent
    ///
    /// # Errors
    /// Returns error if the transport cannot connect
    pub async fn ensure_started(&mut self) -> Result<()> {
        if self.incoming.is_none() {
            self.transport.connect().await?;
            self.incoming = Some(self.transport.read_messages());
        }
        Ok(())
    }

    /// Close the transport; idempotent
    ///
    /// # Errors
    /// Returns error if transport cleanup fails
    pub async fn close(&mut self) -> Result<()> {
        self.incoming = None;
        self.transport.close().await
    }

    /// Close and forget the current process; the next request reconnects
    ///
    /// # Errors
    /// Returns error if transport cleanup fails
    pub async fn restart(&mut self) -> Result<()> {
        self.close().await
    }

    /// Send one request without hooks and wait for its response
    ///
    /// # Errors
    /// Returns a transport error on timeout, pipe closure or process exit
    pub async fn request(
        &mut self,
        envelope: RequestEnvelope,
        timeout: Option<Duration>,
    ) -> Result<WireResponse> {
        self.request_with_hooks(envelope, timeout, &mut RequestHooks::none())
            .await
    }

    /// Send one request and wait for its response, demultiplexing traffic
    ///
    /// A `timeout` of `None` waits unboundedly but periodically re-checks
    /// process liveness (used for the long-running prompt call). The main
    /// response is returned only after every side-request emitted during the
    /// call has received its own response, regardless of wire arrival order.
    ///
    /// # Errors
    /// Returns a transport error on timeout, pipe closure or process exit,
    /// and a protocol error on side-request id collisions
    pub async fn request_with_hooks(
        &mut self,
        envelope: RequestEnvelope,
        timeout: Option<Duration>,
        hooks: &mut RequestHooks,
    ) -> Result<WireResponse> {
        self.ensure_started().await?;

        log::debug!("-> {} id={}", envelope.method, envelope.request_id);
        let line = envelope.to_line()?;
        self.transport.write(&line).await?;

        let mut scope = RequestScope::new(envelope.request_id.clone());
        let deadline = timeout.map(|d| Instant::now() + d);

        loop {
            let value = self.next_message(&scope, deadline).await?;

            let Some(message) = WireMessage::classify(value) else {
                log::warn!("protocol anomaly: unclassifiable wire message skipped");
                continue;
            };

            match message {
                WireMessage::Notification(notification) => {
                    self.handle_notification(notification, &mut scope, hooks)
                        .await?;
                }
                WireMessage::Response(response) => {
                    if let Some(main) = Self::route_response(response, &mut scope, hooks) {
                        return Ok(main);
                    }
                }
            }
        }
    }

    /// Forward a notification to the sink, then let the handler synthesize
    /// and send side-requests
    async fn handle_notification(
        &mut self,
        notification: WireNotification,
        scope: &mut RequestScope,
        hooks: &mut RequestHooks,
    ) -> Result<()> {
        if let Some(sink) = hooks.notification_sink.as_mut() {
            sink(&notification);
        }

        let Some(handler) = hooks.notification_handler.as_mut() else {
            return Ok(());
        };

        for side in handler(notification).await? {
            let id = side.request_id.clone();
            if id == scope.request_id
                || scope.pending_side_ids.contains(&id)
                || scope.consumed_ids.contains(&id)
            {
                return Err(AcpError::protocol(
                    ProtocolErrorKind::UnexpectedResponseId,
                    format!("side-request id {id} collides with an id already in flight"),
                ));
            }
            log::debug!("-> side {} id={id}", side.method);
            let line = side.to_line()?;
            self.transport.write(&line).await?;
            scope.pending_side_ids.insert(id);
        }

        Ok(())
    }

    /// Route one response within the call scope
    ///
    /// Returns the main response once it can be released to the caller.
    fn route_response(
        response: WireResponse,
        scope: &mut RequestScope,
        hooks: &mut RequestHooks,
    ) -> Option<WireResponse> {
        let id = response.id.clone();

        if id == scope.request_id {
            if scope.consumed_ids.contains(&id) || scope.stashed_main.is_some() {
                log::warn!("protocol anomaly: duplicate main response id={id} ignored");
                return None;
            }
            if scope.pending_side_ids.is_empty() {
                scope.consumed_ids.insert(id);
                return Some(response);
            }
            // Side replies still outstanding; hold the main response.
            scope.stashed_main = Some(response);
            return None;
        }

        if scope.pending_side_ids.remove(&id) {
            log::debug!("<- side response id={id}");
            scope.consumed_ids.insert(id);
            if let Some(sink) = hooks.side_response_sink.as_mut() {
                sink(response);
            }
            if scope.pending_side_ids.is_empty() {
                if let Some(main) = scope.stashed_main.take() {
                    scope.consumed_ids.insert(main.id.clone());
                    return Some(main);
                }
            }
            return None;
        }

        if scope.consumed_ids.contains(&id) {
            log::warn!("protocol anomaly: duplicate response id={id} ignored");
        } else {
            log::warn!("protocol anomaly: unrecognized response id={id} ignored");
        }
        None
    }

    /// Wait for the next incoming value, honoring deadline and liveness
    async fn next_message(
        &mut self,
        scope: &RequestScope,
        deadline: Option<Instant>,
    ) -> Result<serde_json::Value> {
        let incoming = self
            .incoming
            .as_mut()
            .expect("ensure_started establishes the incoming queue");

        loop {
            let received = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(AcpError::timeout(format!(
                            "deadline expired waiting for response to {}",
                            scope.request_id
                        )));
                    }
                    match tokio::time::timeout(deadline - now, incoming.recv()).await {
                        Ok(received) => received,
                        Err(_) => {
                            return Err(AcpError::timeout(format!(
                                "deadline expired waiting for response to {}",
                                scope.request_id
                            )));
                        }
                    }
                }
                None => {
                    match tokio::time::timeout(LIVENESS_CHECK_INTERVAL, incoming.recv()).await {
                        Ok(received) => received,
                        Err(_) => {
                            if self.transport.is_ready() {
                                continue;
                            }
                            return Err(AcpError::process_exit(
                                format!(
                                    "provider process died while waiting for response to {}",
                                    scope.request_id
                                ),
                                self.transport.stderr_tail(),
                            ));
                        }
                    }
                }
            };

            return match received {
                Some(Ok(value)) => Ok(value),
                Some(Err(e)) => Err(match e {
                    AcpError::Io(io) => AcpError::pipe_closed(
                        format!("read failed while waiting for {}: {io}", scope.request_id),
                        self.transport.stderr_tail(),
                    ),
                    other => other,
                }),
                None => {
                    if self.transport.is_ready() {
                        Err(AcpError::pipe_closed(
                            format!(
                                "stdout closed while waiting for response to {}",
                                scope.request_id
                            ),
                            self.transport.stderr_tail(),
                        ))
                    } else {
                        Err(AcpError::process_exit(
                            format!(
                                "provider exited while waiting for response to {}",
                                scope.request_id
                            ),
                            self.transport.stderr_tail(),
                        ))
                    }
                }
            };
        }
    }
}
