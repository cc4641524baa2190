//! Connection manager and driver task.
//!
//! The manager owns one logical connection. Callers use [`open`], [`send`]
//! and [`close`] from any thread; a driver task spawned by [`open`] owns the
//! transport link and is the only place events are handed to the
//! [`EventHandler`].
//!
//! # Serialization
//!
//! All state lives behind one `parking_lot::Mutex` and only changes through
//! [`ConnectionState::apply`]. `send()` holds the lock while it checks the
//! state and enqueues the frame, so it either fully succeeds against `Open`
//! or fails without writing. Handler invocations happen on the driver task
//! after the lock is released, one at a time, in transport order.
//!
//! [`open`]: ConnectionManager::open
//! [`send`]: ConnectionManager::send
//! [`close`]: ConnectionManager::close

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc, watch};
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, trace, warn};

use crate::config::SessionConfig;
use crate::endpoint::Endpoint;
use crate::error::{Error, Result, SendError};
use crate::protocol::{ConnectionEvent, EventHandler, InboundFrame, OutboundFrame};
use crate::transport::{Link, LinkCommand, Transport, TransportEvent};

use super::state::{ConnectionState, Effect, Trigger};

// ============================================================================
// Shared
// ============================================================================

/// Mutable connection state guarded by the manager lock.
#[derive(Debug, Default)]
struct Inner {
    state: ConnectionState,
    /// Writer side of the current link, present only while it may be used.
    commands: Option<mpsc::UnboundedSender<LinkCommand>>,
    /// Set by `close()`; stops any further reconnect.
    shutdown: bool,
}

/// State shared between the manager handle and its driver task.
struct Shared {
    inner: Mutex<Inner>,
    state_tx: watch::Sender<ConnectionState>,
    finished_tx: watch::Sender<bool>,
    shutdown_notify: Notify,
}

impl Shared {
    fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            state_tx: watch::Sender::new(ConnectionState::Idle),
            finished_tx: watch::Sender::new(true),
            shutdown_notify: Notify::new(),
        }
    }

    /// Applies a trigger under the lock.
    ///
    /// On rejection the state is unchanged and returned as the error.
    fn transition(&self, trigger: Trigger) -> StdResult<Effect, ConnectionState> {
        let mut inner = self.inner.lock();
        self.transition_locked(&mut inner, trigger)
    }

    fn transition_locked(
        &self,
        inner: &mut Inner,
        trigger: Trigger,
    ) -> StdResult<Effect, ConnectionState> {
        let Some((next, effect)) = inner.state.apply(&trigger) else {
            trace!(state = %inner.state, ?trigger, "Transition rejected");
            return Err(inner.state.clone());
        };

        if next != inner.state {
            debug!(from = %inner.state, to = %next, ?trigger, "State transition");
            self.state_tx.send_replace(next.clone());
        }

        if next.is_terminal() || next == ConnectionState::Closing {
            inner.commands = None;
        }

        inner.state = next;
        Ok(effect)
    }

    /// Moves `Connecting → Open` and installs the link writer atomically.
    ///
    /// Returns `false` if the connection left `Connecting` in the meantime.
    fn install_link(&self, commands: &mpsc::UnboundedSender<LinkCommand>) -> bool {
        let mut inner = self.inner.lock();
        match self.transition_locked(&mut inner, Trigger::HandshakeSucceeded) {
            Ok(_) => {
                inner.commands = Some(commands.clone());
                true
            }
            Err(_) => false,
        }
    }

    /// Moves `Failed → Connecting` unless `close()` has been called.
    ///
    /// The shutdown check and the transition share one lock, so a `close()`
    /// racing the end of a backoff either cancels the reconnect or observes
    /// `Connecting` and cancels the connect.
    fn begin_reconnect(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.shutdown {
            return false;
        }
        self.transition_locked(&mut inner, Trigger::Reconnect).is_ok()
    }

    fn state(&self) -> ConnectionState {
        self.inner.lock().state.clone()
    }

    fn is_shutdown(&self) -> bool {
        self.inner.lock().shutdown
    }
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// Lifecycle owner for one connection to one endpoint.
///
/// # Thread Safety
///
/// `ConnectionManager` is `Send + Sync`. `send()` and `close()` never wait
/// on the network and may be called from any thread; `open()` must be
/// called from within a tokio runtime.
pub struct ConnectionManager {
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    config: SessionConfig,
}

impl ConnectionManager {
    /// Creates an idle manager.
    pub fn new(transport: impl Transport, config: SessionConfig) -> Self {
        Self {
            shared: Arc::new(Shared::new()),
            transport: Arc::new(transport),
            config,
        }
    }

    /// Starts connecting to `endpoint` and registers `handler`.
    ///
    /// Returns as soon as the attempt has been started; the outcome arrives
    /// as an `Opened` or `Error` event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless the manager is `Idle`. The
    /// call then has no effect.
    pub fn open(&self, endpoint: Endpoint, handler: EventHandler) -> Result<()> {
        if let Err(state) = self.shared.transition(Trigger::Open) {
            warn!(%state, "open() rejected");
            return Err(Error::invalid_state("open", state));
        }

        self.shared.finished_tx.send_replace(false);
        info!(url = %endpoint, "Connecting");

        let driver = Driver {
            shared: Arc::clone(&self.shared),
            transport: Arc::clone(&self.transport),
            config: self.config.clone(),
            endpoint,
            handler,
        };

        tokio::spawn(driver.run());

        Ok(())
    }

    /// Queues one frame for transmission.
    ///
    /// Never waits on the network: the frame is handed to the link writer
    /// and any later write failure is reported as an `Error` event.
    ///
    /// # Errors
    ///
    /// - [`SendError::NotOpen`] if the connection is not `Open`; nothing is written
    /// - [`SendError::TransportFailure`] if the link writer is gone; the
    ///   connection moves to `Closing`
    pub fn send(&self, frame: OutboundFrame) -> StdResult<(), SendError> {
        let mut inner = self.shared.inner.lock();

        if !inner.state.is_open() {
            trace!(state = %inner.state, "send() while not open");
            return Err(SendError::NotOpen);
        }

        let Some(commands) = inner.commands.as_ref() else {
            return Err(SendError::NotOpen);
        };

        if commands.send(LinkCommand::Frame(frame)).is_err() {
            warn!("Link writer gone, closing connection");
            let _ = self.shared.transition_locked(&mut inner, Trigger::SendFailed);
            return Err(SendError::TransportFailure);
        }

        Ok(())
    }

    /// Begins graceful teardown.
    ///
    /// Idempotent. From `Open` or `Connecting` the connection moves to
    /// `Closing` and `Closed` follows once the transport confirms, or after
    /// the grace period. From `Failed` no state changes, but any pending
    /// reconnect is cancelled. Otherwise this is a no-op.
    pub fn close(&self) {
        let mut inner = self.shared.inner.lock();
        let state = inner.state.clone();

        match state {
            ConnectionState::Open | ConnectionState::Connecting => {
                inner.shutdown = true;
                let commands = inner.commands.take();
                if self
                    .shared
                    .transition_locked(&mut inner, Trigger::CloseRequested)
                    .is_ok()
                {
                    info!("Closing connection");
                    if let Some(commands) = commands {
                        let _ = commands.send(LinkCommand::Close);
                    }
                }
            }

            ConnectionState::Failed(_) => {
                inner.shutdown = true;
                debug!("close() while failed, cancelling reconnects");
                self.shared.shutdown_notify.notify_one();
            }

            _ => trace!(%state, "close() is a no-op"),
        }
    }

    /// Returns a snapshot of the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Returns `true` once the driver task has stopped, or if it never ran.
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        *self.shared.finished_tx.borrow()
    }

    /// Waits until the driver task has stopped.
    ///
    /// Completes immediately if the manager was never opened.
    pub async fn wait_finished(&self) {
        let mut finished_rx = self.shared.finished_tx.subscribe();
        let _ = finished_rx.wait_for(|finished| *finished).await;
    }

    /// Waits while a connect or reconnect is in progress.
    ///
    /// Completes once the state is `Open`, `Closing` or `Closed`, or when
    /// the driver has stopped.
    pub async fn wait_settled(&self) {
        let mut state_rx = self.shared.state_tx.subscribe();
        let mut finished_rx = self.shared.finished_tx.subscribe();

        loop {
            let in_progress = matches!(
                *state_rx.borrow_and_update(),
                ConnectionState::Connecting | ConnectionState::Failed(_)
            );
            if !in_progress || *finished_rx.borrow_and_update() {
                return;
            }

            tokio::select! {
                changed = state_rx.changed() => if changed.is_err() { return },
                changed = finished_rx.changed() => if changed.is_err() { return },
            }
        }
    }

    /// Waits until the state is anything other than `Open`.
    pub async fn wait_not_open(&self) {
        let mut state_rx = self.shared.state_tx.subscribe();
        let _ = state_rx.wait_for(|state| !state.is_open()).await;
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        // The manager is the only handle callers hold; the driver keeps
        // running until teardown completes.
        self.close();
    }
}

// ============================================================================
// Driver
// ============================================================================

/// How a connect attempt ended.
enum ConnectOutcome {
    Linked(Link),
    Failed(Error),
    Cancelled,
}

/// How a link's event pump ended.
enum PumpEnd {
    /// Teardown completed; `Closed` was emitted.
    Closed,
    /// Fault while open; state is `Failed`, no events emitted yet.
    Faulted(Error),
}

/// Owns the transport link and dispatches events.
struct Driver {
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    config: SessionConfig,
    endpoint: Endpoint,
    handler: EventHandler,
}

impl Driver {
    async fn run(self) {
        // Reconnects used since the last successful open
        let mut attempt: u32 = 0;

        loop {
            let link = match self.connect().await {
                ConnectOutcome::Linked(link) => link,

                ConnectOutcome::Cancelled => {
                    self.complete_teardown();
                    break;
                }

                ConnectOutcome::Failed(error) => {
                    warn!(error = %error, attempt, "Connect failed");

                    if self
                        .shared
                        .transition(Trigger::HandshakeFailed(error.to_string()))
                        .is_err()
                    {
                        // close() won the race
                        self.complete_teardown();
                        break;
                    }

                    let will_retry = self.retry_allowed(attempt, &error);
                    self.dispatch(ConnectionEvent::Error { error, will_retry });

                    if self.reconnect(will_retry, &mut attempt).await {
                        continue;
                    }
                    break;
                }
            };

            let Link { commands, events } = link;

            if self.shared.install_link(&commands) {
                info!(url = %self.endpoint, "Connection open");
                attempt = 0;
                self.dispatch(ConnectionEvent::Opened);
            } else {
                // close() arrived during the handshake
                let _ = commands.send(LinkCommand::Close);
            }
            drop(commands);

            match self.pump(events).await {
                PumpEnd::Closed => break,

                PumpEnd::Faulted(error) => {
                    let will_retry = self.retry_allowed(attempt, &error);
                    self.dispatch(ConnectionEvent::Error { error, will_retry });
                    self.dispatch(ConnectionEvent::Closed);

                    if self.reconnect(will_retry, &mut attempt).await {
                        continue;
                    }
                    break;
                }
            }
        }

        self.shared.finished_tx.send_replace(true);
        debug!(state = %self.shared.state(), "Driver terminated");
    }

    /// Runs one connect attempt, bounded by the connect timeout and
    /// cancelled by `close()`.
    async fn connect(&self) -> ConnectOutcome {
        let connect_timeout = self.config.connect_timeout();
        let attempt = timeout(connect_timeout, self.transport.connect(&self.endpoint));

        tokio::select! {
            result = attempt => match result {
                Ok(Ok(link)) => ConnectOutcome::Linked(link),
                Ok(Err(e)) => ConnectOutcome::Failed(e),
                Err(_) => ConnectOutcome::Failed(Error::connect_timeout(
                    connect_timeout.as_millis() as u64,
                )),
            },

            () = wait_for_closing(self.shared.state_tx.subscribe()) => {
                debug!("Connect cancelled by close()");
                ConnectOutcome::Cancelled
            }
        }
    }

    /// Delivers link events until teardown or a fault.
    async fn pump(&self, mut events: mpsc::UnboundedReceiver<TransportEvent>) -> PumpEnd {
        let mut state_rx = self.shared.state_tx.subscribe();
        let grace = sleep(self.config.close_grace());
        tokio::pin!(grace);
        let mut grace_armed = false;

        loop {
            let closing = *state_rx.borrow_and_update() == ConnectionState::Closing;
            if closing && !grace_armed {
                grace
                    .as_mut()
                    .reset(Instant::now() + self.config.close_grace());
                grace_armed = true;
            }

            tokio::select! {
                biased;

                event = events.recv() => match event {
                    Some(TransportEvent::Message(frame)) => self.deliver(frame),

                    Some(TransportEvent::Error(reason)) => {
                        match self.shared.transition(Trigger::TransportFault(reason.clone())) {
                            Ok(Effect::ErrorThenClosed) => {
                                warn!(reason = %reason, "Transport fault");
                                return PumpEnd::Faulted(Error::transport_fault(reason));
                            }
                            Ok(_) => {
                                debug!(reason = %reason, "Transport fault during teardown");
                                self.dispatch(ConnectionEvent::Closed);
                                return PumpEnd::Closed;
                            }
                            Err(state) => {
                                debug!(%state, reason = %reason, "Ignoring transport fault");
                            }
                        }
                    }

                    Some(TransportEvent::Closed) => {
                        if self.shared.transition(Trigger::PeerClosed).is_ok() {
                            info!("Connection closed by peer");
                        }
                        self.complete_teardown();
                        return PumpEnd::Closed;
                    }

                    None => {
                        if self.shared.state().is_open() {
                            let reason = "transport ended unexpectedly".to_string();
                            if self.shared.transition(Trigger::TransportFault(reason.clone())).is_ok() {
                                return PumpEnd::Faulted(Error::transport_fault(reason));
                            }
                        }
                        self.complete_teardown();
                        return PumpEnd::Closed;
                    }
                },

                changed = state_rx.changed(), if !grace_armed => {
                    if changed.is_err() {
                        return PumpEnd::Closed;
                    }
                }

                () = &mut grace, if grace_armed => {
                    warn!(
                        grace_ms = self.config.close_grace_ms,
                        "Teardown not confirmed within grace period, treating as closed"
                    );
                    self.complete_teardown();
                    return PumpEnd::Closed;
                }
            }
        }
    }

    /// Hands an inbound frame to the handler if the state allows it.
    fn deliver(&self, frame: InboundFrame) {
        match self.shared.transition(Trigger::Inbound) {
            Ok(Effect::Message) => self.dispatch(ConnectionEvent::Message(frame)),
            Ok(_) => {}
            Err(state) => trace!(%state, "Dropping inbound frame"),
        }
    }

    /// Moves `Closing → Closed` and emits `Closed`.
    fn complete_teardown(&self) {
        if let Ok(Effect::Closed) = self.shared.transition(Trigger::TeardownComplete) {
            info!("Connection closed");
            self.dispatch(ConnectionEvent::Closed);
        }
    }

    fn retry_allowed(&self, attempt: u32, error: &Error) -> bool {
        let policy = &self.config.reconnect;
        policy.is_enabled()
            && attempt < policy.max_attempts
            && error.is_recoverable()
            && !self.shared.is_shutdown()
    }

    /// Waits out the backoff and moves `Failed → Connecting`.
    ///
    /// Returns `false` if no reconnect will happen.
    async fn reconnect(&self, will_retry: bool, attempt: &mut u32) -> bool {
        let policy = &self.config.reconnect;

        if !will_retry {
            if policy.is_enabled() && *attempt >= policy.max_attempts {
                warn!(attempts = *attempt, "Reconnect attempts exhausted");
                self.dispatch(ConnectionEvent::Error {
                    error: Error::ReconnectExhausted { attempts: *attempt },
                    will_retry: false,
                });
            }
            return false;
        }

        let delay = policy.delay_for(*attempt);
        info!(
            attempt = *attempt + 1,
            max_attempts = policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnect"
        );

        tokio::select! {
            () = sleep(delay) => {}
            () = self.shared.shutdown_notify.notified() => {
                debug!("Reconnect cancelled");
                return false;
            }
        }

        if !self.shared.begin_reconnect() {
            debug!("Reconnect cancelled");
            return false;
        }

        *attempt += 1;
        true
    }

    fn dispatch(&self, event: ConnectionEvent) {
        trace!(event = event.name(), "Dispatching event");
        (self.handler)(&event);
    }
}

/// Completes once the state becomes `Closing`.
async fn wait_for_closing(mut state_rx: watch::Receiver<ConnectionState>) {
    loop {
        if *state_rx.borrow_and_update() == ConnectionState::Closing {
            return;
        }
        if state_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
