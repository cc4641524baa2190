//! Scripted in-memory transport.
//!
//! [`LoopbackTransport`] stands in for a network peer. Each connect attempt
//! consumes the next [`ConnectBehavior`] from a script (falling back to a
//! default once the script is empty), and accepted links can echo frames,
//! confirm or ignore teardown, and have events injected from outside.
//!
//! The transport is `Clone`; clones share state, so a test can keep one
//! handle while the connection manager owns another.
//!
//! # Example
//!
//! ```ignore
//! let transport = LoopbackTransport::echo();
//! let manager = ConnectionManager::new(transport.clone(), SessionConfig::new());
//! // ...
//! transport.disconnect("connection reset by peer");
//! assert_eq!(transport.connect_count(), 1);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::future;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::protocol::{InboundFrame, OutboundFrame};

use super::{Link, LinkCommand, Transport, TransportEvent};

// ============================================================================
// ConnectBehavior
// ============================================================================

/// Outcome of one connect attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectBehavior {
    /// Handshake succeeds.
    Accept,
    /// Handshake fails with the given reason.
    Refuse(String),
    /// Endpoint is rejected outright; retrying cannot help.
    Reject(String),
    /// Handshake never completes.
    Hang,
}

// ============================================================================
// LoopbackState
// ============================================================================

#[derive(Debug)]
struct LoopbackState {
    script: VecDeque<ConnectBehavior>,
    fallback: ConnectBehavior,
    echo: bool,
    confirm_close: bool,
    connects: u32,
    written: Vec<OutboundFrame>,
    /// Event sender of the most recent link.
    peer: Option<mpsc::UnboundedSender<TransportEvent>>,
    /// Writer task of the most recent link.
    writer: Option<AbortHandle>,
}

impl Default for LoopbackState {
    fn default() -> Self {
        Self {
            script: VecDeque::new(),
            fallback: ConnectBehavior::Accept,
            echo: false,
            confirm_close: true,
            connects: 0,
            written: Vec::new(),
            peer: None,
            writer: None,
        }
    }
}

// ============================================================================
// LoopbackTransport
// ============================================================================

/// In-memory transport with scripted connect outcomes.
#[derive(Debug, Clone, Default)]
pub struct LoopbackTransport {
    state: Arc<Mutex<LoopbackState>>,
}

// ============================================================================
// LoopbackTransport - Constructors
// ============================================================================

impl LoopbackTransport {
    /// Creates a transport that accepts every connect and echoes nothing.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport that accepts every connect and echoes each frame.
    #[must_use]
    pub fn echo() -> Self {
        let transport = Self::new();
        transport.state.lock().echo = true;
        transport
    }

    /// Creates a transport that refuses every connect.
    #[must_use]
    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self::new().with_fallback(ConnectBehavior::Refuse(reason.into()))
    }
}

// ============================================================================
// LoopbackTransport - Builder Methods
// ============================================================================

impl LoopbackTransport {
    /// Queues behaviors for the next connect attempts, in order.
    #[must_use]
    pub fn with_script(self, behaviors: impl IntoIterator<Item = ConnectBehavior>) -> Self {
        self.state.lock().script.extend(behaviors);
        self
    }

    /// Sets the behavior used once the script is exhausted.
    #[must_use]
    pub fn with_fallback(self, behavior: ConnectBehavior) -> Self {
        self.state.lock().fallback = behavior;
        self
    }

    /// Makes links ignore `Close` so teardown is never confirmed.
    #[must_use]
    pub fn without_close_confirmation(self) -> Self {
        self.state.lock().confirm_close = false;
        self
    }
}

// ============================================================================
// LoopbackTransport - Inspection and Injection
// ============================================================================

impl LoopbackTransport {
    /// Returns how many connect attempts were made.
    #[inline]
    #[must_use]
    pub fn connect_count(&self) -> u32 {
        self.state.lock().connects
    }

    /// Returns every frame written so far, across all links.
    #[must_use]
    pub fn written(&self) -> Vec<OutboundFrame> {
        self.state.lock().written.clone()
    }

    /// Delivers an event on the current link.
    ///
    /// Returns `false` if there is no live link.
    pub fn inject(&self, event: TransportEvent) -> bool {
        self.state
            .lock()
            .peer
            .as_ref()
            .is_some_and(|peer| peer.send(event).is_ok())
    }

    /// Delivers a text frame on the current link.
    pub fn push_message(&self, payload: impl Into<String>) -> bool {
        self.inject(TransportEvent::Message(InboundFrame::new(payload)))
    }

    /// Aborts the current link with a fault, as on a connection reset.
    pub fn disconnect(&self, reason: impl Into<String>) -> bool {
        let mut state = self.state.lock();
        let delivered = state
            .peer
            .take()
            .is_some_and(|peer| peer.send(TransportEvent::Error(reason.into())).is_ok());

        if let Some(writer) = state.writer.take() {
            writer.abort();
        }

        delivered
    }

    /// Kills the writer of the current link while keeping it readable.
    ///
    /// Subsequent writes fail, and teardown is never confirmed.
    pub fn break_writer(&self) {
        if let Some(writer) = self.state.lock().writer.take() {
            writer.abort();
        }
    }
}

// ============================================================================
// Transport Implementation
// ============================================================================

#[async_trait]
impl Transport for LoopbackTransport {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Link> {
        let behavior = {
            let mut state = self.state.lock();
            state.connects += 1;
            let fallback = state.fallback.clone();
            state.script.pop_front().unwrap_or(fallback)
        };

        debug!(url = %endpoint, ?behavior, "Loopback connect");

        match behavior {
            ConnectBehavior::Accept => Ok(self.accept()),
            ConnectBehavior::Refuse(reason) => Err(Error::connect(reason)),
            ConnectBehavior::Reject(reason) => {
                Err(Error::invalid_endpoint(endpoint.as_str(), reason))
            }
            ConnectBehavior::Hang => future::pending().await,
        }
    }
}

impl LoopbackTransport {
    fn accept(&self) -> Link {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let writer = tokio::spawn(run_peer(Arc::clone(&self.state), command_rx, event_tx.clone()));

        let mut state = self.state.lock();
        state.peer = Some(event_tx);
        state.writer = Some(writer.abort_handle());

        Link {
            commands: command_tx,
            events: event_rx,
        }
    }
}

/// Plays the remote peer for one link.
async fn run_peer(
    state: Arc<Mutex<LoopbackState>>,
    mut command_rx: mpsc::UnboundedReceiver<LinkCommand>,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
) {
    while let Some(command) = command_rx.recv().await {
        match command {
            LinkCommand::Frame(frame) => {
                let echo = {
                    let mut state = state.lock();
                    state.written.push(frame.clone());
                    state.echo
                };

                if echo {
                    let _ = event_tx.send(TransportEvent::Message(InboundFrame::new(
                        frame.into_inner(),
                    )));
                }
            }

            LinkCommand::Close => {
                let mut state = state.lock();
                if state.confirm_close {
                    let _ = event_tx.send(TransportEvent::Closed);
                    state.peer = None;
                }
                return;
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Endpoint {
        Endpoint::parse("ws://loopback.test/").expect("valid url")
    }

    #[tokio::test]
    async fn test_script_then_fallback() {
        let transport = LoopbackTransport::new()
            .with_script([ConnectBehavior::Refuse("first".into())])
            .with_fallback(ConnectBehavior::Accept);

        assert!(matches!(
            transport.connect(&endpoint()).await,
            Err(Error::Connect { .. })
        ));
        assert!(transport.connect(&endpoint()).await.is_ok());
        assert_eq!(transport.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_echo_and_confirmed_close() {
        let transport = LoopbackTransport::echo();
        let mut link = transport.connect(&endpoint()).await.expect("accepts");

        link.commands
            .send(LinkCommand::Frame(OutboundFrame::new("ping")))
            .expect("link alive");
        link.commands.send(LinkCommand::Close).expect("link alive");

        assert_eq!(
            link.events.recv().await,
            Some(TransportEvent::Message(InboundFrame::new("ping")))
        );
        assert_eq!(link.events.recv().await, Some(TransportEvent::Closed));
        assert_eq!(link.events.recv().await, None);
        assert_eq!(transport.written(), vec![OutboundFrame::new("ping")]);
    }

    #[tokio::test]
    async fn test_disconnect_delivers_fault() {
        let transport = LoopbackTransport::new();
        let mut link = transport.connect(&endpoint()).await.expect("accepts");

        assert!(transport.disconnect("reset"));
        assert_eq!(
            link.events.recv().await,
            Some(TransportEvent::Error("reset".into()))
        );
        assert!(!transport.push_message("late"));
    }
}
