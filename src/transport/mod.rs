//! Transport layer.
//!
//! The connection manager never touches sockets. It asks a [`Transport`]
//! for a [`Link`] and then talks to that link through two channels.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐   LinkCommand    ┌──────────────────┐
//! │  ConnectionManager   │ ───────────────► │  Transport task  │ ◄──► remote
//! │  (driver task)       │ ◄─────────────── │  (per link)      │
//! └──────────────────────┘  TransportEvent  └──────────────────┘
//! ```
//!
//! A successful [`Transport::connect`] is the "opened" signal. After that
//! the link reports inbound frames, faults and teardown confirmation, in
//! the order they happened.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `websocket` | WebSocket transport backed by tokio-tungstenite |
//! | `loopback` | Scripted in-memory transport for tests and benchmarks |

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::protocol::{InboundFrame, OutboundFrame};

// ============================================================================
// Submodules
// ============================================================================

/// Scripted in-memory transport.
pub mod loopback;

/// WebSocket transport.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use loopback::{ConnectBehavior, LoopbackTransport};
pub use websocket::WebSocketTransport;

// ============================================================================
// Link Types
// ============================================================================

/// Instruction from the connection manager to a live link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCommand {
    /// Write one frame.
    Frame(OutboundFrame),
    /// Begin graceful teardown.
    Close,
}

/// Notification from a live link to the connection manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A frame arrived.
    Message(InboundFrame),
    /// The link failed and will deliver nothing further.
    Error(String),
    /// Teardown completed, either confirming a `Close` or initiated by the peer.
    Closed,
}

/// One connection instance handed out by a [`Transport`].
///
/// Dropping the command sender asks the transport to tear the link down.
#[derive(Debug)]
pub struct Link {
    /// Outbound commands; sending never waits on the network.
    pub commands: mpsc::UnboundedSender<LinkCommand>,
    /// Inbound events in arrival order.
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

// ============================================================================
// Transport
// ============================================================================

/// Something that can establish links to an [`Endpoint`].
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Performs the handshake and returns a live link.
    ///
    /// The caller applies its own timeout.
    async fn connect(&self, endpoint: &Endpoint) -> Result<Link>;
}
