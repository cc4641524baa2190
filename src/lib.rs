//! wsline - Interactive line-oriented WebSocket sessions.
//!
//! This library connects a line source (usually a terminal) to a persistent,
//! message-oriented connection. Every input line is sent as one text frame;
//! every received frame is printed as one line.
//!
//! # Architecture
//!
//! The session follows a two-activity model:
//!
//! - **Input thread**: Blocking line reads, forwarded over a bounded channel
//! - **Driver task**: Owns the transport link, dispatches connection events
//!
//! Key design principles:
//!
//! - Each [`Session`] owns exactly one [`ConnectionManager`] (no globals)
//! - Connection state only changes through one explicit transition table
//! - Events reach a single handler, one at a time, in transport order
//! - `send()` never waits on the network and never panics
//!
//! # Quick Start
//!
//! ```no_run
//! use wsline::{Endpoint, Result, Session, SessionConfig, WebSocketTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let endpoint = Endpoint::parse("ws://127.0.0.1:9000/echo")?;
//!     let config = SessionConfig::new();
//!
//!     // Reads stdin, writes stdout
//!     let session = Session::stdio(WebSocketTransport::new(), config);
//!     let outcome = session.run(endpoint).await;
//!
//!     println!("session ended: {outcome}");
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Session configuration and reconnect policy |
//! | [`connection`] | Connection state machine and [`ConnectionManager`] |
//! | [`endpoint`] | Endpoint URL parsing |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Frames and connection events |
//! | [`session`] | Line session loop, input and output |
//! | [`transport`] | Transport trait, WebSocket and loopback transports |
//!
//! # Features
//!
//! - **tls**: `wss://` endpoints through `native-tls`

// ============================================================================
// Modules
// ============================================================================

/// Session configuration.
///
/// Timeouts, input buffering and the reconnect policy. Loadable from JSON.
pub mod config;

/// Connection lifecycle.
///
/// The pure [`ConnectionState`] machine and the thread-safe
/// [`ConnectionManager`] that drives it.
pub mod connection;

/// Endpoint URL parsing and validation.
pub mod endpoint;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Frame and event types.
pub mod protocol;

/// Interactive line session.
///
/// Use [`Session::stdio()`] for a terminal session.
pub mod session;

/// Transport layer.
///
/// The [`Transport`] seam plus WebSocket and in-memory implementations.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Configuration types
pub use config::{ReconnectPolicy, SessionConfig};

// Connection types
pub use connection::{ConnectionManager, ConnectionState};

// Endpoint types
pub use endpoint::{Endpoint, Scheme};

// Error types
pub use error::{Error, Result, SendError};

// Identifier types
pub use identifiers::SessionId;

// Protocol types
pub use protocol::{ConnectionEvent, EventHandler, InboundFrame, OutboundFrame};

// Session types
pub use session::{OutputSink, Session, SessionOutcome};

// Transport types
pub use transport::{
    ConnectBehavior, Link, LinkCommand, LoopbackTransport, Transport, TransportEvent,
    WebSocketTransport,
};
