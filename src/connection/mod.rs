//! Connection lifecycle.
//!
//! # Lifecycle
//!
//! ```text
//!           open()             handshake ok
//!   Idle ──────────► Connecting ───────────► Open ──┐ inbound frame
//!                     │     ▲                 │ ▲   │
//!    handshake failed │     │ reconnect       │ └───┘
//!    or timeout       ▼     │                 │
//!                     Failed ◄───── fault ────┤
//!                                             │ close() / send failure / peer close
//!                                             ▼
//!                                          Closing ──► Closed
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `state` | Pure state machine |
//! | `manager` | Thread-safe manager and driver task |

// ============================================================================
// Submodules
// ============================================================================

/// Thread-safe manager and driver task.
pub mod manager;

/// Pure state machine.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use manager::ConnectionManager;
pub use state::{ConnectionState, Effect, Trigger};
