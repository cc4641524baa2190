//! Frame and event types exchanged across the connection boundary.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `frame` | Opaque inbound/outbound payloads |
//! | `event` | Events delivered to the registered handler |

// ============================================================================
// Submodules
// ============================================================================

/// Events delivered to the registered handler.
pub mod event;

/// Opaque inbound/outbound payloads.
pub mod frame;

// ============================================================================
// Re-exports
// ============================================================================

pub use event::{ConnectionEvent, EventHandler};
pub use frame::{InboundFrame, OutboundFrame};
