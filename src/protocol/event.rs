//! Connection events.
//!
//! Events are notifications the connection manager hands to the registered
//! [`EventHandler`] when the lifecycle advances or a frame arrives.
//!
//! # Event Types
//!
//! | Event | Fired on |
//! |-------|----------|
//! | `Opened` | `Connecting → Open` |
//! | `Message` | inbound frame while `Open` or `Closing` |
//! | `Error` | `→ Failed`, and once more when reconnects run out |
//! | `Closed` | `Closing → Closed`, or after a fault tore the connection down |

// ============================================================================
// Imports
// ============================================================================

use crate::error::Error;

use super::frame::InboundFrame;

// ============================================================================
// Types
// ============================================================================

/// Event handler callback type.
///
/// Called from the connection's driver task only, so invocations never
/// overlap.
pub type EventHandler = Box<dyn Fn(&ConnectionEvent) + Send + Sync>;

// ============================================================================
// ConnectionEvent
// ============================================================================

/// A lifecycle or message notification from the connection manager.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// Handshake succeeded.
    Opened,

    /// A frame arrived from the remote peer.
    Message(InboundFrame),

    /// The connection failed.
    Error {
        /// What went wrong.
        error: Error,
        /// `true` if a reconnect attempt is scheduled.
        will_retry: bool,
    },

    /// The connection has been torn down.
    Closed,
}

impl ConnectionEvent {
    /// Returns the event name for logging.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Opened => "opened",
            Self::Message(_) => "message",
            Self::Error { .. } => "error",
            Self::Closed => "closed",
        }
    }

    /// Returns `true` if no further events follow this one.
    ///
    /// A terminal error means the connection failed for good; a later
    /// `Closed` may still report the transport teardown.
    #[inline]
    #[must_use]
    pub const fn is_terminal_error(&self) -> bool {
        matches!(self, Self::Error { will_retry: false, .. })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(ConnectionEvent::Opened.name(), "opened");
        assert_eq!(ConnectionEvent::Message(InboundFrame::new("x")).name(), "message");
        assert_eq!(ConnectionEvent::Closed.name(), "closed");
    }

    #[test]
    fn test_terminal_error() {
        let retrying = ConnectionEvent::Error {
            error: Error::connect("refused"),
            will_retry: true,
        };
        let final_error = ConnectionEvent::Error {
            error: Error::ReconnectExhausted { attempts: 2 },
            will_retry: false,
        };

        assert!(!retrying.is_terminal_error());
        assert!(final_error.is_terminal_error());
        assert!(!ConnectionEvent::Closed.is_terminal_error());
    }
}
