//! Error types for wsline.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`].
//! The one exception is [`ConnectionManager::send`], which returns the
//! narrower [`SendError`] so the caller can match on it exhaustively:
//!
//! ```ignore
//! use wsline::{OutboundFrame, SendError};
//!
//! match manager.send(OutboundFrame::new("hello")) {
//!     Ok(()) => {}
//!     Err(SendError::NotOpen) => eprintln!("not connected"),
//!     Err(SendError::TransportFailure) => eprintln!("connection lost"),
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Usage | [`Error::InvalidState`], [`Error::InvalidEndpoint`], [`Error::Config`] |
//! | Connection | [`Error::Connect`], [`Error::ConnectTimeout`], [`Error::TransportFault`], [`Error::ReconnectExhausted`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |
//!
//! [`ConnectionManager::send`]: crate::connection::ConnectionManager::send

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::connection::ConnectionState;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Usage Errors
    // ========================================================================
    /// Operation attempted in a state that forbids it.
    ///
    /// This is a programming error and is never retried.
    #[error("Invalid state: cannot {operation} while {state}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// State the connection was in.
        state: ConnectionState,
    },

    /// Endpoint URL could not be parsed or uses an unsupported scheme.
    #[error("Invalid endpoint '{url}': {message}")]
    InvalidEndpoint {
        /// The URL as supplied.
        url: String,
        /// Why it was rejected.
        message: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Handshake failed.
    #[error("Connection failed: {message}")]
    Connect {
        /// Description of the connect failure.
        message: String,
    },

    /// Handshake did not complete in time.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Established connection was lost.
    #[error("Connection lost: {message}")]
    TransportFault {
        /// Description of the fault.
        message: String,
    },

    /// Every configured reconnect attempt failed.
    #[error("Giving up after {attempts} reconnect attempts")]
    ReconnectExhausted {
        /// Number of reconnect attempts made.
        attempts: u32,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// SendError
// ============================================================================

/// Failure of [`ConnectionManager::send`](crate::connection::ConnectionManager::send).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// Connection is not open; nothing was written.
    #[error("connection is not open")]
    NotOpen,

    /// Transport writer is gone; the connection is being torn down.
    #[error("transport failed while sending")]
    TransportFailure,
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an invalid state error.
    #[inline]
    pub fn invalid_state(operation: &'static str, state: ConnectionState) -> Self {
        Self::InvalidState { operation, state }
    }

    /// Creates an invalid endpoint error.
    #[inline]
    pub fn invalid_endpoint(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connect error.
    #[inline]
    pub fn connect(message: impl Into<String>) -> Self {
        Self::Connect {
            message: message.into(),
        }
    }

    /// Creates a connect timeout error.
    #[inline]
    pub fn connect_timeout(timeout_ms: u64) -> Self {
        Self::ConnectTimeout { timeout_ms }
    }

    /// Creates a transport fault error.
    #[inline]
    pub fn transport_fault(message: impl Into<String>) -> Self {
        Self::TransportFault {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if a reconnect may succeed after this error.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. }
                | Self::ConnectTimeout { .. }
                | Self::TransportFault { .. }
                | Self::WebSocket(_)
                | Self::Io(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
