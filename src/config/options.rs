//! Session options.
//!
//! Provides a type-safe interface for the timeouts and policies of one
//! session. Options can be built in code or loaded from a JSON file.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use wsline::{ReconnectPolicy, SessionConfig};
//!
//! let config = SessionConfig::new()
//!     .with_connect_timeout(Duration::from_secs(5))
//!     .with_reconnect(ReconnectPolicy::with_attempts(3));
//!
//! assert!(config.validate().is_ok());
//! ```
//!
//! # File Format
//!
//! ```json
//! {
//!   "connect_timeout_ms": 5000,
//!   "close_grace_ms": 1000,
//!   "reconnect": { "max_attempts": 3, "base_delay_ms": 250 }
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

use super::reconnect::ReconnectPolicy;

// ============================================================================
// Constants
// ============================================================================

/// Default handshake timeout.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Default wait for the transport to confirm teardown.
pub const DEFAULT_CLOSE_GRACE_MS: u64 = 2_000;

/// Default number of input lines buffered ahead of the connection.
pub const DEFAULT_INPUT_BUFFER: usize = 64;

// ============================================================================
// SessionConfig
// ============================================================================

/// Configuration for one session.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Handshake timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Grace period for teardown confirmation in milliseconds.
    pub close_grace_ms: u64,

    /// Capacity of the channel between the input thread and the session.
    pub input_buffer: usize,

    /// Reconnect policy.
    pub reconnect: ReconnectPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl SessionConfig {
    /// Creates a configuration with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            close_grace_ms: DEFAULT_CLOSE_GRACE_MS,
            input_buffer: DEFAULT_INPUT_BUFFER,
            reconnect: ReconnectPolicy::disabled(),
        }
    }

    /// Loads a configuration from a JSON file.
    ///
    /// Missing fields take their defaults. The result is validated.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the file cannot be read
    /// - [`Error::Json`] if the file is not valid JSON for this type
    /// - [`Error::Config`] if a value is out of range
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;

        debug!(path = %path.display(), "Loaded session config");

        Ok(config)
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl SessionConfig {
    /// Sets the handshake timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Sets the teardown grace period.
    #[inline]
    #[must_use]
    pub fn with_close_grace(mut self, grace: Duration) -> Self {
        self.close_grace_ms = grace.as_millis() as u64;
        self
    }

    /// Sets the input channel capacity.
    #[inline]
    #[must_use]
    pub fn with_input_buffer(mut self, lines: usize) -> Self {
        self.input_buffer = lines;
        self
    }

    /// Sets the reconnect policy.
    #[inline]
    #[must_use]
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl SessionConfig {
    /// Returns the handshake timeout.
    #[inline]
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Returns the teardown grace period.
    #[inline]
    #[must_use]
    pub const fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout_ms == 0 {
            return Err(Error::config("connect timeout must be greater than zero"));
        }
        if self.close_grace_ms == 0 {
            return Err(Error::config("close grace period must be greater than zero"));
        }
        if self.input_buffer == 0 {
            return Err(Error::config("input buffer must hold at least one line"));
        }
        self.reconnect.validate()
    }
}

// ============================================================================
// Tests
// ============================================================================
