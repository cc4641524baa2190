//! Frame payload types.
//!
//! Payloads are opaque text. No encoding or framing is applied beyond what
//! the transport does to carry one frame.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// OutboundFrame
// ============================================================================

/// One user-submitted line on its way to the remote peer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutboundFrame(String);

impl OutboundFrame {
    /// Creates a frame from its payload.
    #[inline]
    #[must_use]
    pub fn new(payload: impl Into<String>) -> Self {
        Self(payload.into())
    }

    /// Returns the payload.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the frame and returns the payload.
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<String> for OutboundFrame {
    fn from(payload: String) -> Self {
        Self(payload)
    }
}

impl From<&str> for OutboundFrame {
    fn from(payload: &str) -> Self {
        Self(payload.to_string())
    }
}

// ============================================================================
// InboundFrame
// ============================================================================

/// One message received from the remote peer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InboundFrame(String);

impl InboundFrame {
    /// Creates a frame from its payload.
    #[inline]
    #[must_use]
    pub fn new(payload: impl Into<String>) -> Self {
        Self(payload.into())
    }

    /// Creates a frame from raw bytes, replacing invalid UTF-8.
    #[inline]
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Returns the payload.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InboundFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
