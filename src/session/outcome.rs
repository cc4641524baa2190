//! How a session ended.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::process::ExitCode;

// ============================================================================
// SessionOutcome
// ============================================================================

/// Reason a session stopped, mapped to a process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Local input ended and the connection was closed.
    EndOfInput,
    /// The peer closed the connection.
    ClosedByPeer,
    /// A frame could not be handed to the transport.
    SendFailed,
    /// The connection failed and no reconnect remains.
    ConnectionFailed,
    /// Local input could not be read.
    InputFailed,
}

impl SessionOutcome {
    /// Returns the process exit code.
    #[inline]
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::EndOfInput | Self::ClosedByPeer => 0,
            Self::SendFailed | Self::ConnectionFailed | Self::InputFailed => 1,
        }
    }

    /// Returns `true` if the session ended normally.
    #[inline]
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.exit_code() == 0
    }
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::EndOfInput => "end of input",
            Self::ClosedByPeer => "closed by peer",
            Self::SendFailed => "send failed",
            Self::ConnectionFailed => "connection failed",
            Self::InputFailed => "input failed",
        };
        f.write_str(text)
    }
}

impl From<SessionOutcome> for ExitCode {
    fn from(outcome: SessionOutcome) -> Self {
        Self::from(outcome.exit_code())
    }
}

// ============================================================================
// Tests
// ============================================================================
