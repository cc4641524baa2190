//! Connection lifecycle state machine.
//!
//! [`ConnectionState::apply`] is the only place a state changes. It is a
//! pure function so every transition can be checked in isolation; the
//! connection manager calls it under its lock and performs the returned
//! [`Effect`] afterwards.
//!
//! # Transition Table
//!
//! | From | Trigger | To | Effect |
//! |------|---------|----|--------|
//! | Idle | `Open` | Connecting | - |
//! | Connecting | `HandshakeSucceeded` | Open | `Opened` |
//! | Connecting | `HandshakeFailed` | Failed | `Error` |
//! | Connecting | `CloseRequested` | Closing | - |
//! | Open | `Inbound` | Open | `Message` |
//! | Open | `CloseRequested`, `SendFailed`, `PeerClosed` | Closing | - |
//! | Open | `TransportFault` | Failed | `ErrorThenClosed` |
//! | Closing | `Inbound` | Closing | `Message` |
//! | Closing | `TeardownComplete`, `TransportFault` | Closed | `Closed` |
//! | Failed | `Reconnect` | Connecting | - |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of one logical connection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not started.
    #[default]
    Idle,
    /// Handshake in progress.
    Connecting,
    /// Frames may be sent.
    Open,
    /// Teardown in progress.
    Closing,
    /// Torn down. Terminal.
    Closed,
    /// Failed with a reason. Terminal unless a reconnect is scheduled.
    Failed(String),
}

// ============================================================================
// Trigger
// ============================================================================

/// Input to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// `open()` was called.
    Open,
    /// The transport completed the handshake.
    HandshakeSucceeded,
    /// The handshake failed or timed out.
    HandshakeFailed(String),
    /// An inbound frame arrived.
    Inbound,
    /// `close()` was called.
    CloseRequested,
    /// A write to the transport failed.
    SendFailed,
    /// The transport reported an unrecoverable fault.
    TransportFault(String),
    /// The peer closed the connection.
    PeerClosed,
    /// Teardown was confirmed or the grace period elapsed.
    TeardownComplete,
    /// A scheduled reconnect is starting.
    Reconnect,
}

// ============================================================================
// Effect
// ============================================================================

/// Event the manager must emit after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Nothing to emit.
    None,
    /// Emit `Opened`.
    Opened,
    /// Emit `Message` with the inbound frame.
    Message,
    /// Emit `Error`.
    Error,
    /// Emit `Error`, then `Closed` once the link is dropped.
    ErrorThenClosed,
    /// Emit `Closed`.
    Closed,
}

// ============================================================================
// Transitions
// ============================================================================

impl ConnectionState {
    /// Applies a trigger.
    ///
    /// Returns the next state and the effect to perform, or `None` if the
    /// trigger is not allowed in this state.
    #[must_use]
    pub fn apply(&self, trigger: &Trigger) -> Option<(Self, Effect)> {
        use ConnectionState as S;
        use Trigger as T;

        let next = match (self, trigger) {
            (S::Idle, T::Open) => (S::Connecting, Effect::None),

            (S::Connecting, T::HandshakeSucceeded) => (S::Open, Effect::Opened),
            (S::Connecting, T::HandshakeFailed(reason)) => (S::Failed(reason.clone()), Effect::Error),
            (S::Connecting, T::CloseRequested) => (S::Closing, Effect::None),

            (S::Open, T::Inbound) => (S::Open, Effect::Message),
            (S::Open, T::CloseRequested | T::SendFailed | T::PeerClosed) => {
                (S::Closing, Effect::None)
            }
            (S::Open, T::TransportFault(reason)) => {
                (S::Failed(reason.clone()), Effect::ErrorThenClosed)
            }

            (S::Closing, T::Inbound) => (S::Closing, Effect::Message),
            (S::Closing, T::TeardownComplete | T::TransportFault(_)) => (S::Closed, Effect::Closed),

            (S::Failed(_), T::Reconnect) => (S::Connecting, Effect::None),

            _ => return None,
        };

        Some(next)
    }

    /// Returns `true` for `Closed` and `Failed`.
    #[inline]
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed(_))
    }

    /// Returns `true` if frames may be sent.
    #[inline]
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns the state name without any failure reason.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "failed ({reason})"),
            other => f.write_str(other.name()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    /// Every (from, to) name pair the table allows.
    const ALLOWED: &[(&str, &str)] = &[
        ("idle", "connecting"),
        ("connecting", "open"),
        ("connecting", "failed"),
        ("connecting", "closing"),
        ("open", "open"),
        ("open", "closing"),
        ("open", "failed"),
        ("closing", "closing"),
        ("closing", "closed"),
        ("failed", "connecting"),
    ];

    fn trigger_strategy() -> impl Strategy<Value = Trigger> {
        prop_oneof![
            Just(Trigger::Open),
            Just(Trigger::HandshakeSucceeded),
            "[a-z]{1,8}".prop_map(Trigger::HandshakeFailed),
            Just(Trigger::Inbound),
            Just(Trigger::CloseRequested),
            Just(Trigger::SendFailed),
            "[a-z]{1,8}".prop_map(Trigger::TransportFault),
            Just(Trigger::PeerClosed),
            Just(Trigger::TeardownComplete),
            Just(Trigger::Reconnect),
        ]
    }

    #[test]
    fn test_happy_path() {
        let state = ConnectionState::Idle;
        let (state, effect) = state.apply(&Trigger::Open).expect("idle -> connecting");
        assert_eq!((state.clone(), effect), (ConnectionState::Connecting, Effect::None));

        let (state, effect) = state.apply(&Trigger::HandshakeSucceeded).expect("open");
        assert_eq!(effect, Effect::Opened);

        let (state, effect) = state.apply(&Trigger::Inbound).expect("message");
        assert_eq!((state.clone(), effect), (ConnectionState::Open, Effect::Message));

        let (state, _) = state.apply(&Trigger::CloseRequested).expect("closing");
        let (state, effect) = state.apply(&Trigger::TeardownComplete).expect("closed");
        assert_eq!((state, effect), (ConnectionState::Closed, Effect::Closed));
    }

    #[test]
    fn test_open_only_from_idle() {
        for state in [
            ConnectionState::Connecting,
            ConnectionState::Open,
            ConnectionState::Closing,
            ConnectionState::Closed,
            ConnectionState::Failed("x".into()),
        ] {
            assert!(state.apply(&Trigger::Open).is_none(), "open allowed from {state}");
        }
    }

    #[test]
    fn test_close_request_ignored_in_terminal_states() {
        assert!(ConnectionState::Closed.apply(&Trigger::CloseRequested).is_none());
        assert!(ConnectionState::Idle.apply(&Trigger::CloseRequested).is_none());
        assert!(
            ConnectionState::Failed("x".into())
                .apply(&Trigger::CloseRequested)
                .is_none()
        );
    }

    #[test]
    fn test_fault_while_open_reports_reason() {
        let (state, effect) = ConnectionState::Open
            .apply(&Trigger::TransportFault("reset".into()))
            .expect("fault");
        assert_eq!(state, ConnectionState::Failed("reset".into()));
        assert_eq!(effect, Effect::ErrorThenClosed);
        assert_eq!(state.to_string(), "failed (reset)");
    }

    proptest! {
        #[test]
        fn prop_transitions_follow_table(triggers in prop::collection::vec(trigger_strategy(), 0..64)) {
            let mut state = ConnectionState::Idle;
            let mut opened_since_connect = false;

            for trigger in &triggers {
                let Some((next, effect)) = state.apply(trigger) else {
                    continue;
                };

                prop_assert!(
                    ALLOWED.contains(&(state.name(), next.name())),
                    "unlisted transition {} -> {}", state, next
                );

                match effect {
                    Effect::Opened => {
                        prop_assert!(!opened_since_connect, "opened twice");
                        opened_since_connect = true;
                    }
                    Effect::Message => {
                        prop_assert!(matches!(state, ConnectionState::Open | ConnectionState::Closing));
                    }
                    Effect::Closed => prop_assert_eq!(&next, &ConnectionState::Closed),
                    _ => {}
                }

                if next == ConnectionState::Connecting {
                    opened_since_connect = false;
                }

                state = next;
            }

            if state == ConnectionState::Closed {
                for trigger in &triggers {
                    prop_assert!(state.apply(trigger).is_none());
                }
            }
        }
    }
}
