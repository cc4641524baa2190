//! Reconnect policy and backoff calculation.
//!
//! Reconnection is disabled by default (`max_attempts == 0`). When enabled,
//! attempt `n` (zero-based) waits `min(base_delay * multiplier^n, max_delay)`
//! before connecting again.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default base delay before the first reconnect.
pub const DEFAULT_BASE_DELAY_MS: u64 = 500;

/// Default growth factor between attempts.
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

/// Default cap on a single delay.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

// ============================================================================
// ReconnectPolicy
// ============================================================================

/// Exponential backoff reconnect policy.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconnectPolicy {
    /// Maximum reconnect attempts after a failure (0 disables reconnects).
    pub max_attempts: u32,

    /// Delay before the first reconnect, in milliseconds.
    pub base_delay_ms: u64,

    /// Factor applied to the delay after each attempt.
    pub multiplier: f64,

    /// Upper bound on a single delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ReconnectPolicy {
    /// Creates a policy that never reconnects.
    #[inline]
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            max_attempts: 0,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            multiplier: DEFAULT_MULTIPLIER,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }

    /// Creates a policy with `max_attempts` reconnects and default backoff.
    #[inline]
    #[must_use]
    pub const fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::disabled()
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ReconnectPolicy {
    /// Sets the base delay.
    #[inline]
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Sets the backoff multiplier.
    #[inline]
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the delay cap.
    #[inline]
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay_ms = delay.as_millis() as u64;
        self
    }
}

// ============================================================================
// Queries
// ============================================================================

impl ReconnectPolicy {
    /// Returns `true` if at least one reconnect is allowed.
    #[inline]
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.max_attempts > 0
    }

    /// Returns the delay before zero-based reconnect `attempt`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let delay = (self.base_delay_ms as f64 * factor).min(self.max_delay_ms as f64);
        Duration::from_millis(delay.round() as u64)
    }

    /// Checks the policy for values that cannot produce a sane backoff.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the multiplier is below 1.0 or not finite,
    /// or if the cap is below the base delay.
    pub fn validate(&self) -> Result<()> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(Error::config(format!(
                "reconnect multiplier must be >= 1.0, got {}",
                self.multiplier
            )));
        }

        if self.max_delay_ms < self.base_delay_ms {
            return Err(Error::config(format!(
                "reconnect max delay ({}ms) is below base delay ({}ms)",
                self.max_delay_ms, self.base_delay_ms
            )));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_by_default() {
        let policy = ReconnectPolicy::default();
        assert!(!policy.is_enabled());
        assert_eq!(policy.max_attempts, 0);
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = ReconnectPolicy::with_attempts(10)
            .with_base_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(1000));

        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(800));
        assert_eq!(policy.delay_for(4), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_millis(1000));
    }

    #[test]
    fn test_validate_rejects_shrinking_multiplier() {
        let policy = ReconnectPolicy::with_attempts(1).with_multiplier(0.5);
        assert!(matches!(policy.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_validate_rejects_cap_below_base() {
        let policy = ReconnectPolicy::with_attempts(1)
            .with_base_delay(Duration::from_secs(5))
            .with_max_delay(Duration::from_secs(1));
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let policy: ReconnectPolicy =
            serde_json::from_str(r#"{"max_attempts": 3}"#).expect("valid json");
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay_ms, DEFAULT_BASE_DELAY_MS);
    }
}
