//! Session configuration.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `options` | Timeouts, buffer sizes and file loading |
//! | `reconnect` | Reconnect policy with exponential backoff |

// ============================================================================
// Submodules
// ============================================================================

/// Timeouts, buffer sizes and file loading.
pub mod options;

/// Reconnect policy with exponential backoff.
pub mod reconnect;

// ============================================================================
// Re-exports
// ============================================================================

pub use options::SessionConfig;
pub use reconnect::ReconnectPolicy;
