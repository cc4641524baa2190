//! Line-oriented output sink.

// ============================================================================
// Imports
// ============================================================================

use std::fmt::Display;
use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

// ============================================================================
// Constants
// ============================================================================

/// Prefix that marks a lifecycle diagnostic.
pub const DIAGNOSTIC_PREFIX: &str = "* ";

// ============================================================================
// OutputSink
// ============================================================================

/// Shared writer that emits one complete line per call.
///
/// Cloning is cheap; clones write to the same underlying stream.
#[derive(Clone)]
pub struct OutputSink {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl OutputSink {
    /// Wraps a writer.
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Writes a message payload verbatim as one line.
    pub fn message(&self, payload: &str) {
        self.write_line(format_args!("{payload}"));
    }

    /// Writes a lifecycle diagnostic.
    pub fn diagnostic(&self, text: impl Display) {
        self.write_line(format_args!("{DIAGNOSTIC_PREFIX}{text}"));
    }

    fn write_line(&self, line: std::fmt::Arguments<'_>) {
        let mut writer = self.writer.lock();
        let result = writer
            .write_fmt(format_args!("{line}\n"))
            .and_then(|()| writer.flush());

        if let Err(e) = result {
            warn!(error = %e, "Failed to write output");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
