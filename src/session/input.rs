//! Blocking line reader on a dedicated thread.
//!
//! The reader runs on a plain OS thread rather than the tokio blocking
//! pool, so a read blocked on a terminal never keeps the runtime alive at
//! shutdown.

// ============================================================================
// Imports
// ============================================================================

use std::io::{self, BufRead};
use std::thread;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

// ============================================================================
// Constants
// ============================================================================

/// Name of the input thread.
const THREAD_NAME: &str = "wsline-input";

// ============================================================================
// Functions
// ============================================================================

/// Starts reading lines from `reader` on a new thread.
///
/// Each line is sent without its terminator (`\n` or `\r\n`); empty lines
/// are kept and invalid UTF-8 is replaced with U+FFFD. The channel closes at
/// end-of-input or when the receiver is dropped. A read error is sent as the
/// last item before the channel closes.
///
/// # Errors
///
/// Returns an error if the thread cannot be spawned.
pub fn spawn_line_reader<R>(
    reader: R,
    capacity: usize,
) -> io::Result<mpsc::Receiver<io::Result<String>>>
where
    R: BufRead + Send + 'static,
{
    let (line_tx, line_rx) = mpsc::channel(capacity.max(1));

    thread::Builder::new()
        .name(THREAD_NAME.to_string())
        .spawn(move || read_lines(reader, &line_tx))?;

    Ok(line_rx)
}

fn read_lines<R: BufRead>(mut reader: R, line_tx: &mpsc::Sender<io::Result<String>>) {
    let mut buffer = Vec::new();

    loop {
        buffer.clear();

        match reader.read_until(b'\n', &mut buffer) {
            Ok(0) => {
                debug!("End of input");
                break;
            }
            Ok(_) => {
                let line = String::from_utf8_lossy(strip_terminator(&buffer)).into_owned();
                trace!(len = line.len(), "Read line");

                if line_tx.blocking_send(Ok(line)).is_err() {
                    debug!("Session stopped reading input");
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                warn!(error = %e, "Failed to read input");
                let _ = line_tx.blocking_send(Err(e));
                break;
            }
        }
    }
}

/// Removes one trailing `\n` and an optional preceding `\r`.
fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

// ============================================================================
// Tests
// ============================================================================
