//! Interactive line session over one connection.
//!
//! A [`Session`] owns a [`ConnectionManager`], a line source and an
//! [`OutputSink`]. Lines read from the source become outbound frames;
//! inbound frames and lifecycle events are rendered to the sink.
//!
//! # Example
//!
//! ```no_run
//! use wsline::{Endpoint, Session, SessionConfig, WebSocketTransport};
//!
//! # async fn example() -> wsline::Result<()> {
//! let endpoint = Endpoint::parse("ws://127.0.0.1:9000/echo")?;
//! let session = Session::stdio(WebSocketTransport::new(), SessionConfig::new());
//!
//! let outcome = session.run(endpoint).await;
//! println!("exit code {}", outcome.exit_code());
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `input` | Line reader thread |
//! | `output` | Line-oriented output sink |
//! | `outcome` | How a session ended |

// ============================================================================
// Imports
// ============================================================================

use std::io::{self, BufRead, BufReader};
use std::time::Duration;

use tokio::time::timeout;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::config::SessionConfig;
use crate::connection::{ConnectionManager, ConnectionState};
use crate::endpoint::Endpoint;
use crate::error::SendError;
use crate::identifiers::SessionId;
use crate::protocol::{ConnectionEvent, EventHandler, OutboundFrame};
use crate::transport::Transport;

// ============================================================================
// Submodules
// ============================================================================

/// Line reader thread.
pub mod input;

/// How a session ended.
pub mod outcome;

/// Line-oriented output sink.
pub mod output;

// ============================================================================
// Re-exports
// ============================================================================

pub use input::spawn_line_reader;
pub use outcome::SessionOutcome;
pub use output::OutputSink;

// ============================================================================
// Constants
// ============================================================================

/// Extra time allowed on top of the close grace period for the driver to stop.
const FINISH_MARGIN: Duration = Duration::from_millis(500);

// ============================================================================
// Types
// ============================================================================

/// Why the read loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopExit {
    EndOfInput,
    SendFailed,
    InputFailed,
    ConnectionEnded,
}

// ============================================================================
// Session
// ============================================================================

/// One connection plus the loop that feeds it lines.
pub struct Session {
    id: SessionId,
    manager: ConnectionManager,
    config: SessionConfig,
    input: Box<dyn BufRead + Send>,
    output: OutputSink,
}

impl Session {
    /// Creates a session over an arbitrary line source and sink.
    pub fn new(
        transport: impl Transport,
        config: SessionConfig,
        input: impl BufRead + Send + 'static,
        output: OutputSink,
    ) -> Self {
        Self {
            id: SessionId::generate(),
            manager: ConnectionManager::new(transport, config.clone()),
            config,
            input: Box::new(input),
            output,
        }
    }

    /// Creates a session reading stdin and writing stdout.
    pub fn stdio(transport: impl Transport, config: SessionConfig) -> Self {
        Self::new(
            transport,
            config,
            BufReader::new(io::stdin()),
            OutputSink::new(io::stdout()),
        )
    }

    /// Returns the session ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Runs the session to completion.
    ///
    /// Connects to `endpoint`, forwards every input line as one frame and
    /// stops at end-of-input, on an input read error, on a failed send, or
    /// when the connection ends for good. The connection is closed before this returns.
    pub async fn run(self, endpoint: Endpoint) -> SessionOutcome {
        let span = info_span!("session", id = %self.id, url = %endpoint);
        self.run_inner(endpoint).instrument(span).await
    }

    async fn run_inner(self, endpoint: Endpoint) -> SessionOutcome {
        let Self {
            manager,
            config,
            input,
            output,
            ..
        } = self;

        let mut lines = match spawn_line_reader(input, config.input_buffer) {
            Ok(lines) => lines,
            Err(e) => {
                warn!(error = %e, "Failed to start input thread");
                output.diagnostic(format_args!("input unavailable: {e}"));
                return SessionOutcome::InputFailed;
            }
        };

        output.diagnostic(format_args!("connecting to {endpoint}"));
        let handler = render_events(&endpoint, output.clone());

        if let Err(e) = manager.open(endpoint, handler) {
            output.diagnostic(format_args!("error: {e}"));
            return SessionOutcome::ConnectionFailed;
        }

        let exit = 'read: loop {
            manager.wait_settled().await;
            if !manager.state().is_open() {
                break LoopExit::ConnectionEnded;
            }

            let line = tokio::select! {
                line = lines.recv() => line,
                () = manager.wait_not_open() => continue,
            };

            let line = match line {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    output.diagnostic(format_args!("input failed: {e}"));
                    break LoopExit::InputFailed;
                }
                None => {
                    debug!("Input exhausted");
                    break LoopExit::EndOfInput;
                }
            };

            // A reconnect may start between the state check and the send
            loop {
                match manager.send(OutboundFrame::new(line.as_str())) {
                    Ok(()) => break,

                    Err(SendError::NotOpen) => {
                        manager.wait_settled().await;
                        if !manager.state().is_open() {
                            break 'read LoopExit::ConnectionEnded;
                        }
                    }

                    Err(e @ SendError::TransportFailure) => {
                        output.diagnostic(format_args!("send failed: {e}"));
                        break 'read LoopExit::SendFailed;
                    }
                }
            }
        };

        drop(lines);
        manager.close();

        let limit = config.close_grace() + FINISH_MARGIN;
        if timeout(limit, manager.wait_finished()).await.is_err() {
            warn!(
                limit_ms = limit.as_millis() as u64,
                "Connection did not finish in time"
            );
        }

        let outcome = match exit {
            LoopExit::EndOfInput => SessionOutcome::EndOfInput,
            LoopExit::SendFailed => SessionOutcome::SendFailed,
            LoopExit::InputFailed => SessionOutcome::InputFailed,
            LoopExit::ConnectionEnded => match manager.state() {
                ConnectionState::Closing | ConnectionState::Closed => SessionOutcome::ClosedByPeer,
                _ => SessionOutcome::ConnectionFailed,
            },
        };

        if outcome.is_success() {
            info!(%outcome, "Session finished");
        } else {
            warn!(%outcome, "Session failed");
        }
        outcome
    }
}

/// Builds the handler that renders connection events to `output`.
fn render_events(endpoint: &Endpoint, output: OutputSink) -> EventHandler {
    let url = endpoint.to_string();

    Box::new(move |event| match event {
        ConnectionEvent::Opened => output.diagnostic(format_args!("connected to {url}")),

        ConnectionEvent::Message(frame) => output.message(frame.as_str()),

        ConnectionEvent::Error { error, will_retry } => {
            if *will_retry {
                output.diagnostic(format_args!("error: {error} (reconnecting)"));
            } else {
                output.diagnostic(format_args!("error: {error}"));
            }
        }

        ConnectionEvent::Closed => output.diagnostic("connection closed"),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::{Cursor, Read, Write};
    use std::sync::{Arc, mpsc as std_mpsc};

    use parking_lot::Mutex;

    use crate::config::ReconnectPolicy;
    use crate::transport::LoopbackTransport;

    const WAIT: Duration = Duration::from_secs(5);

    /// Writer that appends into a shared buffer.
    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        fn lines(&self) -> Vec<String> {
            String::from_utf8_lossy(&self.0.lock())
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Input that blocks until bytes arrive and ends when the sender drops.
    struct Pipe {
        chunks: std_mpsc::Receiver<Vec<u8>>,
        pending: Vec<u8>,
    }

    impl Pipe {
        fn new() -> (std_mpsc::Sender<Vec<u8>>, BufReader<Self>) {
            let (tx, rx) = std_mpsc::channel();
            let pipe = Self {
                chunks: rx,
                pending: Vec::new(),
            };
            (tx, BufReader::new(pipe))
        }
    }

    impl Read for Pipe {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.pending.is_empty() {
                match self.chunks.recv() {
                    Ok(chunk) => self.pending = chunk,
                    Err(_) => return Ok(0),
                }
            }
            let n = buf.len().min(self.pending.len());
            buf[..n].copy_from_slice(&self.pending[..n]);
            self.pending = self.pending.split_off(n);
            Ok(n)
        }
    }

    fn endpoint() -> Endpoint {
        Endpoint::parse("ws://loopback.test/").expect("valid url")
    }

    fn fast_config() -> SessionConfig {
        SessionConfig::new()
            .with_connect_timeout(Duration::from_millis(200))
            .with_close_grace(Duration::from_millis(100))
    }

    async fn run(
        transport: LoopbackTransport,
        config: SessionConfig,
        input: impl BufRead + Send + 'static,
    ) -> (SessionOutcome, Vec<String>) {
        let capture = Capture::default();
        let session = Session::new(transport, config, input, OutputSink::new(capture.clone()));
        let outcome = timeout(WAIT, session.run(endpoint()))
            .await
            .expect("session ends");
        (outcome, capture.lines())
    }

    fn errors(lines: &[String]) -> Vec<&str> {
        lines
            .iter()
            .map(String::as_str)
            .filter(|line| line.starts_with("* error:"))
            .collect()
    }

    #[tokio::test]
    async fn test_echo_session() {
        let transport = LoopbackTransport::echo();
        let (outcome, lines) =
            run(transport.clone(), fast_config(), Cursor::new("hello\nworld\n")).await;

        assert_eq!(outcome, SessionOutcome::EndOfInput);
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(
            lines,
            vec![
                "* connecting to ws://loopback.test/",
                "* connected to ws://loopback.test/",
                "hello",
                "world",
                "* connection closed",
            ]
        );
        assert_eq!(transport.written().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_line_is_sent() {
        let transport = LoopbackTransport::echo();
        let (outcome, _lines) = run(transport.clone(), fast_config(), Cursor::new("\n")).await;

        assert_eq!(outcome, SessionOutcome::EndOfInput);
        assert_eq!(transport.written(), vec![OutboundFrame::new("")]);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let transport = LoopbackTransport::unreachable("connection refused");
        let (outcome, lines) = run(transport, fast_config(), Cursor::new("never sent\n")).await;

        assert_eq!(outcome, SessionOutcome::ConnectionFailed);
        assert_ne!(outcome.exit_code(), 0);
        assert_eq!(
            errors(&lines),
            vec!["* error: Connection failed: connection refused"]
        );
        assert!(!lines.iter().any(|line| line == "never sent"));
    }

    #[tokio::test]
    async fn test_abrupt_disconnect() {
        let transport = LoopbackTransport::new();
        let capture = Capture::default();
        let (input_tx, input) = Pipe::new();
        let session = Session::new(
            transport.clone(),
            fast_config(),
            input,
            OutputSink::new(capture.clone()),
        );
        let running = tokio::spawn(session.run(endpoint()));

        timeout(WAIT, async {
            while !capture.lines().iter().any(|l| l.starts_with("* connected")) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("connects");

        input_tx.send(b"first\n".to_vec()).expect("input open");
        timeout(WAIT, async {
            while transport.written().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("first line written");

        assert!(transport.disconnect("connection reset by peer"));
        let outcome = timeout(WAIT, running)
            .await
            .expect("session ends")
            .expect("session task");
        drop(input_tx);

        assert_eq!(outcome, SessionOutcome::ConnectionFailed);
        let lines = capture.lines();
        assert_eq!(
            errors(&lines),
            vec!["* error: Connection lost: connection reset by peer"]
        );
        assert_eq!(
            lines.iter().filter(|l| *l == "* connection closed").count(),
            1
        );
    }

    #[tokio::test]
    async fn test_peer_close_ends_session() {
        let transport = LoopbackTransport::new();
        let capture = Capture::default();
        let (input_tx, input) = Pipe::new();
        let session = Session::new(
            transport.clone(),
            fast_config(),
            input,
            OutputSink::new(capture.clone()),
        );
        let running = tokio::spawn(session.run(endpoint()));

        timeout(WAIT, async {
            while !transport.push_message("bye") {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("connects");
        assert!(transport.inject(crate::transport::TransportEvent::Closed));

        let outcome = timeout(WAIT, running)
            .await
            .expect("session ends")
            .expect("session task");
        drop(input_tx);

        assert_eq!(outcome, SessionOutcome::ClosedByPeer);
        let lines = capture.lines();
        assert!(lines.contains(&"bye".to_string()));
        assert_eq!(lines.last().map(String::as_str), Some("* connection closed"));
    }

    #[tokio::test]
    async fn test_reconnect_exhausted() {
        let transport = LoopbackTransport::unreachable("refused");
        let config = fast_config().with_reconnect(
            ReconnectPolicy::with_attempts(2).with_base_delay(Duration::from_millis(10)),
        );
        let (outcome, lines) = run(transport.clone(), config, Cursor::new("")).await;

        assert_eq!(outcome, SessionOutcome::ConnectionFailed);
        assert_eq!(transport.connect_count(), 3);
        assert_eq!(
            errors(&lines),
            vec![
                "* error: Connection failed: refused (reconnecting)",
                "* error: Connection failed: refused (reconnecting)",
                "* error: Connection failed: refused",
                "* error: Giving up after 2 reconnect attempts",
            ]
        );
    }

    #[tokio::test]
    async fn test_send_failure_stops_session() {
        let transport = LoopbackTransport::new();
        let capture = Capture::default();
        let (input_tx, input) = Pipe::new();
        let session = Session::new(
            transport.clone(),
            fast_config(),
            input,
            OutputSink::new(capture.clone()),
        );
        let running = tokio::spawn(session.run(endpoint()));

        timeout(WAIT, async {
            while !capture.lines().iter().any(|l| l.starts_with("* connected")) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("connects");

        transport.break_writer();
        tokio::time::sleep(Duration::from_millis(20)).await;
        input_tx.send(b"lost\n".to_vec()).expect("input open");

        let outcome = timeout(WAIT, running)
            .await
            .expect("session ends")
            .expect("session task");
        drop(input_tx);

        assert_eq!(outcome, SessionOutcome::SendFailed);
        assert_eq!(outcome.exit_code(), 1);
        assert!(
            capture
                .lines()
                .contains(&"* send failed: transport failed while sending".to_string())
        );
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_forwarded() {
        let transport = LoopbackTransport::echo();
        let input = Cursor::new(b"hello\n\xffbad\nworld\n".to_vec());
        let (outcome, lines) = run(transport.clone(), fast_config(), input).await;

        assert_eq!(outcome, SessionOutcome::EndOfInput);
        assert_eq!(
            transport.written(),
            vec![
                OutboundFrame::new("hello"),
                OutboundFrame::new("\u{FFFD}bad"),
                OutboundFrame::new("world"),
            ]
        );
        assert!(lines.contains(&"world".to_string()));
        assert!(errors(&lines).is_empty());
    }

    #[tokio::test]
    async fn test_input_read_error_fails_session() {
        /// Yields one line, then fails.
        struct Broken {
            sent: bool,
        }

        impl Read for Broken {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if self.sent {
                    return Err(io::Error::other("device gone"));
                }
                self.sent = true;
                buf[..6].copy_from_slice(b"hello\n");
                Ok(6)
            }
        }

        let transport = LoopbackTransport::echo();
        let input = BufReader::new(Broken { sent: false });
        let (outcome, lines) = run(transport.clone(), fast_config(), input).await;

        assert_eq!(outcome, SessionOutcome::InputFailed);
        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(transport.written(), vec![OutboundFrame::new("hello")]);
        assert_eq!(
            lines
                .iter()
                .filter(|l| *l == "* input failed: device gone")
                .count(),
            1
        );
        assert_eq!(lines.last().map(String::as_str), Some("* connection closed"));
    }
}
