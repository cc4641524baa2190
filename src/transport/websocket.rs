//! WebSocket transport and per-link event loop.
//!
//! # Event Loop
//!
//! Each link spawns a tokio task that handles:
//!
//! - Incoming messages from the peer (text, binary, close)
//! - Outgoing frames and close requests from the connection manager
//! - Translating socket failures into [`TransportEvent::Error`]
//!
//! TLS for `wss://` endpoints requires the `tls` cargo feature.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, error, trace, warn};

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::protocol::InboundFrame;

use super::{Link, LinkCommand, Transport, TransportEvent};

// ============================================================================
// WebSocketTransport
// ============================================================================

/// Transport that opens a WebSocket client connection per link.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    /// Creates a new WebSocket transport.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Wraps an already established WebSocket stream in a link.
    ///
    /// Spawns the event loop task internally.
    pub fn link<S>(ws_stream: WebSocketStream<S>) -> Link
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_event_loop(ws_stream, command_rx, event_tx));

        Link {
            commands: command_tx,
            events: event_rx,
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Link> {
        let (ws_stream, response) = connect_async(endpoint.as_str())
            .await
            .map_err(|e| match e {
                // Retrying cannot fix the URL, e.g. wss:// without the tls feature
                tungstenite::Error::Url(e) => {
                    Error::invalid_endpoint(endpoint.as_str(), e.to_string())
                }
                e => Error::connect(e.to_string()),
            })?;

        debug!(url = %endpoint, status = %response.status(), "WebSocket handshake completed");

        Ok(Self::link(ws_stream))
    }
}

// ============================================================================
// Event Loop
// ============================================================================

/// Event loop that handles WebSocket I/O for one link.
async fn run_event_loop<S>(
    ws_stream: WebSocketStream<S>,
    mut command_rx: mpsc::UnboundedReceiver<LinkCommand>,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut ws_write, mut ws_read) = ws_stream.split();
    let mut closing = false;

    loop {
        tokio::select! {
            // Incoming messages from the peer
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        let _ = event_tx.send(TransportEvent::Message(InboundFrame::new(text.as_str())));
                    }

                    Some(Ok(Message::Binary(bytes))) => {
                        let _ = event_tx.send(TransportEvent::Message(InboundFrame::from_bytes(&bytes)));
                    }

                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, initiated_locally = closing, "WebSocket closed");
                        // Flushes the close reply when the peer initiated.
                        let _ = ws_write.close().await;
                        let _ = event_tx.send(TransportEvent::Closed);
                        break;
                    }

                    Some(Err(e)) => {
                        if closing {
                            debug!(error = %e, "WebSocket error during teardown");
                            let _ = event_tx.send(TransportEvent::Closed);
                        } else {
                            error!(error = %e, "WebSocket error");
                            let _ = event_tx.send(TransportEvent::Error(e.to_string()));
                        }
                        break;
                    }

                    None => {
                        if closing {
                            let _ = event_tx.send(TransportEvent::Closed);
                        } else {
                            warn!("WebSocket stream ended without close frame");
                            let _ = event_tx.send(TransportEvent::Error(
                                "connection ended without close frame".to_string(),
                            ));
                        }
                        break;
                    }

                    // Ping/Pong are answered by tungstenite
                    Some(Ok(_)) => {}
                }
            }

            // Commands from the connection manager
            command = command_rx.recv(), if !closing => {
                match command {
                    Some(LinkCommand::Frame(frame)) => {
                        let payload = frame.into_inner();
                        trace!(len = payload.len(), "Sending frame");

                        if let Err(e) = ws_write.send(Message::Text(payload.into())).await {
                            error!(error = %e, "Failed to send frame");
                            let _ = event_tx.send(TransportEvent::Error(e.to_string()));
                            break;
                        }
                    }

                    Some(LinkCommand::Close) | None => {
                        debug!("Close requested");
                        closing = true;

                        if let Err(e) = ws_write.close().await {
                            debug!(error = %e, "Close handshake could not be sent");
                            let _ = event_tx.send(TransportEvent::Closed);
                            break;
                        }
                    }
                }
            }
        }
    }

    debug!("Event loop terminated");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::{Ipv4Addr, SocketAddr};

    use tokio::net::TcpListener;

    use crate::protocol::OutboundFrame;

    /// Binds an echo server on a random port and returns its URL.
    async fn spawn_echo_server() -> String {
        let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
            .await
            .expect("bind should succeed");
        let port = listener.local_addr().expect("local addr").port();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = tokio_tungstenite::accept_async(stream)
                .await
                .expect("upgrade");

            while let Some(message) = ws.next().await {
                match message {
                    Ok(message) if message.is_text() || message.is_binary() => {
                        if ws.send(message).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
        });

        format!("ws://127.0.0.1:{port}/")
    }

    #[tokio::test]
    async fn test_echo_round_trip_and_close() {
        let url = spawn_echo_server().await;
        let endpoint = Endpoint::parse(&url).expect("valid url");

        let mut link = WebSocketTransport::new()
            .connect(&endpoint)
            .await
            .expect("connect should succeed");

        link.commands
            .send(LinkCommand::Frame(OutboundFrame::new("hello")))
            .expect("link alive");

        let event = link.events.recv().await.expect("echo");
        assert_eq!(event, TransportEvent::Message(InboundFrame::new("hello")));

        link.commands.send(LinkCommand::Close).expect("link alive");
        assert_eq!(link.events.recv().await, Some(TransportEvent::Closed));
    }

    #[tokio::test]
    async fn test_empty_frame_is_sent() {
        let url = spawn_echo_server().await;
        let endpoint = Endpoint::parse(&url).expect("valid url");

        let mut link = WebSocketTransport::new()
            .connect(&endpoint)
            .await
            .expect("connect should succeed");

        link.commands
            .send(LinkCommand::Frame(OutboundFrame::new("")))
            .expect("link alive");

        let event = link.events.recv().await.expect("echo");
        assert_eq!(event, TransportEvent::Message(InboundFrame::new("")));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to find a port with nothing listening
        let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
            .await
            .expect("bind should succeed");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);

        let endpoint = Endpoint::parse(&format!("ws://127.0.0.1:{port}/")).expect("valid url");
        let result = WebSocketTransport::new().connect(&endpoint).await;

        assert!(matches!(result, Err(Error::Connect { .. })));
    }

    #[tokio::test]
    async fn test_peer_drop_without_close_frame_is_error() {
        let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
            .await
            .expect("bind should succeed");
        let port = listener.local_addr().expect("local addr").port();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let ws = tokio_tungstenite::accept_async(stream)
                .await
                .expect("upgrade");
            // Drops the socket without sending a close frame
            drop(ws);
        });

        let endpoint = Endpoint::parse(&format!("ws://127.0.0.1:{port}/")).expect("valid url");
        let mut link = WebSocketTransport::new()
            .connect(&endpoint)
            .await
            .expect("connect should succeed");

        let event = tokio::time::timeout(std::time::Duration::from_secs(5), link.events.recv())
            .await
            .expect("event in time");
        assert!(matches!(event, Some(TransportEvent::Error(_))));
        assert_eq!(link.events.recv().await, None);
    }

    #[cfg(not(feature = "tls"))]
    #[tokio::test]
    async fn test_wss_without_tls_is_invalid_endpoint() {
        let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
            .await
            .expect("bind should succeed");
        let port = listener.local_addr().expect("local addr").port();

        let endpoint = Endpoint::parse(&format!("wss://127.0.0.1:{port}/")).expect("valid url");
        let result = WebSocketTransport::new().connect(&endpoint).await;

        assert!(matches!(result, Err(Error::InvalidEndpoint { .. })));
        drop(listener);
    }
}
