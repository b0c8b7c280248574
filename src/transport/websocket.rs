//! WebSocket transport backed by `tokio-tungstenite`.
//!
//! # Connection Lifecycle
//!
//! 1. **Connect**: `connect()` drops any previous socket and opens a new one
//! 2. **Read**: `next_event()` yields decoded frames; tungstenite answers pings
//! 3. **Close**: a close frame, read error or end of stream yields
//!    [`TransportEvent::Closed`] and forgets the socket
//!
//! Reconnection is not handled here; the connection manager owns retries.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use super::{Transport, TransportEvent};
use crate::error::{Error, Result};
use crate::protocol::Frame;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Transport speaking JSON text frames over a WebSocket.
pub struct WebSocketTransport {
    /// The WebSocket URL to connect to (e.g., <ws://127.0.0.1:4000/ws>)
    url: String,
    ws: Option<Socket>,
}

impl WebSocketTransport {
    /// Creates a transport for the given URL. No connection is opened yet.
    #[must_use]
    pub const fn new(url: String) -> Self {
        Self { url, ws: None }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.ws.is_some()
    }

    fn closed(&mut self, reason: String) -> Option<TransportEvent> {
        self.ws = None;
        Some(TransportEvent::Closed { reason })
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.ws.take().is_some() {
            debug!(url = %self.url, "Discarding previous WebSocket before reconnecting");
        }

        info!(url = %self.url, "Connecting to WebSocket");
        let (ws_stream, response) = connect_async(&self.url).await?;
        info!(status = %response.status(), "WebSocket connected");

        self.ws = Some(ws_stream);
        Ok(())
    }

    async fn send(&mut self, frame: &Frame) -> Result<()> {
        let ws = self
            .ws
            .as_mut()
            .ok_or_else(|| Error::Connection("Not connected".into()))?;

        let json = frame.encode()?;
        trace!(event = %frame.event, bytes = json.len(), "Sending WebSocket text frame");
        ws.send(Message::Text(json)).await?;
        Ok(())
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        loop {
            let ws = self.ws.as_mut()?;

            let Some(msg_result) = ws.next().await else {
                warn!("WebSocket stream ended");
                return self.closed("stream ended".into());
            };

            match msg_result {
                Ok(Message::Text(text)) => {
                    trace!(bytes = text.len(), "Received WebSocket text frame");
                    match Frame::decode(&text) {
                        Ok(frame) => return Some(TransportEvent::Frame(frame)),
                        Err(e) => {
                            warn!(error = %e, bytes = text.len(), "Failed to parse frame");
                            continue;
                        }
                    }
                }
                Ok(Message::Ping(_)) => {
                    // tungstenite queues the pong itself and flushes it on the
                    // next read or write, so nothing here awaits a send.
                    trace!("Received WebSocket ping");
                }
                Ok(Message::Close(frame)) => {
                    info!(frame = ?frame, "WebSocket closed by server");
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "server closed connection".into());
                    return self.closed(reason);
                }
                Ok(_) => continue,
                Err(e) => {
                    warn!(error = %e, "WebSocket error");
                    return self.closed(e.to_string());
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut ws) = self.ws.take() {
            if let Err(e) = ws.close(None).await {
                debug!(error = %e, "Error while closing WebSocket");
            }
        }
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_transport_is_not_open() {
        let transport = WebSocketTransport::new("ws://127.0.0.1:4000/ws".into());
        assert!(!transport.is_open());
        assert_eq!(transport.url(), "ws://127.0.0.1:4000/ws");
        assert_eq!(transport.name(), "websocket");
    }

    #[tokio::test]
    async fn send_without_connection_fails() {
        let mut transport = WebSocketTransport::new("ws://127.0.0.1:4000/ws".into());
        let result = transport.send(&Frame::ping(1)).await;
        assert!(matches!(result, Err(Error::Connection(_))));
    }

    #[tokio::test]
    async fn next_event_without_connection_is_none() {
        let mut transport = WebSocketTransport::new("ws://127.0.0.1:4000/ws".into());
        assert!(transport.next_event().await.is_none());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let mut transport = WebSocketTransport::new("ws://127.0.0.1:4000/ws".into());
        transport.close().await;
        transport.close().await;
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn server_ping_is_answered_and_not_surfaced() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(Message::Ping(b"hb".to_vec())).await.unwrap();
            ws.send(Message::Text(r#"{"event":"pong","data":1}"#.into()))
                .await
                .unwrap();
            loop {
                match ws.next().await {
                    Some(Ok(Message::Pong(data))) => return data,
                    Some(Ok(_)) => continue,
                    other => panic!("expected a pong, got {other:?}"),
                }
            }
        });

        let mut transport = WebSocketTransport::new(format!("ws://{addr}"));
        transport.connect().await.unwrap();

        match transport.next_event().await {
            Some(TransportEvent::Frame(frame)) => assert_eq!(frame.event, "pong"),
            other => panic!("expected the text frame, got {other:?}"),
        }
        transport.send(&Frame::ping(2)).await.unwrap();

        assert_eq!(server.await.unwrap(), b"hb".to_vec());
        transport.close().await;
    }

    #[tokio::test]
    async fn connect_to_unreachable_host_fails() {
        // Port 9 (discard) on localhost is not expected to speak WebSocket.
        let mut transport = WebSocketTransport::new("ws://127.0.0.1:9/ws".into());
        assert!(transport.connect().await.is_err());
        assert!(!transport.is_open());
    }
}
