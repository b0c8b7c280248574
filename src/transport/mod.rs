//! Transport port: the socket beneath the connection manager.
//!
//! The manager only ever talks to a [`Transport`]; the production adapter is
//! [`WebSocketTransport`] and the testkit provides an in-memory double.

mod websocket;

use async_trait::async_trait;

use crate::error::Result;
use crate::protocol::Frame;

pub use websocket::WebSocketTransport;

/// Something observed on an open connection.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A decoded inbound frame.
    Frame(Frame),
    /// The connection is gone (close frame, read error, end of stream).
    Closed { reason: String },
}

/// Bidirectional frame transport with an explicit connect step.
///
/// Implementations handle the socket lifecycle and frame encoding for their
/// specific medium. All methods are driven from a single task.
#[async_trait]
pub trait Transport: Send {
    /// Open a fresh connection, discarding any existing one first.
    async fn connect(&mut self) -> Result<()>;

    /// Write one frame to the open connection.
    ///
    /// # Errors
    ///
    /// Fails when no connection is open or the write fails; callers treat
    /// either as a dropped connection.
    async fn send(&mut self, frame: &Frame) -> Result<()>;

    /// Receive the next event from the open connection.
    ///
    /// Must be cancel-safe: the manager polls it inside `tokio::select!`.
    /// Returns `None` when no connection is open.
    async fn next_event(&mut self) -> Option<TransportEvent>;

    /// Close the connection if one is open. Safe to call repeatedly.
    async fn close(&mut self);

    /// Short name for logging.
    fn name(&self) -> &'static str;
}

/// Implement Transport for boxed trait objects to allow use with generic wrappers.
#[async_trait]
impl Transport for Box<dyn Transport> {
    async fn connect(&mut self) -> Result<()> {
        (**self).connect().await
    }

    async fn send(&mut self, frame: &Frame) -> Result<()> {
        (**self).send(frame).await
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        (**self).next_event().await
    }

    async fn close(&mut self) {
        (**self).close().await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
