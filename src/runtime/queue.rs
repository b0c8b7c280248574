//! Bounded FIFO buffer for outbound messages emitted while offline.

use std::collections::VecDeque;

use serde_json::Value;
use tracing::debug;

use crate::error::Error;
use crate::protocol::Frame;
use crate::transport::Transport;

/// An outbound message waiting for a connection.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedMessage {
    pub event: String,
    pub payload: Value,
}

impl QueuedMessage {
    #[must_use]
    pub fn to_frame(&self) -> Frame {
        Frame::new(self.event.clone(), self.payload.clone())
    }
}

/// Result of [`MessageQueue::flush_all`].
#[derive(Debug)]
pub struct FlushOutcome {
    /// Messages delivered, in queue order.
    pub sent: usize,
    /// Set when a send failed; the failed message is back at the front.
    pub error: Option<Error>,
}

/// Bounded FIFO that rejects new messages when full.
///
/// Already-accepted messages are never evicted to make room, so the order
/// and content of what the caller was told is pending stays intact.
#[derive(Debug)]
pub struct MessageQueue {
    capacity: usize,
    messages: VecDeque<QueuedMessage>,
}

impl MessageQueue {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            messages: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    /// Append a message. Returns `false` and drops it when the queue is full.
    pub fn enqueue(&mut self, event: impl Into<String>, payload: Value) -> bool {
        if self.messages.len() >= self.capacity {
            return false;
        }
        self.messages.push_back(QueuedMessage {
            event: event.into(),
            payload,
        });
        true
    }

    /// Put a message back at the head after a failed send.
    ///
    /// Bypasses the capacity check: the message was already accepted once.
    pub fn requeue_front(&mut self, message: QueuedMessage) {
        self.messages.push_front(message);
    }

    /// Send every queued message in FIFO order.
    ///
    /// Stops at the first failed send and leaves that message and everything
    /// behind it queued.
    pub async fn flush_all<T>(&mut self, transport: &mut T) -> FlushOutcome
    where
        T: Transport + ?Sized,
    {
        let mut sent = 0;
        while let Some(message) = self.messages.pop_front() {
            match transport.send(&message.to_frame()).await {
                Ok(()) => sent += 1,
                Err(error) => {
                    debug!(
                        event = %message.event,
                        remaining = self.messages.len() + 1,
                        "Flush interrupted, re-queuing remainder"
                    );
                    self.requeue_front(message);
                    return FlushOutcome {
                        sent,
                        error: Some(error),
                    };
                }
            }
        }
        FlushOutcome { sent, error: None }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate pending messages from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &QueuedMessage> {
        self.messages.iter()
    }
}
