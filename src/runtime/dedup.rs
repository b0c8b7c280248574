//! Sliding-window duplicate suppression for inbound domain events.

use std::collections::VecDeque;

use crate::config::DedupConfig;
use crate::domain::EventKind;

#[derive(Debug, Clone)]
struct MessageRecord {
    id: String,
    kind: EventKind,
    timestamp_ms: i64,
}

/// Remembers recently seen `(id, kind)` pairs.
///
/// Time only advances through the timestamps passed to
/// [`is_duplicate`](Self::is_duplicate), so replayed or reordered deliveries
/// are judged by when the producer emitted them rather than when they arrived.
#[derive(Debug)]
pub struct MessageDeduplicator {
    window_ms: i64,
    capacity: usize,
    /// Insertion order; the front is the oldest record.
    history: VecDeque<MessageRecord>,
}

impl MessageDeduplicator {
    #[must_use]
    pub fn new(config: &DedupConfig) -> Self {
        Self {
            window_ms: i64::try_from(config.window_ms).unwrap_or(i64::MAX),
            capacity: config.capacity.max(1),
            history: VecDeque::with_capacity(config.capacity.min(1024)),
        }
    }

    /// Check an event against the window and remember it if it is new.
    ///
    /// A duplicate leaves history untouched. A new event is appended and the
    /// oldest records are evicted until the history is back within capacity.
    pub fn is_duplicate(&mut self, id: &str, kind: EventKind, timestamp_ms: i64) -> bool {
        let cutoff = timestamp_ms.saturating_sub(self.window_ms);
        self.history.retain(|record| record.timestamp_ms >= cutoff);

        if self
            .history
            .iter()
            .any(|record| record.kind == kind && record.id == id)
        {
            return true;
        }

        self.history.push_back(MessageRecord {
            id: id.to_string(),
            kind,
            timestamp_ms,
        });
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }
        false
    }

    /// Number of records currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
