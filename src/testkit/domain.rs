//! Builders for wire frames and an event recorder.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::domain::{ClientEvent, EventKind};
use crate::protocol::{names, Frame};
use crate::runtime::{listener, Listener};

/// `coordination_event` carrying an id and an epoch-millisecond timestamp.
pub fn coordination_frame(id: &str, timestamp_ms: i64) -> Frame {
    Frame::new(
        names::COORDINATION_EVENT,
        json!({ "id": id, "timestamp": timestamp_ms, "type": "task_assigned" }),
    )
}

/// `session_updated` with an id but no timestamp.
pub fn session_frame(id: &str) -> Frame {
    Frame::new(names::SESSION_UPDATED, json!({ "id": id, "status": "active" }))
}

pub fn pong_frame(timestamp_ms: i64) -> Frame {
    Frame::new(names::PONG, Value::from(timestamp_ms))
}

pub fn error_frame(message: &str) -> Frame {
    Frame::new(names::ERROR, json!({ "message": message }))
}

/// Listener that records every event it receives.
#[derive(Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<ClientEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh listener appending to this recorder.
    pub fn listener(&self) -> Listener {
        let events = Arc::clone(&self.events);
        listener(move |event| events.lock().push(event.clone()))
    }

    pub fn events(&self) -> Vec<ClientEvent> {
        self.events.lock().clone()
    }

    /// Names of the recorded events, in delivery order.
    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().iter().map(ClientEvent::kind).collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| event.kind() == kind)
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}
