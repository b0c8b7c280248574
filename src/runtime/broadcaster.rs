//! Publish/subscribe registry for client events.
//!
//! Listeners are grouped by [`EventKind`] and identified by `Arc` pointer, so
//! registering the same listener twice is a no-op and `unsubscribe` needs the
//! exact `Arc` that was registered. Each invocation runs behind a panic
//! boundary: a panicking listener is logged and skipped.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::error;

use crate::domain::{ClientEvent, EventKind, EventPayload};

/// Callback invoked for each published event of the subscribed kind.
pub type Listener = Arc<dyn Fn(&ClientEvent) + Send + Sync>;

/// Wrap a closure into a [`Listener`].
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&ClientEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a typed payload callback into a [`Listener`] for `T::KIND`.
pub fn typed_listener<T, F>(f: F) -> Listener
where
    T: EventPayload,
    F: Fn(&T) + Send + Sync + 'static,
{
    Arc::new(move |event: &ClientEvent| {
        if let Some(payload) = T::from_event(event) {
            f(payload);
        }
    })
}

/// Shared listener registry. Clones refer to the same registry.
#[derive(Clone, Default)]
pub struct Broadcaster {
    listeners: Arc<RwLock<HashMap<EventKind, Vec<Listener>>>>,
}

impl Broadcaster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `kind`. Returns `false` if it was already registered.
    pub fn subscribe(&self, kind: EventKind, listener: Listener) -> bool {
        let mut listeners = self.listeners.write();
        let entry = listeners.entry(kind).or_default();
        if entry.iter().any(|existing| Arc::ptr_eq(existing, &listener)) {
            return false;
        }
        entry.push(listener);
        true
    }

    /// Remove `listener` from `kind`. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, kind: EventKind, listener: &Listener) -> bool {
        let mut listeners = self.listeners.write();
        let Some(entry) = listeners.get_mut(&kind) else {
            return false;
        };
        let before = entry.len();
        entry.retain(|existing| !Arc::ptr_eq(existing, listener));
        let removed = entry.len() != before;
        if entry.is_empty() {
            listeners.remove(&kind);
        }
        removed
    }

    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.read().get(&kind).map_or(0, Vec::len)
    }

    /// Deliver `event` to every listener of its kind, in registration order.
    ///
    /// The listener list is snapshotted first, so callbacks may subscribe or
    /// unsubscribe without deadlocking. Returns how many listeners completed
    /// without panicking.
    pub fn publish(&self, event: &ClientEvent) -> usize {
        let kind = event.kind();
        let snapshot: Vec<Listener> = match self.listeners.read().get(&kind) {
            Some(listeners) => listeners.clone(),
            None => return 0,
        };

        let mut delivered = 0;
        for listener in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    error!(
                        event = %kind,
                        panic = %panic_message(panic.as_ref()),
                        "Listener panicked; continuing with remaining listeners"
                    );
                }
            }
        }
        delivered
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Connected, CoordinationEvent, Disconnected};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting(counter: &Arc<AtomicU32>) -> Listener {
        let counter = counter.clone();
        listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn coordination() -> ClientEvent {
        CoordinationEvent(json!({"id": "e1"})).into()
    }

    #[test]
    fn same_listener_is_not_added_twice() {
        let broadcaster = Broadcaster::new();
        let hits = Arc::new(AtomicU32::new(0));
        let l = counting(&hits);

        assert!(broadcaster.subscribe(EventKind::CoordinationEvent, l.clone()));
        assert!(!broadcaster.subscribe(EventKind::CoordinationEvent, l.clone()));
        assert_eq!(broadcaster.listener_count(EventKind::CoordinationEvent), 1);

        broadcaster.publish(&coordination());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listeners_only_see_their_kind() {
        let broadcaster = Broadcaster::new();
        let hits = Arc::new(AtomicU32::new(0));
        broadcaster.subscribe(EventKind::Connect, counting(&hits));

        assert_eq!(broadcaster.publish(&coordination()), 0);
        assert_eq!(broadcaster.publish(&Connected.into()), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_removes_exact_listener() {
        let broadcaster = Broadcaster::new();
        let hits = Arc::new(AtomicU32::new(0));
        let first = counting(&hits);
        let second = counting(&hits);
        broadcaster.subscribe(EventKind::CoordinationEvent, first.clone());
        broadcaster.subscribe(EventKind::CoordinationEvent, second);

        assert!(broadcaster.unsubscribe(EventKind::CoordinationEvent, &first));
        assert!(!broadcaster.unsubscribe(EventKind::CoordinationEvent, &first));

        broadcaster.publish(&coordination());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_listener_does_not_stop_others() {
        let broadcaster = Broadcaster::new();
        let hits = Arc::new(AtomicU32::new(0));
        broadcaster.subscribe(
            EventKind::CoordinationEvent,
            listener(|_| panic!("listener failure")),
        );
        broadcaster.subscribe(EventKind::CoordinationEvent, counting(&hits));

        let delivered = broadcaster.publish(&coordination());

        assert_eq!(delivered, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_may_unsubscribe_itself_during_publish() {
        let broadcaster = Broadcaster::new();
        let hits = Arc::new(AtomicU32::new(0));
        let slot: Arc<parking_lot::Mutex<Option<Listener>>> = Arc::default();

        let inner_broadcaster = broadcaster.clone();
        let inner_slot = slot.clone();
        let inner_hits = hits.clone();
        let once = listener(move |_| {
            inner_hits.fetch_add(1, Ordering::SeqCst);
            if let Some(me) = inner_slot.lock().take() {
                inner_broadcaster.unsubscribe(EventKind::Connect, &me);
            }
        });
        *slot.lock() = Some(once.clone());
        broadcaster.subscribe(EventKind::Connect, once);

        broadcaster.publish(&Connected.into());
        broadcaster.publish(&Connected.into());

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(broadcaster.listener_count(EventKind::Connect), 0);
    }

    #[test]
    fn typed_listener_receives_payload() {
        let broadcaster = Broadcaster::new();
        let reasons = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = reasons.clone();
        broadcaster.subscribe(
            Disconnected::KIND,
            typed_listener(move |d: &Disconnected| sink.lock().push(d.reason.clone())),
        );

        broadcaster.publish(
            &Disconnected {
                reason: "transport closed".into(),
            }
            .into(),
        );

        assert_eq!(*reasons.lock(), vec!["transport closed".to_string()]);
    }
}
