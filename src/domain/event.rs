//! Events delivered to subscribers.
//!
//! [`ClientEvent`] is a tagged union keyed by [`EventKind`]. Every variant
//! wraps its own payload type so subscribers can register typed callbacks
//! through [`EventPayload`] instead of matching on the whole enum.

use std::fmt;

use serde_json::Value;

/// Name of an event a listener can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connect,
    Disconnect,
    Reconnect,
    ReconnectError,
    ReconnectFailed,
    CoordinationEvent,
    SessionUpdated,
    AgentUpdated,
    DaemonStatusUpdated,
    Pong,
    Error,
}

impl EventKind {
    pub const ALL: [EventKind; 11] = [
        Self::Connect,
        Self::Disconnect,
        Self::Reconnect,
        Self::ReconnectError,
        Self::ReconnectFailed,
        Self::CoordinationEvent,
        Self::SessionUpdated,
        Self::AgentUpdated,
        Self::DaemonStatusUpdated,
        Self::Pong,
        Self::Error,
    ];

    /// Event name as it appears on the wire or in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Reconnect => "reconnect",
            Self::ReconnectError => "reconnect_error",
            Self::ReconnectFailed => "reconnect_failed",
            Self::CoordinationEvent => "coordination_event",
            Self::SessionUpdated => "session_updated",
            Self::AgentUpdated => "agent_updated",
            Self::DaemonStatusUpdated => "daemon_status_updated",
            Self::Pong => "pong",
            Self::Error => "error",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Server-originated domain events carry an identity used for deduplication.
    #[must_use]
    pub const fn is_domain(self) -> bool {
        matches!(
            self,
            Self::CoordinationEvent
                | Self::SessionUpdated
                | Self::AgentUpdated
                | Self::DaemonStatusUpdated
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Transport connected (first connect or reconnect).
#[derive(Debug, Clone, PartialEq)]
pub struct Connected;

/// An open connection went away.
#[derive(Debug, Clone, PartialEq)]
pub struct Disconnected {
    pub reason: String,
}

/// A retry succeeded; `attempt` is the 1-based retry that got through.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconnected {
    pub attempt: u32,
}

/// A connection attempt failed or an open connection broke.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectError {
    /// Retry number that failed; 0 for an explicit `connect()` or a dropped connection.
    pub attempt: u32,
    pub error: String,
}

/// Retries are exhausted; the client stays down until `connect()` is called.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectFailed {
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoordinationEvent(pub Value);

#[derive(Debug, Clone, PartialEq)]
pub struct SessionUpdated(pub Value);

#[derive(Debug, Clone, PartialEq)]
pub struct AgentUpdated(pub Value);

#[derive(Debug, Clone, PartialEq)]
pub struct DaemonStatusUpdated(pub Value);

/// Reply to a `ping`, echoing its timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Pong {
    pub timestamp: i64,
}

/// Error reported by the daemon.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerError {
    pub message: String,
    pub code: Option<String>,
}

/// Everything a subscriber can observe.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connect(Connected),
    Disconnect(Disconnected),
    Reconnect(Reconnected),
    ReconnectError(ReconnectError),
    ReconnectFailed(ReconnectFailed),
    CoordinationEvent(CoordinationEvent),
    SessionUpdated(SessionUpdated),
    AgentUpdated(AgentUpdated),
    DaemonStatusUpdated(DaemonStatusUpdated),
    Pong(Pong),
    Error(ServerError),
}

impl ClientEvent {
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Connect(_) => EventKind::Connect,
            Self::Disconnect(_) => EventKind::Disconnect,
            Self::Reconnect(_) => EventKind::Reconnect,
            Self::ReconnectError(_) => EventKind::ReconnectError,
            Self::ReconnectFailed(_) => EventKind::ReconnectFailed,
            Self::CoordinationEvent(_) => EventKind::CoordinationEvent,
            Self::SessionUpdated(_) => EventKind::SessionUpdated,
            Self::AgentUpdated(_) => EventKind::AgentUpdated,
            Self::DaemonStatusUpdated(_) => EventKind::DaemonStatusUpdated,
            Self::Pong(_) => EventKind::Pong,
            Self::Error(_) => EventKind::Error,
        }
    }

    /// Opaque JSON payload for server domain events.
    #[must_use]
    pub fn domain_payload(&self) -> Option<&Value> {
        match self {
            Self::CoordinationEvent(CoordinationEvent(value))
            | Self::SessionUpdated(SessionUpdated(value))
            | Self::AgentUpdated(AgentUpdated(value))
            | Self::DaemonStatusUpdated(DaemonStatusUpdated(value)) => Some(value),
            _ => None,
        }
    }
}

/// Payload type bound to exactly one [`EventKind`].
pub trait EventPayload: Sized + Send + Sync + 'static {
    const KIND: EventKind;

    /// Borrow this payload out of an event of the matching variant.
    fn from_event(event: &ClientEvent) -> Option<&Self>;
}

macro_rules! event_payload {
    ($($payload:ident => $variant:ident),* $(,)?) => {
        $(
            impl EventPayload for $payload {
                const KIND: EventKind = EventKind::$variant;

                fn from_event(event: &ClientEvent) -> Option<&Self> {
                    match event {
                        ClientEvent::$variant(payload) => Some(payload),
                        _ => None,
                    }
                }
            }

            impl From<$payload> for ClientEvent {
                fn from(payload: $payload) -> Self {
                    ClientEvent::$variant(payload)
                }
            }
        )*
    };
}

event_payload! {
    Connected => Connect,
    Disconnected => Disconnect,
    Reconnected => Reconnect,
    ReconnectError => ReconnectError,
    ReconnectFailed => ReconnectFailed,
    CoordinationEvent => CoordinationEvent,
    SessionUpdated => SessionUpdated,
    AgentUpdated => AgentUpdated,
    DaemonStatusUpdated => DaemonStatusUpdated,
    Pong => Pong,
    ServerError => Error,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn names_round_trip_through_lookup() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(EventKind::from_name("nope"), None);
    }

    #[test]
    fn only_server_updates_are_domain_events() {
        let domain: Vec<_> = EventKind::ALL.into_iter().filter(|k| k.is_domain()).collect();
        assert_eq!(
            domain,
            vec![
                EventKind::CoordinationEvent,
                EventKind::SessionUpdated,
                EventKind::AgentUpdated,
                EventKind::DaemonStatusUpdated,
            ]
        );
    }

    #[test]
    fn typed_extraction_matches_variant() {
        let event = ClientEvent::from(SessionUpdated(json!({"id": "s1"})));

        assert_eq!(event.kind(), SessionUpdated::KIND);
        assert_eq!(
            SessionUpdated::from_event(&event),
            Some(&SessionUpdated(json!({"id": "s1"})))
        );
        assert!(AgentUpdated::from_event(&event).is_none());
        assert_eq!(event.domain_payload(), Some(&json!({"id": "s1"})));
    }

    #[test]
    fn lifecycle_events_have_no_domain_payload() {
        let event = ClientEvent::from(Reconnected { attempt: 2 });
        assert_eq!(event.kind(), EventKind::Reconnect);
        assert!(event.domain_payload().is_none());
    }
}
