//! Transport-agnostic domain types: connection health, counters and events.

mod event;
mod health;
mod stats;

pub use event::{
    AgentUpdated, ClientEvent, Connected, CoordinationEvent, DaemonStatusUpdated, Disconnected,
    EventKind, EventPayload, Pong, ReconnectError, ReconnectFailed, Reconnected, ServerError,
    SessionUpdated,
};
pub use health::{ConnectionHealth, ConnectionState, HealthStatus};
pub use stats::WebSocketStats;
