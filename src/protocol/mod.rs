//! Wire protocol spoken with the orchestration daemon.
//!
//! Every message is a single JSON text frame of the form
//! `{"event": "<name>", "data": <payload>}`. Domain payloads are opaque to
//! this crate apart from the `id` and `timestamp` fields used for
//! deduplication.

mod frame;

pub use frame::{decode_event, DedupKey, Frame, Inbound};

/// Event names used on the wire.
pub mod names {
    pub const JOIN_COORDINATION: &str = "join_coordination";
    pub const LEAVE_COORDINATION: &str = "leave_coordination";
    pub const SUBSCRIBE_SESSION: &str = "subscribe_session";
    pub const UNSUBSCRIBE_SESSION: &str = "unsubscribe_session";
    pub const PING: &str = "ping";

    pub const COORDINATION_EVENT: &str = "coordination_event";
    pub const SESSION_UPDATED: &str = "session_updated";
    pub const AGENT_UPDATED: &str = "agent_updated";
    pub const DAEMON_STATUS_UPDATED: &str = "daemon_status_updated";
    pub const PONG: &str = "pong";
    pub const ERROR: &str = "error";
}
