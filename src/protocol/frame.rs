//! JSON frame codec and inbound event decoding.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::names;
use crate::domain::{
    AgentUpdated, ClientEvent, CoordinationEvent, DaemonStatusUpdated, EventKind, Pong,
    ServerError, SessionUpdated,
};
use crate::error::{Error, Result};

/// One message on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Liveness probe carrying the send timestamp in epoch milliseconds.
    #[must_use]
    pub fn ping(timestamp_ms: i64) -> Self {
        Self::new(names::PING, Value::from(timestamp_ms))
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Identity of a domain event for duplicate suppression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupKey {
    pub id: String,
    /// Producer-assigned timestamp; `None` when the payload has none.
    pub timestamp_ms: Option<i64>,
}

/// A decoded inbound frame ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub event: ClientEvent,
    pub dedup_key: Option<DedupKey>,
}

/// Decode an inbound frame into a client event.
///
/// Returns `Ok(None)` for event names this client does not handle, including
/// the client-local lifecycle names if a server happens to send them.
///
/// # Errors
///
/// Returns [`Error::Protocol`] when a known event carries a payload of the
/// wrong shape.
pub fn decode_event(frame: Frame) -> Result<Option<Inbound>> {
    let Some(kind) = EventKind::from_name(&frame.event) else {
        return Ok(None);
    };

    let data = frame.data;
    let event = match kind {
        EventKind::CoordinationEvent
        | EventKind::SessionUpdated
        | EventKind::AgentUpdated
        | EventKind::DaemonStatusUpdated => {
            let dedup_key = dedup_key(&data);
            let event: ClientEvent = match kind {
                EventKind::CoordinationEvent => CoordinationEvent(data).into(),
                EventKind::SessionUpdated => SessionUpdated(data).into(),
                EventKind::AgentUpdated => AgentUpdated(data).into(),
                _ => DaemonStatusUpdated(data).into(),
            };
            return Ok(Some(Inbound { event, dedup_key }));
        }
        EventKind::Pong => {
            let timestamp = match &data {
                Value::Object(map) => map.get("timestamp").and_then(timestamp_ms),
                other => timestamp_ms(other),
            }
            .ok_or_else(|| Error::Protocol("pong without a timestamp".into()))?;
            ClientEvent::Pong(Pong { timestamp })
        }
        EventKind::Error => ClientEvent::Error(server_error(data)),
        _ => return Ok(None),
    };

    Ok(Some(Inbound {
        event,
        dedup_key: None,
    }))
}

fn dedup_key(data: &Value) -> Option<DedupKey> {
    let id = match data.get("id")? {
        Value::String(id) => id.clone(),
        Value::Number(id) => id.to_string(),
        _ => return None,
    };
    let timestamp_ms = data.get("timestamp").and_then(timestamp_ms);
    Some(DedupKey { id, timestamp_ms })
}

/// Accept integer or float epoch milliseconds, or an RFC 3339 string.
fn timestamp_ms(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.timestamp_millis()),
        _ => None,
    }
}

fn server_error(data: Value) -> ServerError {
    match data {
        Value::String(message) => ServerError {
            message,
            code: None,
        },
        Value::Object(map) => {
            let message = map
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            let code = map.get("code").and_then(|code| match code {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
            ServerError { message, code }
        }
        other => ServerError {
            message: other.to_string(),
            code: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inbound(text: &str) -> Option<Inbound> {
        decode_event(Frame::decode(text).unwrap()).unwrap()
    }

    #[test]
    fn encodes_event_and_data() {
        let json = Frame::new(names::JOIN_COORDINATION, json!("c1"))
            .encode()
            .unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["event"], "join_coordination");
        assert_eq!(parsed["data"], "c1");
    }

    #[test]
    fn ping_carries_timestamp() {
        let frame = Frame::ping(1_700_000_000_123);
        assert_eq!(frame.event, "ping");
        assert_eq!(frame.data, json!(1_700_000_000_123_i64));
    }

    #[test]
    fn missing_data_defaults_to_null() {
        let frame = Frame::decode(r#"{"event":"session_updated"}"#).unwrap();
        assert_eq!(frame.data, Value::Null);
    }

    #[test]
    fn domain_event_extracts_dedup_key() {
        let decoded = inbound(
            r#"{"event":"coordination_event","data":{"id":"evt-1","timestamp":1000,"kind":"task"}}"#,
        )
        .unwrap();

        assert_eq!(decoded.event.kind(), EventKind::CoordinationEvent);
        assert_eq!(
            decoded.dedup_key,
            Some(DedupKey {
                id: "evt-1".into(),
                timestamp_ms: Some(1000),
            })
        );
        assert_eq!(
            decoded.event.domain_payload().unwrap()["kind"],
            json!("task")
        );
    }

    #[test]
    fn rfc3339_timestamp_and_numeric_id() {
        let decoded = inbound(
            r#"{"event":"agent_updated","data":{"id":42,"timestamp":"1970-01-01T00:00:01.500Z"}}"#,
        )
        .unwrap();

        assert_eq!(
            decoded.dedup_key,
            Some(DedupKey {
                id: "42".into(),
                timestamp_ms: Some(1500),
            })
        );
    }

    #[test]
    fn domain_event_without_id_has_no_key() {
        let decoded = inbound(r#"{"event":"daemon_status_updated","data":{"running":true}}"#).unwrap();
        assert!(decoded.dedup_key.is_none());
    }

    #[test]
    fn pong_accepts_bare_or_wrapped_timestamp() {
        let bare = inbound(r#"{"event":"pong","data":123}"#).unwrap();
        let wrapped = inbound(r#"{"event":"pong","data":{"timestamp":123}}"#).unwrap();

        assert_eq!(bare.event, ClientEvent::Pong(Pong { timestamp: 123 }));
        assert_eq!(wrapped.event, bare.event);
    }

    #[test]
    fn pong_without_timestamp_is_protocol_error() {
        let frame = Frame::decode(r#"{"event":"pong","data":{}}"#).unwrap();
        assert!(matches!(decode_event(frame), Err(Error::Protocol(_))));
    }

    #[test]
    fn error_event_with_numeric_code() {
        let decoded = inbound(r#"{"event":"error","data":{"message":"boom","code":503}}"#).unwrap();

        assert_eq!(
            decoded.event,
            ClientEvent::Error(ServerError {
                message: "boom".into(),
                code: Some("503".into()),
            })
        );
    }

    #[test]
    fn unknown_and_lifecycle_names_are_ignored() {
        assert!(inbound(r#"{"event":"heartbeat","data":1}"#).is_none());
        assert!(inbound(r#"{"event":"connect"}"#).is_none());
        assert!(inbound(r#"{"event":"reconnect","data":3}"#).is_none());
    }
}
