//! Lifetime connection counters.

use serde::Serialize;

/// Monotonic counters maintained by the connection manager.
///
/// Never reset while the process runs; `average_latency_ms` is the only
/// field that moves in both directions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WebSocketStats {
    /// Inbound frames decoded into a known event, duplicates included.
    pub messages_received: u64,
    /// Outbound frames written to the transport, pings excluded.
    pub messages_sent: u64,
    pub duplicates_filtered: u64,
    pub reconnect_count: u64,
    /// Exponential moving average of ping round-trip times.
    pub average_latency_ms: Option<f64>,
    /// Outbound messages rejected because the queue was full.
    pub messages_dropped: u64,
    pub pings_sent: u64,
    pub pongs_received: u64,
}
