//! Connection health snapshot and lifecycle state.

use std::fmt;

use serde::Serialize;

/// Coarse connection quality, suitable for direct display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    #[default]
    Disconnected,
}

impl HealthStatus {
    /// Classify a round-trip time against the `healthy` and `degraded` upper bounds.
    ///
    /// Both bounds are exclusive: an RTT equal to `healthy_below_ms` is degraded.
    #[must_use]
    pub const fn from_latency(rtt_ms: u64, healthy_below_ms: u64, degraded_below_ms: u64) -> Self {
        if rtt_ms < healthy_below_ms {
            Self::Healthy
        } else if rtt_ms < degraded_below_ms {
            Self::Degraded
        } else {
            Self::Unhealthy
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
            Self::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of connection quality.
///
/// Owned by the connection manager; callers only ever receive copies.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConnectionHealth {
    pub status: HealthStatus,
    /// Last observed round-trip time; `None` until the first pong.
    pub latency_ms: Option<u64>,
    /// Connection attempts and drops since the last successful connect.
    pub consecutive_failures: u32,
    /// Live length of the outbound queue.
    pub queue_size: usize,
    /// Epoch milliseconds of the last matched pong.
    pub last_ping_time: Option<i64>,
    /// Lifetime count of completed reconnects.
    pub reconnect_count: u64,
}

/// Lifecycle state of the connection manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Terminal disconnect after the retry budget ran out. Only an explicit
    /// `connect()` leaves this state.
    Exhausted,
}

impl ConnectionState {
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// True for both the idle and the terminal disconnected states.
    #[must_use]
    pub const fn is_disconnected(self) -> bool {
        matches!(self, Self::Disconnected | Self::Exhausted)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Exhausted => "exhausted",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
