//! Canonical test configurations.
//!
//! Single source of truth for config structs used across tests.

use std::time::Duration;

use crate::config::{
    ClientConfig, DedupConfig, LatencyConfig, QueueConfig, ReconnectionConfig,
};

/// Short, jitter-free backoff: 100ms, 200ms, 400ms, then the 1s ceiling.
pub fn reconnection(max_attempts: u32) -> ReconnectionConfig {
    ReconnectionConfig {
        initial_delay_ms: 100,
        max_delay_ms: 1_000,
        backoff_multiplier: 2.0,
        jitter_ratio: 0.0,
        max_attempts,
    }
}

/// Latency settings with a 5s ping interval and the default thresholds.
pub fn latency() -> LatencyConfig {
    LatencyConfig {
        ping_interval_ms: 5_000,
        ..LatencyConfig::default()
    }
}

/// Client config built from the helpers above with a 1s connect timeout.
pub fn client() -> ClientConfig {
    ClientConfig {
        connect_timeout: Duration::from_secs(1),
        reconnection: reconnection(5),
        latency: latency(),
        dedup: DedupConfig::default(),
        queue: QueueConfig::default(),
    }
}
