//! Connection-level tuning: reconnection, latency probing, dedup and queueing.

use std::time::Duration;

use serde::Deserialize;

/// WebSocket server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Daemon WebSocket endpoint (e.g., `ws://127.0.0.1:4000/ws`).
    #[serde(default = "default_url")]
    pub url: String,
    /// Upper bound on a single connection attempt (milliseconds).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_url() -> String {
    "ws://127.0.0.1:4000/ws".into()
}

const fn default_connect_timeout_ms() -> u64 {
    20_000
}

impl ServerConfig {
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// Reconnection and backoff configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectionConfig {
    /// Delay before the first retry (milliseconds).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Ceiling for the retry delay, jitter included (milliseconds).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Multiplier applied to the delay after each failed attempt.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Fraction of the base delay added as random jitter (0.0 disables).
    #[serde(default)]
    pub jitter_ratio: f64,
    /// Retries allowed after a failure before giving up for good.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

const fn default_initial_delay_ms() -> u64 {
    1000
}

const fn default_max_delay_ms() -> u64 {
    5000
}

const fn default_backoff_multiplier() -> f64 {
    2.0
}

const fn default_max_attempts() -> u32 {
    5
}

impl Default for ReconnectionConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter_ratio: 0.0,
            max_attempts: default_max_attempts(),
        }
    }
}

/// Ping/pong probe and health classification settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LatencyConfig {
    /// Interval between pings while connected (milliseconds).
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
    /// Smoothing factor for the moving average, in `(0, 1]`.
    #[serde(default = "default_ema_alpha")]
    pub ema_alpha: f64,
    /// RTT strictly below this is healthy (milliseconds).
    #[serde(default = "default_healthy_below_ms")]
    pub healthy_below_ms: u64,
    /// RTT strictly below this (and not healthy) is degraded (milliseconds).
    #[serde(default = "default_degraded_below_ms")]
    pub degraded_below_ms: u64,
    /// Consecutive unanswered pings that force a reconnect. Unset disables.
    #[serde(default)]
    pub max_missed_pongs: Option<u32>,
}

const fn default_ping_interval_ms() -> u64 {
    5000
}

const fn default_ema_alpha() -> f64 {
    0.1
}

const fn default_healthy_below_ms() -> u64 {
    100
}

const fn default_degraded_below_ms() -> u64 {
    500
}

impl LatencyConfig {
    #[must_use]
    pub const fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            ping_interval_ms: default_ping_interval_ms(),
            ema_alpha: default_ema_alpha(),
            healthy_below_ms: default_healthy_below_ms(),
            degraded_below_ms: default_degraded_below_ms(),
            max_missed_pongs: None,
        }
    }
}

/// Inbound duplicate suppression settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DedupConfig {
    /// Events with the same id and kind within this span are duplicates (milliseconds).
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Maximum number of remembered events.
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,
}

const fn default_window_ms() -> u64 {
    30_000
}

const fn default_history_capacity() -> usize {
    1000
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            capacity: default_history_capacity(),
        }
    }
}

/// Offline outbound queue settings.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of pending outbound messages.
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
}

const fn default_queue_capacity() -> usize {
    100
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
        }
    }
}
