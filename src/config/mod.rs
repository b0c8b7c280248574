//! Configuration loading and validation.
//!
//! Configuration is loaded from a TOML file. Every section is optional and
//! falls back to defaults; the daemon URL can be overridden with the
//! `DAEMON_LINK_URL` environment variable.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::{ConfigError, Result};

mod connection;
mod logging;

pub use connection::{DedupConfig, LatencyConfig, QueueConfig, ReconnectionConfig, ServerConfig};
pub use logging::LoggingConfig;

/// Environment variable that overrides `server.url`.
pub const URL_ENV_VAR: &str = "DAEMON_LINK_URL";

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub reconnection: ReconnectionConfig,
    #[serde(default)]
    pub latency: LatencyConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings consumed by a running client, independent of where they came from.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub connect_timeout: Duration,
    pub reconnection: ReconnectionConfig,
    pub latency: LatencyConfig,
    pub dedup: DedupConfig,
    pub queue: QueueConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Config::default().client_config()
    }
}

impl ClientConfig {
    /// Check the values the connection manager depends on.
    ///
    /// Errors name the TOML field the value came from.
    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout.is_zero() {
            return Err(invalid("connect_timeout_ms", "must be greater than zero"));
        }

        let reconnection = &self.reconnection;
        if reconnection.backoff_multiplier < 1.0 {
            return Err(invalid("backoff_multiplier", "must be at least 1.0"));
        }
        if !(0.0..=1.0).contains(&reconnection.jitter_ratio) {
            return Err(invalid("jitter_ratio", "must be within 0.0..=1.0"));
        }
        if reconnection.initial_delay_ms > reconnection.max_delay_ms {
            return Err(invalid("initial_delay_ms", "must not exceed max_delay_ms"));
        }

        let latency = &self.latency;
        if latency.ping_interval_ms == 0 {
            return Err(invalid("ping_interval_ms", "must be greater than zero"));
        }
        if !(latency.ema_alpha > 0.0 && latency.ema_alpha <= 1.0) {
            return Err(invalid("ema_alpha", "must be within (0.0, 1.0]"));
        }
        if latency.healthy_below_ms >= latency.degraded_below_ms {
            return Err(invalid("healthy_below_ms", "must be below degraded_below_ms"));
        }
        if latency.max_missed_pongs == Some(0) {
            return Err(invalid("max_missed_pongs", "must be at least 1 when set"));
        }

        if self.dedup.capacity == 0 {
            return Err(invalid("dedup.capacity", "must be greater than zero"));
        }
        if self.queue.capacity == 0 {
            return Err(invalid("queue.capacity", "must be greater than zero"));
        }
        Ok(())
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let mut config = Self::parse(&content)?;

        if let Ok(url) = std::env::var(URL_ENV_VAR) {
            config.server.url = url;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document without touching the environment or validating.
    #[allow(clippy::result_large_err)]
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content).map_err(ConfigError::Parse)?)
    }

    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> Result<()> {
        if self.server.url.is_empty() {
            return Err(ConfigError::MissingField { field: "url" }.into());
        }
        let url = url::Url::parse(&self.server.url).map_err(|e| ConfigError::InvalidValue {
            field: "url",
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(invalid("url", format!("unsupported scheme '{}'", url.scheme())));
        }
        self.client_config().validate()
    }

    /// Extract the runtime settings for [`crate::runtime::Client`].
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            connect_timeout: self.server.connect_timeout(),
            reconnection: self.reconnection.clone(),
            latency: self.latency.clone(),
            dedup: self.dedup.clone(),
            queue: self.queue.clone(),
        }
    }

    /// Initialize logging with the configured settings.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> crate::error::Error {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
    .into()
}
