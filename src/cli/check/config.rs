use std::path::Path;

use crate::cli::output;
use crate::config::{Config, URL_ENV_VAR};
use crate::error::Result;

/// Validate a configuration file without connecting.
pub fn execute_config<P: AsRef<Path>>(config_path: P) -> Result<()> {
    let path = config_path.as_ref();
    output::section(&format!("Checking configuration: {}", path.display()));

    let config = Config::load(path)?;
    output::success("Configuration file is valid");

    output::section("Summary");
    output::field("url", &config.server.url);
    output::field(
        "timeout",
        format!("{}ms", config.server.connect_timeout_ms),
    );
    output::field(
        "backoff",
        format!(
            "{}ms..{}ms x{} ({} attempts)",
            config.reconnection.initial_delay_ms,
            config.reconnection.max_delay_ms,
            config.reconnection.backoff_multiplier,
            config.reconnection.max_attempts,
        ),
    );
    output::field("ping", format!("{}ms", config.latency.ping_interval_ms));
    output::field(
        "dedup",
        format!(
            "{}ms window, {} entries",
            config.dedup.window_ms, config.dedup.capacity
        ),
    );
    output::field("queue", config.queue.capacity);
    output::field("logging", &config.logging.level);

    if std::env::var(URL_ENV_VAR).is_ok() {
        output::warning(&format!("server.url overridden by {URL_ENV_VAR}"));
    }
    if config.latency.max_missed_pongs.is_none() {
        output::field("pongs", "missed pongs never force a reconnect");
    }

    println!();
    output::success("Configuration is ready to use.");
    Ok(())
}
