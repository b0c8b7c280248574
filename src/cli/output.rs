//! Shared CLI output helpers for consistent operator-facing text.

use std::fmt::Display;

use owo_colors::OwoColorize;

use crate::domain::{ConnectionHealth, HealthStatus};

/// Print the application header with name and version.
pub fn header(version: &str) {
    println!("{} {}", "daemon-link".bold(), version.dimmed());
    println!();
}

/// Print a section header.
pub fn section(title: &str) {
    println!();
    println!("{}", title.bold());
}

/// Print a labeled value.
pub fn field(label: &str, value: impl Display) {
    println!("  {:<12} {}", label.dimmed(), value);
}

/// Print a success line.
pub fn success(message: &str) {
    println!("  {} {}", "✓".green(), message);
}

/// Print a warning line.
pub fn warning(message: &str) {
    println!("  {} {}", "⚠".yellow(), message);
}

/// Print an error line.
pub fn error(message: &str) {
    eprintln!("  {} {}", "×".red(), message);
}

/// Print an inbound event line.
pub fn event(timestamp: &str, name: &str, message: impl Display) {
    println!("  {} {} {}", timestamp.dimmed(), name.cyan(), message);
}

/// Print one health line, colored by status.
pub fn health(timestamp: &str, health: &ConnectionHealth) {
    let status = health.status.as_str();
    let status = match health.status {
        HealthStatus::Healthy => status.green().to_string(),
        HealthStatus::Degraded => status.yellow().to_string(),
        HealthStatus::Unhealthy => status.red().to_string(),
        HealthStatus::Disconnected => status.dimmed().to_string(),
    };
    let latency = health
        .latency_ms
        .map_or_else(|| "-".to_string(), |ms| format!("{ms}ms"));

    println!(
        "  {} {} latency={} queued={} failures={} reconnects={}",
        timestamp.dimmed(),
        status,
        latency,
        health.queue_size,
        health.consecutive_failures,
        health.reconnect_count,
    );
}
