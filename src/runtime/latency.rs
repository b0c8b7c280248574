//! Ping/pong latency tracking and health classification.
//!
//! The monitor is a passive state machine: the connection manager owns the
//! ping timer, calls [`LatencyMonitor::on_ping`] when it fires and feeds
//! pongs back through [`LatencyMonitor::record_pong`].

use std::collections::VecDeque;

use tracing::debug;

use crate::config::LatencyConfig;
use crate::domain::HealthStatus;

/// Pings remembered while waiting for their pongs.
const MAX_OUTSTANDING_PINGS: usize = 8;

/// Outcome of a matched pong.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PongSample {
    pub rtt_ms: u64,
    pub average_ms: f64,
    pub status: HealthStatus,
}

#[derive(Debug)]
pub struct LatencyMonitor {
    config: LatencyConfig,
    running: bool,
    /// Timestamps of unanswered pings, oldest first.
    outstanding: VecDeque<i64>,
    /// Pings sent since the last matched pong, minus the one in flight.
    missed_streak: u32,
    average_ms: Option<f64>,
}

impl LatencyMonitor {
    #[must_use]
    pub fn new(config: LatencyConfig) -> Self {
        Self {
            config,
            running: false,
            outstanding: VecDeque::with_capacity(MAX_OUTSTANDING_PINGS),
            missed_streak: 0,
            average_ms: None,
        }
    }

    /// Begin a probing cycle for a fresh connection.
    pub fn start(&mut self) {
        self.running = true;
        self.outstanding.clear();
        self.missed_streak = 0;
    }

    /// Stop probing. Pongs arriving afterwards are ignored.
    pub fn stop(&mut self) {
        self.running = false;
        self.outstanding.clear();
        self.missed_streak = 0;
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    #[must_use]
    pub const fn config(&self) -> &LatencyConfig {
        &self.config
    }

    /// Register a ping sent at `now_ms` and return the timestamp to put on the wire.
    ///
    /// A previous ping still unanswered at this point counts as missed.
    pub fn on_ping(&mut self, now_ms: i64) -> i64 {
        if !self.outstanding.is_empty() {
            self.missed_streak = self.missed_streak.saturating_add(1);
            debug!(missed = self.missed_streak, "Previous ping went unanswered");
        }
        if self.outstanding.len() == MAX_OUTSTANDING_PINGS {
            self.outstanding.pop_front();
        }
        self.outstanding.push_back(now_ms);
        now_ms
    }

    /// Consecutive pings that were not answered before the next one fired.
    #[must_use]
    pub const fn missed_streak(&self) -> u32 {
        self.missed_streak
    }

    /// Whether the missed-pong streak has reached the configured limit.
    ///
    /// Always `false` when `max_missed_pongs` is unset.
    #[must_use]
    pub fn should_force_reconnect(&self) -> bool {
        self.config
            .max_missed_pongs
            .is_some_and(|max| self.missed_streak >= max)
    }

    /// Match a pong against outstanding pings and update the average.
    ///
    /// Returns `None` for pongs that match no outstanding ping. A match also
    /// discards any older outstanding pings and resets the missed streak.
    pub fn record_pong(&mut self, timestamp_ms: i64, now_ms: i64) -> Option<PongSample> {
        if !self.running {
            return None;
        }
        let position = self.outstanding.iter().position(|&sent| sent == timestamp_ms)?;
        self.outstanding.drain(..=position);
        self.missed_streak = 0;

        let rtt_ms = u64::try_from(now_ms.saturating_sub(timestamp_ms)).unwrap_or(0);
        let average_ms = self.update_average(rtt_ms);
        Some(PongSample {
            rtt_ms,
            average_ms,
            status: self.classify(rtt_ms),
        })
    }

    /// Fold a sample into the moving average; the first sample seeds it.
    fn update_average(&mut self, rtt_ms: u64) -> f64 {
        let rtt = rtt_ms as f64;
        let alpha = self.config.ema_alpha;
        let average = match self.average_ms {
            None => rtt,
            Some(previous) => alpha * rtt + (1.0 - alpha) * previous,
        };
        self.average_ms = Some(average);
        average
    }

    #[must_use]
    pub const fn classify(&self, rtt_ms: u64) -> HealthStatus {
        HealthStatus::from_latency(
            rtt_ms,
            self.config.healthy_below_ms,
            self.config.degraded_below_ms,
        )
    }

    #[must_use]
    pub const fn average_ms(&self) -> Option<f64> {
        self.average_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running() -> LatencyMonitor {
        let mut monitor = LatencyMonitor::new(LatencyConfig::default());
        monitor.start();
        monitor
    }

    fn sample(monitor: &mut LatencyMonitor, sent: i64, rtt: i64) -> PongSample {
        monitor.on_ping(sent);
        monitor.record_pong(sent, sent + rtt).unwrap()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn ema_seeds_then_blends() {
        let mut monitor = running();

        assert_close(sample(&mut monitor, 0, 100).average_ms, 100.0);
        assert_close(sample(&mut monitor, 5_000, 200).average_ms, 110.0);
        assert_close(sample(&mut monitor, 10_000, 100).average_ms, 109.0);
    }

    #[test]
    fn status_follows_latest_rtt_only() {
        let mut monitor = running();

        assert_eq!(sample(&mut monitor, 0, 99).status, HealthStatus::Healthy);
        assert_eq!(sample(&mut monitor, 1, 100).status, HealthStatus::Degraded);
        assert_eq!(sample(&mut monitor, 2, 499).status, HealthStatus::Degraded);
        assert_eq!(sample(&mut monitor, 3, 500).status, HealthStatus::Unhealthy);
        assert_eq!(sample(&mut monitor, 4, 10).status, HealthStatus::Healthy);
    }

    #[test]
    fn unmatched_pong_is_ignored() {
        let mut monitor = running();
        monitor.on_ping(1_000);

        assert!(monitor.record_pong(999, 1_050).is_none());
        assert!(monitor.average_ms().is_none());
        assert!(monitor.record_pong(1_000, 1_050).is_some());
    }

    #[test]
    fn pong_after_stop_is_ignored() {
        let mut monitor = running();
        monitor.on_ping(1_000);
        monitor.stop();

        assert!(monitor.record_pong(1_000, 1_010).is_none());
        assert!(!monitor.is_running());
    }

    #[test]
    fn late_pong_still_matches_older_ping() {
        let mut monitor = running();
        monitor.on_ping(0);
        monitor.on_ping(5_000);
        assert_eq!(monitor.missed_streak(), 1);

        let sample = monitor.record_pong(0, 6_000).unwrap();
        assert_eq!(sample.rtt_ms, 6_000);
        assert_eq!(monitor.missed_streak(), 0);
        // The newer ping is still outstanding and can match.
        assert!(monitor.record_pong(5_000, 6_010).is_some());
    }

    #[test]
    fn missed_streak_never_forces_reconnect_by_default() {
        let mut monitor = running();
        for i in 0..20 {
            monitor.on_ping(i * 5_000);
        }
        assert_eq!(monitor.missed_streak(), 19);
        assert!(!monitor.should_force_reconnect());
    }

    #[test]
    fn missed_streak_forces_reconnect_when_configured() {
        let mut monitor = LatencyMonitor::new(LatencyConfig {
            max_missed_pongs: Some(2),
            ..LatencyConfig::default()
        });
        monitor.start();

        monitor.on_ping(0);
        monitor.on_ping(5_000);
        assert!(!monitor.should_force_reconnect());
        monitor.on_ping(10_000);
        assert!(monitor.should_force_reconnect());

        monitor.start();
        assert!(!monitor.should_force_reconnect());
    }

    #[test]
    fn average_survives_restart() {
        let mut monitor = running();
        sample(&mut monitor, 0, 100);
        monitor.stop();
        monitor.start();

        assert_close(sample(&mut monitor, 10, 200).average_ms, 110.0);
    }
}
