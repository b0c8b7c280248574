//! Exponential reconnect backoff with a ceiling and an attempt budget.

use std::time::Duration;

use rand::Rng;

use crate::config::ReconnectionConfig;

/// Retry schedule for one reconnect sequence.
///
/// Attempt `n` (1-based) waits `initial * multiplier^(n-1)` plus up to
/// `jitter_ratio` of that as random jitter, never exceeding `max_delay_ms`.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: ReconnectionConfig,
    attempts: u32,
}

impl Backoff {
    #[must_use]
    pub const fn new(config: ReconnectionConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    /// Start a fresh sequence after a successful connection.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Retries scheduled in the current sequence.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.attempts >= self.config.max_attempts
    }

    /// Claim the next retry, returning its 1-based number and delay.
    ///
    /// Returns `None` once the attempt budget is spent.
    pub fn next_attempt(&mut self) -> Option<(u32, Duration)> {
        if self.is_exhausted() {
            return None;
        }
        self.attempts += 1;
        Some((self.attempts, self.delay_for(self.attempts)))
    }

    /// Delay for a given 1-based attempt, jitter included and capped.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay_ms(attempt);
        let jitter_ms = self.jitter_ms(base_ms);
        Duration::from_millis(base_ms.saturating_add(jitter_ms).min(self.config.max_delay_ms))
    }

    fn base_delay_ms(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = self.config.initial_delay_ms as f64 * self.config.backoff_multiplier.powi(exponent);
        if scaled >= self.config.max_delay_ms as f64 {
            self.config.max_delay_ms
        } else {
            scaled as u64
        }
    }

    /// Random jitter to keep many clients from reconnecting in lockstep.
    fn jitter_ms(&self, base_ms: u64) -> u64 {
        let range_ms = (base_ms as f64 * self.config.jitter_ratio) as u64;
        if range_ms == 0 {
            return 0;
        }
        rand::thread_rng().gen_range(0..=range_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ReconnectionConfig {
        ReconnectionConfig {
            initial_delay_ms: 1000,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
            jitter_ratio: 0.0,
            max_attempts: 6,
        }
    }

    #[test]
    fn delays_double_until_ceiling() {
        let mut backoff = Backoff::new(config());
        let delays: Vec<u64> = std::iter::from_fn(|| backoff.next_attempt())
            .map(|(_, d)| d.as_millis() as u64)
            .collect();

        assert_eq!(delays, vec![1000, 2000, 4000, 5000, 5000, 5000]);
    }

    #[test]
    fn budget_is_enforced() {
        let mut backoff = Backoff::new(ReconnectionConfig {
            max_attempts: 2,
            ..config()
        });

        assert_eq!(backoff.next_attempt().map(|(n, _)| n), Some(1));
        assert_eq!(backoff.next_attempt().map(|(n, _)| n), Some(2));
        assert!(backoff.is_exhausted());
        assert!(backoff.next_attempt().is_none());
        assert_eq!(backoff.attempts(), 2);
    }

    #[test]
    fn reset_starts_over() {
        let mut backoff = Backoff::new(config());
        backoff.next_attempt();
        backoff.next_attempt();
        backoff.reset();

        assert_eq!(backoff.attempts(), 0);
        assert_eq!(
            backoff.next_attempt(),
            Some((1, Duration::from_millis(1000)))
        );
    }

    #[test]
    fn jitter_is_bounded_by_ceiling() {
        let backoff = Backoff::new(ReconnectionConfig {
            jitter_ratio: 0.5,
            ..config()
        });

        for _ in 0..50 {
            let first = backoff.delay_for(1).as_millis() as u64;
            assert!((1000..=1500).contains(&first), "delay was {first}ms");

            let capped = backoff.delay_for(3).as_millis() as u64;
            assert!((4000..=5000).contains(&capped), "delay was {capped}ms");

            assert_eq!(backoff.delay_for(10), Duration::from_millis(5000));
        }
    }

    #[test]
    fn huge_attempt_numbers_do_not_overflow() {
        let backoff = Backoff::new(config());
        assert_eq!(backoff.delay_for(u32::MAX), Duration::from_millis(5000));
    }

    #[test]
    fn zero_budget_never_retries() {
        let mut backoff = Backoff::new(ReconnectionConfig {
            max_attempts: 0,
            ..config()
        });
        assert!(backoff.is_exhausted());
        assert!(backoff.next_attempt().is_none());
    }
}
