//! Millisecond wall clock anchored to tokio's monotonic time.

use chrono::Utc;
use tokio::time::Instant;

/// Epoch-millisecond clock that advances with `tokio::time`.
///
/// The wall-clock reading is taken once at construction; later readings add
/// monotonic elapsed time, so pausing or advancing tokio time in tests moves
/// this clock too.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    origin_epoch_ms: i64,
    origin: Instant,
}

impl Clock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin_epoch_ms: Utc::now().timestamp_millis(),
            origin: Instant::now(),
        }
    }

    #[must_use]
    pub fn now_ms(&self) -> i64 {
        let elapsed = i64::try_from(self.origin.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.origin_epoch_ms.saturating_add(elapsed)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn follows_tokio_time() {
        let clock = Clock::new();
        let start = clock.now_ms();

        tokio::time::advance(Duration::from_millis(250)).await;

        assert_eq!(clock.now_ms() - start, 250);
    }
}
