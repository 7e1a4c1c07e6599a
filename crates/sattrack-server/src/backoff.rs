//! Exponential retry delay with jitter for loops that write to storage.

use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
    failures: u32,
    retry_at: Instant,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        let base = base.max(Duration::from_millis(1));
        Self {
            base,
            max: max.max(base),
            current: base,
            failures: 0,
            retry_at: Instant::now(),
        }
    }

    pub fn ready(&self) -> bool {
        Instant::now() >= self.retry_at
    }

    /// Consecutive failures since the last success.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn succeed(&mut self) {
        self.current = self.base;
        self.failures = 0;
        self.retry_at = Instant::now();
    }

    /// Record a failure and return the delay before the next attempt.
    pub fn fail(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        self.current = self.current.saturating_mul(2).min(self.max);
        let delay = jitter(self.current);
        self.retry_at = Instant::now() + delay;
        delay
    }
}

/// Up to 20% extra delay.
fn jitter(delay: Duration) -> Duration {
    let spread_ms = delay.as_millis() as u64 / 5;
    if spread_ms == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::rng().random_range(0..=spread_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn starts_ready_and_blocks_after_failure() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(1));
        assert!(backoff.ready());

        let delay = backoff.fail();
        assert!(delay >= Duration::from_millis(200));
        assert!(!backoff.ready());
        assert_eq!(backoff.failures(), 1);

        tokio::time::advance(delay).await;
        assert!(backoff.ready());
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_delay() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(10));
        backoff.fail();
        backoff.fail();
        backoff.succeed();
        assert!(backoff.ready());
        assert_eq!(backoff.failures(), 0);

        let delay = backoff.fail();
        assert!(delay < Duration::from_millis(250));
    }

    #[test]
    fn delay_saturates_at_max() {
        let mut backoff = Backoff::new(Duration::from_millis(10), Duration::from_millis(20));
        for _ in 0..5 {
            let delay = backoff.fail();
            assert!(delay >= Duration::from_millis(20));
            assert!(delay <= Duration::from_millis(24));
        }
    }
}
