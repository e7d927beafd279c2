//! Exponential retry delays with jitter for calls to the road router.

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
    failures: u32,
    jitter_ratio: f64,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        let base = base.max(Duration::from_millis(1));
        let max = max.max(base);
        Self {
            base,
            max,
            current: base,
            failures: 0,
            jitter_ratio: 0.2,
        }
    }

    /// Failures recorded since the last reset.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn reset(&mut self) {
        self.current = self.base;
        self.failures = 0;
    }

    /// Record a failure and return how long to wait before the next attempt.
    /// The first delay is `base`; each later one doubles up to `max`.
    pub fn fail(&mut self) -> Duration {
        let delay = if self.failures == 0 {
            self.base
        } else {
            self.current = self.current.saturating_mul(2).min(self.max);
            self.current
        };
        self.failures += 1;
        add_jitter(delay, self.jitter_ratio)
    }
}

fn add_jitter(delay: Duration, ratio: f64) -> Duration {
    if !(0.0..=1.0).contains(&ratio) {
        return delay;
    }
    let jitter_ms_max = ((delay.as_millis() as f64) * ratio) as u64;
    if jitter_ms_max == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::rng().random_range(0..=jitter_ms_max))
}
