use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;

/// Upper bound (exclusive) of the uniform jitter added to each cooldown
/// deadline, in milliseconds.
const JITTER_MS: u64 = 500;

/// Shared cooldown window across consecutive sink failures.
///
/// The magnitude starts at the configured base on the first failure of a
/// streak, doubles on every consecutive failure and is capped at the
/// configured maximum. Zero magnitude means no active streak. The deadline
/// carries the jitter; the magnitude does not.
#[derive(Debug, Clone)]
pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
    current_ms: u64,
    until: Option<Instant>,
}

impl Backoff {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self {
            base_ms,
            max_ms,
            current_ms: 0,
            until: None,
        }
    }

    pub fn in_cooldown(&self, now: Instant) -> bool {
        self.until.is_some_and(|until| now < until)
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.until
            .map_or(Duration::ZERO, |until| until.saturating_duration_since(now))
    }

    pub fn current_ms(&self) -> u64 {
        self.current_ms
    }

    /// Records a delivery failure and moves the deadline out with fresh
    /// jitter.
    pub fn advance(&mut self, now: Instant) {
        let jitter_ms = rand::rng().random_range(0..JITTER_MS);
        self.advance_with_jitter(now, jitter_ms);
    }

    fn advance_with_jitter(&mut self, now: Instant, jitter_ms: u64) {
        self.current_ms = if self.current_ms == 0 {
            self.base_ms.min(self.max_ms)
        } else {
            self.current_ms.saturating_mul(2).min(self.max_ms)
        };
        self.until = Some(now + Duration::from_millis(self.current_ms + jitter_ms));
    }

    /// The first success after a failure streak clears the cooldown entirely.
    pub fn reset(&mut self) {
        self.current_ms = 0;
        self.until = None;
    }
}
