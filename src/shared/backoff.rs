//! Exponential backoff shared by the HTTP engine and the realtime reconnect loop.

use std::time::Duration;

/// Exponential backoff with a ceiling and optional additive jitter.
///
/// `delay = min(base * 2^exponent, max) + random(0..=jitter)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay for exponent 0.
    pub base: Duration,
    /// Ceiling applied before jitter is added.
    pub max: Duration,
    /// Upper bound of the random delay added on top. Zero disables jitter.
    pub jitter: Duration,
}

impl BackoffPolicy {
    /// Policy used between HTTP attempts: 1s base, 30s cap, up to 1s of jitter.
    pub fn http() -> Self {
        Self {
            base: Duration::from_millis(1_000),
            max: Duration::from_millis(30_000),
            jitter: Duration::from_millis(1_000),
        }
    }

    /// Policy used between realtime reconnect attempts. Deterministic (no jitter).
    pub fn reconnect(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            jitter: Duration::ZERO,
        }
    }

    /// Compute the delay for the given exponent.
    pub fn delay_for_attempt(&self, exponent: u32) -> Duration {
        // 2^31 ms already exceeds any sane ceiling; clamp so the shift never overflows.
        let factor = 1u64 << exponent.min(31);
        let base_ms = self.base.as_millis().min(u64::MAX as u128) as u64;
        let exp_ms = base_ms.saturating_mul(factor);
        let capped = Duration::from_millis(exp_ms).min(self.max);

        if self.jitter.is_zero() {
            return capped;
        }

        let jitter_ms = self.jitter.as_millis().min(u64::MAX as u128) as u64;
        capped + Duration::from_millis(rand::random::<u64>() % (jitter_ms + 1))
    }

    /// Delay before retry number `attempt` (0-indexed).
    ///
    /// A server-supplied hint (e.g. `Retry-After`) always wins over the computed value.
    pub fn retry_delay(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        hint.unwrap_or_else(|| self.delay_for_attempt(attempt))
    }

    /// Delay before reconnect attempt `attempt` (1-indexed, post-increment counter).
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        self.delay_for_attempt(attempt.saturating_sub(1))
    }
}
