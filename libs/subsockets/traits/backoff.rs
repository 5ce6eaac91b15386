use rand::Rng;
use std::time::Duration;

/// Trait for defining handshake retry strategies
///
/// Implement this trait to control how the connection manager should
/// behave when a handshake attempt fails with a retryable error.
pub trait RetryStrategy: Send + Sync {
    /// Get the delay before the next handshake attempt
    ///
    /// # Arguments
    /// * `attempt` - The retry attempt number (0-indexed)
    ///
    /// # Returns
    /// * `Some(duration)` - Wait this long before retrying
    /// * `None` - Stop retrying
    fn next_delay(&self, attempt: usize) -> Option<Duration>;
}

/// Jittered exponential backoff
///
/// Delays grow as `base * 2^attempt` plus a uniform random jitter of up to
/// one `base`, capped at `max_delay` per step. Attempts are unbounded: the
/// caller only ever observes final success or a non-retryable failure. The
/// jitter avoids synchronized retry storms across many clients.
#[derive(Debug, Clone)]
pub struct JitteredBackoff {
    base: Duration,
    max_delay: Duration,
}

impl JitteredBackoff {
    /// Create a new jittered backoff strategy
    ///
    /// # Arguments
    /// * `base` - The initial delay and the jitter range
    /// * `max_delay` - The maximum delay per step
    pub fn new(base: Duration, max_delay: Duration) -> Self {
        Self { base, max_delay }
    }
}

impl Default for JitteredBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(5))
    }
}

impl RetryStrategy for JitteredBackoff {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        let base_ms = self.base.as_millis() as u64;
        let exp = base_ms.saturating_mul(2u64.saturating_pow(attempt.min(32) as u32));
        let jitter = rand::thread_rng().gen_range(0..=base_ms);
        let delay = exp
            .saturating_add(jitter)
            .min(self.max_delay.as_millis() as u64);
        Some(Duration::from_millis(delay))
    }
}

/// Fixed delay retry strategy
///
/// Always waits the same amount of time, with an optional attempt cap.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<usize>,
}

impl FixedDelay {
    pub fn new(delay: Duration, max_attempts: Option<usize>) -> Self {
        Self {
            delay,
            max_attempts,
        }
    }
}

impl RetryStrategy for FixedDelay {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        match self.max_attempts {
            Some(max) if attempt >= max => None,
            _ => Some(self.delay),
        }
    }
}
