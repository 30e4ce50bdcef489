//! Bounded exponential backoff for transient store failures.

use std::time::Duration;

use indexpool_core::config::AllocationConfig;

/// Retry settings injected into the engine at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_backoff: Duration,
    max_backoff: Duration,
    attempt_timeout: Option<Duration>,
}

impl RetryPolicy {
    /// Total attempts (at least one) and base backoff. The backoff cap
    /// defaults to five seconds.
    pub fn new(max_attempts: u32, base_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff,
            max_backoff: Duration::from_secs(5),
            attempt_timeout: None,
        }
    }

    /// Cap a single backoff sleep.
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Bound each attempt; a timed-out attempt counts as transient.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Total attempts per call.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Per-attempt timeout, if any.
    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout
    }

    /// Sleep after the failed attempt numbered `attempt` (zero-based):
    /// `base * 2^attempt`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Whether another attempt is allowed after `attempt` failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(50))
    }
}

impl From<&AllocationConfig> for RetryPolicy {
    fn from(config: &AllocationConfig) -> Self {
        let policy = Self::new(config.max_retries, config.base_backoff())
            .with_max_backoff(config.max_backoff());
        match config.attempt_timeout() {
            Some(timeout) => policy.with_attempt_timeout(timeout),
            None => policy,
        }
    }
}
