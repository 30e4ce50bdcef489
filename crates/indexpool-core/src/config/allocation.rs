//! Allocation retry and limit configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Default ceiling on a single request's quantity.
pub const DEFAULT_MAX_QUANTITY: u32 = 1_000;

/// Settings for the allocation engine.
///
/// The engine never reads these from the process environment itself;
/// the binary loads them once and injects them at construction.
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
pub struct AllocationConfig {
    /// Total attempts per call when the store reports transient errors.
    #[serde(default = "default_max_retries")]
    #[validate(range(min = 1, max = 20))]
    pub max_retries: u32,
    /// Base backoff in milliseconds; attempt `n` sleeps `base * 2^n`.
    #[serde(default = "default_base_backoff_ms")]
    #[validate(range(max = 60_000))]
    pub base_backoff_ms: u64,
    /// Upper bound for a single backoff sleep in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    #[validate(range(max = 600_000))]
    pub max_backoff_ms: u64,
    /// Largest quantity a single call may request.
    #[serde(default = "default_max_quantity")]
    #[validate(range(min = 1))]
    pub max_quantity: u32,
    /// Optional per-attempt timeout in milliseconds. A timed-out attempt
    /// is treated as transient.
    #[serde(default)]
    pub attempt_timeout_ms: Option<u64>,
}

impl AllocationConfig {
    /// Base backoff as a [`Duration`].
    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    /// Backoff cap as a [`Duration`].
    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    /// Per-attempt timeout as a [`Duration`], if configured.
    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_quantity: default_max_quantity(),
            attempt_timeout_ms: None,
        }
    }
}

fn default_max_retries() -> u32 {
    5
}

fn default_base_backoff_ms() -> u64 {
    50
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

fn default_max_quantity() -> u32 {
    DEFAULT_MAX_QUANTITY
}
