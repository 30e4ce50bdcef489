//! Pool statistics.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Per-category item counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PoolStats {
    /// Category name.
    pub category: String,
    /// Total seeded items.
    pub total: i64,
    /// Items still available.
    pub available: i64,
    /// Items allocated to an owner.
    pub allocated: i64,
}

impl PoolStats {
    /// Fraction of the category that has been allocated, in `[0, 1]`.
    pub fn utilization(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.allocated as f64 / self.total as f64
        }
    }
}
