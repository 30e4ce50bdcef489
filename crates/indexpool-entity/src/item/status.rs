//! Item status enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Allocation status of a pool item.
///
/// The only transition modelled here is `Available -> Allocated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "item_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// The item may be claimed.
    Available,
    /// The item belongs to an owner.
    Allocated,
}

impl ItemStatus {
    /// Whether an item in this status may be selected as a candidate.
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }

    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Allocated => "allocated",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = indexpool_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "available" => Ok(Self::Available),
            "allocated" => Ok(Self::Allocated),
            _ => Err(indexpool_core::AppError::invalid_argument(format!(
                "Invalid item status: '{s}'. Expected one of: available, allocated"
            ))),
        }
    }
}
