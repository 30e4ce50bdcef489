//! Non-error results of an allocation call.

use serde::{Deserialize, Serialize};

use indexpool_entity::item::AllocatedItem;

/// What an allocation call produced.
///
/// Errors (invalid arguments, store failures, cancellation) are reported
/// through `AppError`; these are the three non-error outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AllocationOutcome {
    /// Items were claimed, ascending by index. May hold fewer items than
    /// requested when the pool ran short.
    Allocated {
        /// The claimed items.
        items: Vec<AllocatedItem>,
    },
    /// No item matched the category and filters.
    Exhausted,
    /// A concurrent allocator claimed some candidates first. Nothing was
    /// committed; the caller may retry with a fresh call.
    Conflict {
        /// Candidates selected for the claim.
        requested: usize,
        /// Candidates the claim actually updated.
        claimed: u64,
    },
}

impl AllocationOutcome {
    /// The claimed items, or an empty slice.
    pub fn items(&self) -> &[AllocatedItem] {
        match self {
            Self::Allocated { items } => items,
            _ => &[],
        }
    }

    /// Consume the outcome, returning the claimed items.
    pub fn into_items(self) -> Vec<AllocatedItem> {
        match self {
            Self::Allocated { items } => items,
            _ => Vec::new(),
        }
    }

    /// Whether the race was lost.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Whether the pool had no candidates.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted)
    }

    /// Whether exactly `quantity` items were claimed.
    pub fn is_fulfilled(&self, quantity: u32) -> bool {
        self.items().len() == quantity as usize
    }
}
