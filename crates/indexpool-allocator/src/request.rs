//! Allocation request.

use serde::{Deserialize, Serialize};
use validator::Validate;

use indexpool_core::error::AppError;
use indexpool_core::result::AppResult;
use indexpool_core::types::{AllocationFilters, OwnerId};

/// A request to allocate `quantity` items of `category` to `owner`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct AllocationRequest {
    /// Category to allocate from.
    #[validate(length(min = 1, max = 128))]
    pub category: String,
    /// Number of items wanted.
    #[validate(range(min = 1))]
    pub quantity: u32,
    /// Verified owner the items are allocated to.
    pub owner: OwnerId,
    /// Exact-match metadata filters.
    #[serde(default)]
    pub filters: AllocationFilters,
}

impl AllocationRequest {
    /// Create a request without filters.
    pub fn new(category: impl Into<String>, quantity: u32, owner: OwnerId) -> Self {
        Self {
            category: category.into(),
            quantity,
            owner,
            filters: AllocationFilters::default(),
        }
    }

    /// Attach metadata filters.
    pub fn with_filters(mut self, filters: AllocationFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Validate the request against the engine's quantity ceiling.
    pub fn check(&self, max_quantity: u32) -> AppResult<()> {
        self.validate()?;

        if self.category.trim().is_empty() {
            return Err(AppError::invalid_argument("Category must not be blank"));
        }
        if self.quantity > max_quantity {
            return Err(AppError::invalid_argument(format!(
                "Quantity {} exceeds the limit of {max_quantity}",
                self.quantity
            )));
        }
        self.filters.validate()
    }
}
