//! Core type definitions used across the IndexPool workspace.

pub mod filter;
pub mod id;

pub use filter::{AllocationFilters, DAY_OF_WEEK_KEY, DELIVERY_DATE_KEY};
pub use id::{ItemId, OWNER_ID_MAX_LEN, OwnerId};
