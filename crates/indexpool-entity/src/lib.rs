//! # indexpool-entity
//!
//! Entity models for IndexPool. Every struct in this crate represents a
//! database table row or a value object derived from one. Database
//! entities additionally derive `sqlx::FromRow`.

pub mod item;

pub use item::{AllocatedItem, Item, ItemMetadata, ItemStatus, NewItem, PoolStats};
