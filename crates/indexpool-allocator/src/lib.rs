//! # indexpool-allocator
//!
//! Allocates the lowest-index available items of a category to an owner.
//!
//! Each attempt selects candidates, claims them with a single conditional
//! bulk update, and verifies that every candidate was claimed. A short
//! claim means a concurrent allocator won the race and is reported as
//! [`AllocationOutcome::Conflict`]. Transient store aborts are retried
//! with exponential backoff when the engine owns the transaction.
//!
//! Stores plug in through [`store::ItemStore`]:
//! - [`store::memory::MemoryItemStore`] (optimistic, in-process)
//! - `store::postgres::PgItemStore` (PostgreSQL, `postgres` feature)

pub mod context;
pub mod engine;
pub mod outcome;
pub mod request;
pub mod retry;
pub mod session;
pub mod store;

pub use context::CallContext;
pub use engine::AllocationEngine;
pub use outcome::AllocationOutcome;
pub use request::AllocationRequest;
pub use retry::RetryPolicy;
pub use session::Session;
pub use store::{CandidateQuery, ItemStore, StoreTransaction};
