//! Transactional item store contract consumed by the allocation engine.
//!
//! A store must provide sorted, limited candidate queries, multi-record
//! transactions with explicit commit/rollback, and a conditional bulk
//! update that reports how many records it actually changed.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use indexpool_core::result::AppResult;
use indexpool_core::types::{AllocationFilters, ItemId, OwnerId};
use indexpool_entity::item::Item;

pub use memory::MemoryItemStore;
#[cfg(feature = "postgres")]
pub use postgres::PgItemStore;

/// Candidate selection: `{category, status = available, filters}`,
/// ascending by index, at most `limit` rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateQuery {
    /// Category to select from.
    pub category: String,
    /// Exact-match metadata predicates.
    pub filters: AllocationFilters,
    /// Maximum number of candidates.
    pub limit: u32,
}

/// A store of pool items that can open transactions.
#[async_trait]
pub trait ItemStore: Send + Sync + std::fmt::Debug {
    /// The transaction handle this store hands out.
    type Transaction: StoreTransaction;

    /// Begin a new transaction.
    async fn begin(&self) -> AppResult<Self::Transaction>;

    /// Check that the store backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}

/// Reads and writes performed inside one store transaction.
///
/// Errors whose kind is `TransientStore` signal that the transaction was
/// aborted by a concurrent write and may succeed if retried from scratch.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Select available candidates, ascending by index.
    async fn find_candidates(&mut self, query: &CandidateQuery) -> AppResult<Vec<Item>>;

    /// Mark every listed item that is still available as allocated to
    /// `owner`. Returns the number of items actually updated.
    async fn claim(
        &mut self,
        ids: &[ItemId],
        owner: &OwnerId,
        allocated_at: DateTime<Utc>,
    ) -> AppResult<u64>;

    /// Read items by id, as seen by this transaction.
    async fn find_by_ids(&mut self, ids: &[ItemId]) -> AppResult<Vec<Item>>;

    /// Make this transaction's writes durable and visible.
    async fn commit(self) -> AppResult<()>;

    /// Discard this transaction's writes.
    async fn rollback(self) -> AppResult<()>;
}
