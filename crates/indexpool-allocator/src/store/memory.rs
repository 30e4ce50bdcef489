//! In-memory item store with optimistic transactions.
//!
//! Transactions buffer their claims. A claim only counts items whose
//! committed status is still available, and commit re-validates every
//! buffered item under the store lock: if another transaction committed
//! one of them first, the commit fails with a transient write conflict.
//! Dropping or rolling back a transaction discards its buffer.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use indexpool_core::error::AppError;
use indexpool_core::result::AppResult;
use indexpool_core::types::{ItemId, OwnerId};
use indexpool_entity::item::{Item, ItemStatus, NewItem, PoolStats};

use super::{CandidateQuery, ItemStore, StoreTransaction};

/// Committed store contents.
#[derive(Debug, Default)]
struct InnerState {
    /// Items keyed by `(category, index)` so a category scan is sorted.
    items: BTreeMap<(String, i64), Item>,
    /// Primary key lookup.
    keys: HashMap<ItemId, (String, i64)>,
}

impl InnerState {
    fn get(&self, id: &ItemId) -> Option<&Item> {
        self.keys.get(id).and_then(|key| self.items.get(key))
    }

    fn get_mut(&mut self, id: &ItemId) -> Option<&mut Item> {
        let key = self.keys.get(id)?;
        self.items.get_mut(key)
    }
}

/// Transaction counters, useful for asserting lifecycle ownership.
#[derive(Debug, Default)]
pub struct MemoryStoreMetrics {
    begun: AtomicU64,
    committed: AtomicU64,
    rolled_back: AtomicU64,
    write_conflicts: AtomicU64,
}

impl MemoryStoreMetrics {
    /// Transactions begun.
    pub fn begun(&self) -> u64 {
        self.begun.load(Ordering::Relaxed)
    }

    /// Transactions committed successfully.
    pub fn committed(&self) -> u64 {
        self.committed.load(Ordering::Relaxed)
    }

    /// Transactions rolled back explicitly.
    pub fn rolled_back(&self) -> u64 {
        self.rolled_back.load(Ordering::Relaxed)
    }

    /// Commits rejected because of a concurrent writer.
    pub fn write_conflicts(&self) -> u64 {
        self.write_conflicts.load(Ordering::Relaxed)
    }
}

/// In-memory item store.
///
/// Suitable for tests and single-process use.
#[derive(Debug, Clone, Default)]
pub struct MemoryItemStore {
    state: Arc<Mutex<InnerState>>,
    metrics: Arc<MemoryStoreMetrics>,
}

impl MemoryItemStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert new items. Fails without inserting anything if any
    /// `(category, index)` pair is already taken.
    pub async fn seed(&self, new_items: Vec<NewItem>) -> AppResult<Vec<Item>> {
        let mut state = self.state.lock().await;

        let mut seen = std::collections::HashSet::new();
        for new in &new_items {
            let key = (new.category.clone(), new.index);
            if state.items.contains_key(&key) || !seen.insert(key) {
                return Err(AppError::invalid_argument(format!(
                    "Item with index {} already exists in category '{}'",
                    new.index, new.category
                )));
            }
        }

        let now = Utc::now();
        let mut created = Vec::with_capacity(new_items.len());
        for new in new_items {
            let item = Item {
                id: ItemId::new(),
                category: new.category,
                index: new.index,
                status: ItemStatus::Available,
                owner_id: None,
                allocated_at: None,
                metadata: new.metadata,
                created_at: now,
            };
            let key = (item.category.clone(), item.index);
            state.keys.insert(item.id, key.clone());
            state.items.insert(key, item.clone());
            created.push(item);
        }

        debug!(count = created.len(), "Seeded items");
        Ok(created)
    }

    /// Fetch the committed state of an item.
    pub async fn get(&self, id: &ItemId) -> Option<Item> {
        self.state.lock().await.get(id).cloned()
    }

    /// All committed items of a category, ascending by index.
    pub async fn items(&self, category: &str) -> Vec<Item> {
        let state = self.state.lock().await;
        category_range(&state, category).cloned().collect()
    }

    /// Committed counts for a category.
    pub async fn stats(&self, category: &str) -> PoolStats {
        let state = self.state.lock().await;
        let (mut total, mut available) = (0i64, 0i64);
        for item in category_range(&state, category) {
            total += 1;
            if item.is_available() {
                available += 1;
            }
        }
        PoolStats {
            category: category.to_string(),
            total,
            available,
            allocated: total - available,
        }
    }

    /// Transaction counters.
    pub fn metrics(&self) -> &MemoryStoreMetrics {
        &self.metrics
    }
}

fn category_range<'a>(state: &'a InnerState, category: &str) -> impl Iterator<Item = &'a Item> {
    state
        .items
        .range((category.to_string(), i64::MIN)..=(category.to_string(), i64::MAX))
        .map(|(_, item)| item)
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    type Transaction = MemoryTransaction;

    async fn begin(&self) -> AppResult<MemoryTransaction> {
        self.metrics.begun.fetch_add(1, Ordering::Relaxed);
        Ok(MemoryTransaction {
            state: Arc::clone(&self.state),
            metrics: Arc::clone(&self.metrics),
            pending: BTreeMap::new(),
        })
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}

/// A claim buffered until commit.
#[derive(Debug, Clone)]
struct PendingClaim {
    owner: OwnerId,
    allocated_at: DateTime<Utc>,
}

/// Optimistic transaction over a [`MemoryItemStore`].
#[derive(Debug)]
pub struct MemoryTransaction {
    state: Arc<Mutex<InnerState>>,
    metrics: Arc<MemoryStoreMetrics>,
    pending: BTreeMap<ItemId, PendingClaim>,
}

impl MemoryTransaction {
    /// Overlay this transaction's own writes onto a committed item.
    fn overlay(&self, item: &Item) -> Item {
        let mut view = item.clone();
        if let Some(claim) = self.pending.get(&item.id) {
            view.status = ItemStatus::Allocated;
            view.owner_id = Some(claim.owner.clone());
            view.allocated_at = Some(claim.allocated_at);
        }
        view
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn find_candidates(&mut self, query: &CandidateQuery) -> AppResult<Vec<Item>> {
        let state = self.state.lock().await;
        let limit = query.limit as usize;

        Ok(category_range(&state, &query.category)
            .filter(|item| item.is_available() && !self.pending.contains_key(&item.id))
            .filter(|item| query.filters.matches(item.metadata.as_map()))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn claim(
        &mut self,
        ids: &[ItemId],
        owner: &OwnerId,
        allocated_at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let state = self.state.lock().await;
        let mut updated = 0u64;

        for id in ids {
            let still_available = state.get(id).is_some_and(Item::is_available);
            if still_available && !self.pending.contains_key(id) {
                self.pending.insert(
                    *id,
                    PendingClaim {
                        owner: owner.clone(),
                        allocated_at,
                    },
                );
                updated += 1;
            }
        }

        Ok(updated)
    }

    async fn find_by_ids(&mut self, ids: &[ItemId]) -> AppResult<Vec<Item>> {
        let state = self.state.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.get(id))
            .map(|item| self.overlay(item))
            .collect())
    }

    async fn commit(self) -> AppResult<()> {
        let mut state = self.state.lock().await;

        if let Some(taken) = self
            .pending
            .keys()
            .find(|id| !state.get(id).is_some_and(Item::is_available))
        {
            self.metrics.write_conflicts.fetch_add(1, Ordering::Relaxed);
            warn!(item_id = %taken, "Write conflict on commit");
            return Err(AppError::transient(format!(
                "Write conflict: item {taken} was modified by a concurrent transaction"
            )));
        }

        for (id, claim) in &self.pending {
            if let Some(item) = state.get_mut(id) {
                item.status = ItemStatus::Allocated;
                item.owner_id = Some(claim.owner.clone());
                item.allocated_at = Some(claim.allocated_at);
            }
        }

        self.metrics.committed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn rollback(self) -> AppResult<()> {
        self.metrics.rolled_back.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
