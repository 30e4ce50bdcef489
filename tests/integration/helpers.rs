//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use indexpool_allocator::store::MemoryItemStore;
use indexpool_allocator::store::memory::MemoryTransaction;
use indexpool_allocator::{
    AllocationEngine, AllocationRequest, CandidateQuery, ItemStore, RetryPolicy, StoreTransaction,
};
use indexpool_core::error::AppError;
use indexpool_core::result::AppResult;
use indexpool_core::types::{ItemId, OwnerId};
use indexpool_entity::item::{Item, ItemMetadata, NewItem};

/// Category used by most tests.
pub const GOLD: &str = "gold";

/// Parse an owner id.
pub fn owner(raw: &str) -> OwnerId {
    OwnerId::parse(raw).expect("valid owner id")
}

/// A request for `quantity` items of `category`.
pub fn request(category: &str, quantity: u32, owner_id: &str) -> AllocationRequest {
    AllocationRequest::new(category, quantity, owner(owner_id))
}

/// A retry policy with a short, deterministic backoff.
pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_millis(1))
}

/// Seed `indices` into `category` with no metadata.
pub async fn seed(
    store: &MemoryItemStore,
    category: &str,
    indices: impl IntoIterator<Item = i64>,
) -> Vec<Item> {
    store
        .seed(indices.into_iter().map(|i| NewItem::new(category, i)).collect())
        .await
        .expect("seed items")
}

/// Seed one item with metadata.
pub async fn seed_with(
    store: &MemoryItemStore,
    category: &str,
    index: i64,
    metadata: ItemMetadata,
) -> Item {
    let mut created = store
        .seed(vec![NewItem::new(category, index).with_metadata(metadata)])
        .await
        .expect("seed item");
    created.remove(0)
}

/// A memory store holding `gold` items `1..=count`.
pub async fn gold_store(count: i64) -> Arc<MemoryItemStore> {
    let store = MemoryItemStore::new();
    seed(&store, GOLD, 1..=count).await;
    Arc::new(store)
}

/// An engine over `store` with a fast retry policy.
pub fn engine<S: ItemStore>(store: Arc<S>, max_attempts: u32) -> AllocationEngine<S> {
    AllocationEngine::new(store, fast_policy(max_attempts))
}

/// Owner used by the concurrent rival in [`FlakyStore::race_next_claim`].
pub fn owner_of_rival() -> OwnerId {
    owner("rival")
}

/// Faults injected by [`FlakyStore`], consumed in order.
#[derive(Debug, Default)]
pub struct Faults {
    /// Remaining candidate queries that fail with a transient error.
    transient: AtomicU32,
    /// Every candidate query fails with a fatal database error.
    fatal: AtomicBool,
    /// Every candidate query stalls for this many milliseconds first.
    stall_ms: AtomicU32,
    /// The next claim loses its first candidate to a concurrent commit.
    race_next_claim: AtomicBool,
    /// Every claim stalls for this many milliseconds after it is applied.
    stall_after_claim_ms: AtomicU32,
    /// Every commit stalls for this many milliseconds after it is durable.
    commit_ack_ms: AtomicU32,
    /// Transactions begun.
    begun: AtomicU32,
    /// Transactions committed.
    committed: AtomicU32,
    /// Transactions rolled back.
    rolled_back: AtomicU32,
}

impl Faults {
    pub fn begun(&self) -> u32 {
        self.begun.load(Ordering::SeqCst)
    }

    pub fn committed(&self) -> u32 {
        self.committed.load(Ordering::SeqCst)
    }

    pub fn rolled_back(&self) -> u32 {
        self.rolled_back.load(Ordering::SeqCst)
    }
}

/// Memory store wrapper that fails candidate queries on demand.
#[derive(Debug, Clone)]
pub struct FlakyStore {
    inner: MemoryItemStore,
    faults: Arc<Faults>,
}

impl FlakyStore {
    pub fn new(inner: MemoryItemStore) -> Self {
        Self {
            inner,
            faults: Arc::new(Faults::default()),
        }
    }

    /// Fail the next `n` candidate queries with a transient error.
    pub fn fail_transient(self, n: u32) -> Self {
        self.faults.transient.store(n, Ordering::SeqCst);
        self
    }

    /// Fail every candidate query with a fatal error.
    pub fn fail_fatal(self) -> Self {
        self.faults.fatal.store(true, Ordering::SeqCst);
        self
    }

    /// Delay every candidate query.
    pub fn stall(self, delay: Duration) -> Self {
        self.faults
            .stall_ms
            .store(delay.as_millis() as u32, Ordering::SeqCst);
        self
    }

    /// Delay every claim after it has been applied to the transaction.
    pub fn stall_after_claim(self, delay: Duration) -> Self {
        self.faults
            .stall_after_claim_ms
            .store(delay.as_millis() as u32, Ordering::SeqCst);
        self
    }

    /// Delay the acknowledgement of every commit after it is durable.
    pub fn slow_commit_ack(self, delay: Duration) -> Self {
        self.faults
            .commit_ack_ms
            .store(delay.as_millis() as u32, Ordering::SeqCst);
        self
    }

    /// Let a concurrent transaction commit the first candidate of the
    /// next claim just before it runs.
    pub fn race_next_claim(self) -> Self {
        self.faults.race_next_claim.store(true, Ordering::SeqCst);
        self
    }

    pub fn inner(&self) -> &MemoryItemStore {
        &self.inner
    }

    pub fn faults(&self) -> &Faults {
        &self.faults
    }
}

#[async_trait]
impl ItemStore for FlakyStore {
    type Transaction = FlakyTransaction;

    async fn begin(&self) -> AppResult<FlakyTransaction> {
        self.faults.begun.fetch_add(1, Ordering::SeqCst);
        Ok(FlakyTransaction {
            inner: self.inner.begin().await?,
            store: self.inner.clone(),
            faults: Arc::clone(&self.faults),
        })
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }
}

/// Transaction handed out by [`FlakyStore`].
#[derive(Debug)]
pub struct FlakyTransaction {
    inner: MemoryTransaction,
    store: MemoryItemStore,
    faults: Arc<Faults>,
}

#[async_trait]
impl StoreTransaction for FlakyTransaction {
    async fn find_candidates(&mut self, query: &CandidateQuery) -> AppResult<Vec<Item>> {
        stall_for(&self.faults.stall_ms).await;
        if self.faults.fatal.load(Ordering::SeqCst) {
            return Err(AppError::database("Connection reset by peer"));
        }
        let consumed = self
            .faults
            .transient
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if consumed {
            return Err(AppError::transient(
                "could not serialize access due to concurrent update",
            ));
        }
        self.inner.find_candidates(query).await
    }

    async fn claim(
        &mut self,
        ids: &[ItemId],
        owner: &OwnerId,
        allocated_at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let raced = self.faults.race_next_claim.swap(false, Ordering::SeqCst);
        if let (true, Some(first)) = (raced, ids.first()) {
            let mut rival = self.store.begin().await?;
            rival
                .claim(std::slice::from_ref(first), &owner_of_rival(), Utc::now())
                .await?;
            rival.commit().await?;
        }
        let claimed = self.inner.claim(ids, owner, allocated_at).await?;
        stall_for(&self.faults.stall_after_claim_ms).await;
        Ok(claimed)
    }

    async fn find_by_ids(&mut self, ids: &[ItemId]) -> AppResult<Vec<Item>> {
        self.inner.find_by_ids(ids).await
    }

    async fn commit(self) -> AppResult<()> {
        self.faults.committed.fetch_add(1, Ordering::SeqCst);
        self.inner.commit().await?;
        stall_for(&self.faults.commit_ack_ms).await;
        Ok(())
    }

    async fn rollback(self) -> AppResult<()> {
        self.faults.rolled_back.fetch_add(1, Ordering::SeqCst);
        self.inner.rollback().await
    }
}

async fn stall_for(millis: &AtomicU32) {
    let millis = millis.load(Ordering::SeqCst);
    if millis > 0 {
        tokio::time::sleep(Duration::from_millis(u64::from(millis))).await;
    }
}
