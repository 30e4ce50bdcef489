//! Integration tests for concurrent allocation against the memory store.
//!
//! Callers here retry conflicts and exhausted transient budgets
//! themselves, the way a real client would.

mod helpers;

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;

use indexpool_allocator::store::MemoryItemStore;
use indexpool_allocator::{
    AllocationEngine, AllocationOutcome, AllocationRequest, CallContext, Session,
};
use indexpool_core::ErrorKind;

use helpers::GOLD;

/// Give up after this many client-side rounds.
const CLIENT_ROUNDS: usize = 1_000;

async fn allocate_until_settled(
    engine: AllocationEngine<MemoryItemStore>,
    request: AllocationRequest,
) -> AllocationOutcome {
    for _ in 0..CLIENT_ROUNDS {
        match engine
            .allocate(&request, Session::engine(), &CallContext::new())
            .await
        {
            Ok(AllocationOutcome::Conflict { .. }) => tokio::task::yield_now().await,
            Ok(outcome) => return outcome,
            Err(err) if err.kind == ErrorKind::TransientStore => tokio::task::yield_now().await,
            Err(err) => panic!("unexpected allocation error: {err}"),
        }
    }
    panic!("allocation did not settle after {CLIENT_ROUNDS} rounds");
}

async fn run_concurrently(
    engine: &AllocationEngine<MemoryItemStore>,
    requests: Vec<AllocationRequest>,
) -> Vec<AllocationOutcome> {
    let handles: Vec<_> = requests
        .into_iter()
        .map(|request| tokio::spawn(allocate_until_settled(engine.clone(), request)))
        .collect();

    join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("allocation task panicked"))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_single_item_allocations_partition_pool() {
    const N: i64 = 50;
    let store = helpers::gold_store(N).await;
    let engine = helpers::engine(Arc::clone(&store), 5);

    let requests = (0..N)
        .map(|i| helpers::request(GOLD, 1, &format!("owner{i}")))
        .collect();
    let outcomes = run_concurrently(&engine, requests).await;

    let mut claimed = HashSet::new();
    for outcome in &outcomes {
        let items = outcome.items();
        assert_eq!(items.len(), 1, "every caller gets exactly one item");
        assert!(claimed.insert(items[0].item_id), "item allocated twice");
    }
    assert_eq!(claimed.len(), N as usize);

    let items = store.items(GOLD).await;
    assert!(items.iter().all(|item| !item.is_available()));
    let owners: HashSet<_> = items.iter().filter_map(|i| i.owner_id.clone()).collect();
    assert_eq!(owners.len(), N as usize);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_two_callers_split_small_pool() {
    let store = helpers::gold_store(5).await;
    let engine = helpers::engine(Arc::clone(&store), 5);

    let outcomes = run_concurrently(
        &engine,
        vec![
            helpers::request(GOLD, 3, "userA"),
            helpers::request(GOLD, 3, "userB"),
        ],
    )
    .await;

    let mut sizes: Vec<usize> = outcomes.iter().map(|o| o.items().len()).collect();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![2, 3]);

    let mut all: Vec<i64> = Vec::new();
    for outcome in &outcomes {
        let indices: Vec<i64> = outcome.items().iter().map(|i| i.index).collect();
        let mut sorted = indices.clone();
        sorted.sort_unstable();
        assert_eq!(indices, sorted, "items returned in ascending index order");
        all.extend(indices);
    }
    all.sort_unstable();
    assert_eq!(all, vec![1, 2, 3, 4, 5]);
    assert_eq!(store.stats(GOLD).await.available, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_oversubscribed_pool_never_double_allocates() {
    let store = helpers::gold_store(20).await;
    let engine = helpers::engine(Arc::clone(&store), 5);

    let requests = (0..40)
        .map(|i| helpers::request(GOLD, 1, &format!("owner{i}")))
        .collect();
    let outcomes = run_concurrently(&engine, requests).await;

    let winners: Vec<_> = outcomes
        .iter()
        .filter(|o| !o.is_exhausted())
        .flat_map(|o| o.items().iter().map(|i| i.item_id))
        .collect();
    let unique: HashSet<_> = winners.iter().copied().collect();

    assert_eq!(winners.len(), 20);
    assert_eq!(unique.len(), 20);
    assert_eq!(outcomes.iter().filter(|o| o.is_exhausted()).count(), 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mixed_categories_do_not_interfere() {
    let store = MemoryItemStore::new();
    helpers::seed(&store, GOLD, 1..=10).await;
    helpers::seed(&store, "silver", 1..=10).await;
    let store = Arc::new(store);
    let engine = helpers::engine(Arc::clone(&store), 5);

    let requests = (0..10)
        .flat_map(|i| {
            [
                helpers::request(GOLD, 1, &format!("gold{i}")),
                helpers::request("silver", 1, &format!("silver{i}")),
            ]
        })
        .collect();
    let outcomes = run_concurrently(&engine, requests).await;

    assert!(outcomes.iter().all(|o| o.items().len() == 1));
    assert_eq!(store.stats(GOLD).await.available, 0);
    assert_eq!(store.stats("silver").await.available, 0);
}
