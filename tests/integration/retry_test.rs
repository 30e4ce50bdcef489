//! Integration tests for bounded retries, backoff, deadlines and
//! cancellation. Time is paused so backoff sleeps complete instantly.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use indexpool_allocator::store::MemoryItemStore;
use indexpool_allocator::{AllocationEngine, CallContext, ItemStore, RetryPolicy, Session};
use indexpool_core::ErrorKind;
use indexpool_core::config::AllocationConfig;

use helpers::{FlakyStore, GOLD};

async fn flaky_gold(count: i64) -> FlakyStore {
    let inner = MemoryItemStore::new();
    helpers::seed(&inner, GOLD, 1..=count).await;
    FlakyStore::new(inner)
}

fn engine(store: &FlakyStore, policy: RetryPolicy) -> AllocationEngine<FlakyStore> {
    AllocationEngine::new(Arc::new(store.clone()), policy)
}

#[tokio::test(start_paused = true)]
async fn test_retries_are_bounded_and_error_surfaced() {
    let store = flaky_gold(3).await.fail_transient(u32::MAX);
    let engine = engine(&store, RetryPolicy::new(3, Duration::from_millis(50)));

    let err = engine
        .allocate(
            &helpers::request(GOLD, 1, "userA"),
            Session::engine(),
            &CallContext::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::TransientStore);
    assert!(err.message.contains("could not serialize access"));
    assert_eq!(store.faults().begun(), 3);
    assert_eq!(store.faults().rolled_back(), 3);
    assert_eq!(store.faults().committed(), 0);
    assert_eq!(store.inner().stats(GOLD).await.available, 3);
}

#[tokio::test(start_paused = true)]
async fn test_fatal_errors_are_not_retried() {
    let store = flaky_gold(3).await.fail_fatal();
    let engine = engine(&store, RetryPolicy::new(5, Duration::from_millis(50)));

    let err = engine
        .allocate(
            &helpers::request(GOLD, 1, "userA"),
            Session::engine(),
            &CallContext::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Database);
    assert_eq!(store.faults().begun(), 1);
    assert_eq!(store.faults().rolled_back(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_recovers_after_transient_errors() {
    let store = flaky_gold(3).await.fail_transient(2);
    let engine = engine(&store, RetryPolicy::new(5, Duration::from_millis(50)));

    let outcome = engine
        .allocate(
            &helpers::request(GOLD, 2, "userA"),
            Session::engine(),
            &CallContext::new(),
        )
        .await
        .unwrap();

    let indices: Vec<i64> = outcome.items().iter().map(|i| i.index).collect();
    assert_eq!(indices, vec![1, 2]);
    assert_eq!(store.faults().begun(), 3);
    assert_eq!(store.faults().committed(), 1);
    assert_eq!(store.faults().rolled_back(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_grows_exponentially() {
    let store = flaky_gold(1).await.fail_transient(3);
    let engine = engine(&store, RetryPolicy::new(5, Duration::from_millis(50)));

    let started = Instant::now();
    engine
        .allocate(
            &helpers::request(GOLD, 1, "userA"),
            Session::engine(),
            &CallContext::new(),
        )
        .await
        .unwrap();
    let elapsed = started.elapsed();

    // 50 + 100 + 200 ms of backoff before the fourth attempt succeeds.
    assert!(elapsed >= Duration::from_millis(350), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(400), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_backoff_is_capped() {
    let store = flaky_gold(1).await.fail_transient(3);
    let policy = RetryPolicy::new(5, Duration::from_millis(100))
        .with_max_backoff(Duration::from_millis(150));
    let engine = engine(&store, policy);

    let started = Instant::now();
    engine
        .allocate(
            &helpers::request(GOLD, 1, "userA"),
            Session::engine(),
            &CallContext::new(),
        )
        .await
        .unwrap();

    // 100 + 150 + 150 ms.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(400), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(450), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_deadline_interrupts_backoff() {
    let store = flaky_gold(1).await.fail_transient(u32::MAX);
    let engine = engine(&store, RetryPolicy::new(10, Duration::from_secs(1)));
    let ctx = CallContext::new().with_timeout(Duration::from_millis(1_500));

    let err = engine
        .allocate(&helpers::request(GOLD, 1, "userA"), Session::engine(), &ctx)
        .await
        .unwrap_err();

    // Attempts at t=0 and t=1s; the 2s sleep after the second is cut short.
    assert_eq!(err.kind, ErrorKind::DeadlineExceeded);
    assert_eq!(store.faults().begun(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_interrupts_backoff() {
    let store = flaky_gold(1).await.fail_transient(u32::MAX);
    let engine = engine(&store, RetryPolicy::new(10, Duration::from_secs(1)));
    let ctx = CallContext::new();

    let token = ctx.cancellation_token().clone();
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
    });

    let err = engine
        .allocate(&helpers::request(GOLD, 1, "userA"), Session::engine(), &ctx)
        .await
        .unwrap_err();
    canceller.await.unwrap();

    assert_eq!(err.kind, ErrorKind::Cancelled);
    assert_eq!(store.faults().begun(), 1);
    assert_eq!(store.inner().stats(GOLD).await.available, 1);
}

#[tokio::test(start_paused = true)]
async fn test_attempt_timeout_counts_as_transient() {
    let store = flaky_gold(1).await.stall(Duration::from_secs(10));
    let policy = RetryPolicy::new(2, Duration::from_millis(10))
        .with_attempt_timeout(Duration::from_millis(100));
    let engine = engine(&store, policy);

    let err = engine
        .allocate(
            &helpers::request(GOLD, 1, "userA"),
            Session::engine(),
            &CallContext::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::TransientStore);
    assert!(err.message.contains("timed out"));
    assert_eq!(store.faults().begun(), 2);
    assert_eq!(store.faults().rolled_back(), 2);
    assert_eq!(store.faults().committed(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_commit_ack_is_not_timed_out_or_retried() {
    let store = flaky_gold(6)
        .await
        .slow_commit_ack(Duration::from_millis(200));
    let policy = RetryPolicy::new(3, Duration::from_millis(10))
        .with_attempt_timeout(Duration::from_millis(100));
    let engine = engine(&store, policy);

    let outcome = engine
        .allocate(
            &helpers::request(GOLD, 2, "userA"),
            Session::engine(),
            &CallContext::new(),
        )
        .await
        .unwrap();

    let indices: Vec<i64> = outcome.items().iter().map(|i| i.index).collect();
    assert_eq!(indices, vec![1, 2]);
    assert_eq!(store.faults().begun(), 1);
    assert_eq!(store.faults().committed(), 1);

    let stats = store.inner().stats(GOLD).await;
    assert_eq!(stats.allocated, 2);
    assert_eq!(stats.available, 4);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_during_commit_keeps_allocation() {
    let store = flaky_gold(3)
        .await
        .slow_commit_ack(Duration::from_millis(200));
    let engine = engine(&store, RetryPolicy::new(3, Duration::from_millis(10)));
    let ctx = CallContext::new().with_timeout(Duration::from_millis(150));

    let token = ctx.cancellation_token().clone();
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    // Both the cancel and the deadline fire while the commit is in flight.
    let outcome = engine
        .allocate(&helpers::request(GOLD, 2, "userA"), Session::engine(), &ctx)
        .await
        .unwrap();
    canceller.await.unwrap();

    assert_eq!(outcome.items().len(), 2);
    assert_eq!(store.faults().begun(), 1);
    assert_eq!(store.faults().committed(), 1);
    assert_eq!(store.inner().stats(GOLD).await.available, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_after_claim_leaves_pool_untouched() {
    let store = flaky_gold(3)
        .await
        .stall_after_claim(Duration::from_secs(1));
    let engine = engine(&store, RetryPolicy::new(3, Duration::from_millis(10)));
    let ctx = CallContext::new();

    let token = ctx.cancellation_token().clone();
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let err = engine
        .allocate(&helpers::request(GOLD, 2, "userA"), Session::engine(), &ctx)
        .await
        .unwrap_err();
    canceller.await.unwrap();

    assert_eq!(err.kind, ErrorKind::Cancelled);
    assert_eq!(store.faults().begun(), 1);
    assert_eq!(store.faults().rolled_back(), 1);
    assert_eq!(store.faults().committed(), 0);

    let stats = store.inner().stats(GOLD).await;
    assert_eq!(stats.available, 3);
    assert_eq!(stats.allocated, 0);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_after_claim_leaves_pool_untouched() {
    let store = flaky_gold(3)
        .await
        .stall_after_claim(Duration::from_secs(1));
    let engine = engine(&store, RetryPolicy::new(3, Duration::from_millis(10)));
    let ctx = CallContext::new().with_timeout(Duration::from_millis(100));

    let err = engine
        .allocate(&helpers::request(GOLD, 2, "userA"), Session::engine(), &ctx)
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::DeadlineExceeded);
    assert_eq!(store.faults().begun(), 1);
    assert_eq!(store.faults().rolled_back(), 1);
    assert_eq!(store.faults().committed(), 0);
    assert_eq!(store.inner().stats(GOLD).await.available, 3);
    assert!(store.inner().items(GOLD).await.iter().all(|i| i.is_available()));
}

#[tokio::test(start_paused = true)]
async fn test_caller_managed_transient_error_is_not_retried() {
    let store = flaky_gold(2).await.fail_transient(1);
    let engine = engine(&store, RetryPolicy::new(5, Duration::from_millis(50)));

    let mut tx = store.begin().await.unwrap();
    let err = engine
        .allocate(
            &helpers::request(GOLD, 1, "userA"),
            Session::caller(&mut tx),
            &CallContext::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::TransientStore);
    assert_eq!(store.faults().begun(), 1);
    assert_eq!(store.faults().rolled_back(), 0);
    assert_eq!(store.faults().committed(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_retry_budget_from_config() {
    let store = flaky_gold(1).await.fail_transient(u32::MAX);
    let config = AllocationConfig {
        max_retries: 2,
        base_backoff_ms: 5,
        ..Default::default()
    };
    let engine = AllocationEngine::from_config(Arc::new(store.clone()), &config);

    let err = engine
        .allocate(
            &helpers::request(GOLD, 1, "userA"),
            Session::engine(),
            &CallContext::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::TransientStore);
    assert_eq!(store.faults().begun(), 2);
}
