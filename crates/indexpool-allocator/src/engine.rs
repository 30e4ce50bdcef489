//! The allocation engine.
//!
//! One attempt runs `SELECT -> CLAIM -> VERIFY` inside a single store
//! transaction:
//!
//! 1. Select the lowest-index available candidates matching the request.
//!    No candidates ends the call with [`AllocationOutcome::Exhausted`].
//! 2. Claim them with one conditional bulk update that only touches items
//!    still available.
//! 3. If every candidate was claimed, read the items back and (when the
//!    engine owns the transaction) commit. Otherwise a concurrent
//!    allocator won the race: roll back and report a conflict.
//!
//! Transient store errors abort the whole attempt. When the engine owns
//! the transaction it retries from step 1 with exponential backoff, up to
//! the policy's attempt budget; the last error is surfaced unchanged.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use indexpool_core::config::AllocationConfig;
use indexpool_core::config::allocation::DEFAULT_MAX_QUANTITY;
use indexpool_core::error::AppError;
use indexpool_core::result::AppResult;
use indexpool_core::types::ItemId;
use indexpool_entity::item::AllocatedItem;

use crate::context::CallContext;
use crate::outcome::AllocationOutcome;
use crate::request::AllocationRequest;
use crate::retry::RetryPolicy;
use crate::session::Session;
use crate::store::{CandidateQuery, ItemStore, StoreTransaction};

/// Allocates pool items to owners.
///
/// The engine holds no locks and no mutable state; it is safe to share
/// one instance across tasks.
#[derive(Debug)]
pub struct AllocationEngine<S: ItemStore> {
    store: Arc<S>,
    policy: RetryPolicy,
    max_quantity: u32,
}

impl<S: ItemStore> Clone for AllocationEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            policy: self.policy,
            max_quantity: self.max_quantity,
        }
    }
}

impl<S: ItemStore> AllocationEngine<S> {
    /// Creates an engine with the given retry policy.
    pub fn new(store: Arc<S>, policy: RetryPolicy) -> Self {
        Self {
            store,
            policy,
            max_quantity: DEFAULT_MAX_QUANTITY,
        }
    }

    /// Creates an engine from the `[allocation]` configuration section.
    pub fn from_config(store: Arc<S>, config: &AllocationConfig) -> Self {
        Self::new(store, RetryPolicy::from(config)).with_max_quantity(config.max_quantity)
    }

    /// Override the per-request quantity ceiling.
    pub fn with_max_quantity(mut self, max_quantity: u32) -> Self {
        self.max_quantity = max_quantity;
        self
    }

    /// The store this engine allocates from.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The retry policy in effect.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Allocate items for `request`.
    ///
    /// Invalid requests fail with `InvalidArgument` before the store is
    /// touched. See [`Session`] for how transaction ownership changes
    /// commit, rollback and retry behavior.
    pub async fn allocate(
        &self,
        request: &AllocationRequest,
        session: Session<'_, S::Transaction>,
        ctx: &CallContext,
    ) -> AppResult<AllocationOutcome> {
        request.check(self.max_quantity)?;
        ctx.check()?;

        match session {
            Session::CallerManaged(tx) => {
                debug!(
                    category = %request.category,
                    quantity = request.quantity,
                    "Allocating inside caller transaction"
                );
                let outcome = ctx.guard(self.timed(attempt(tx, request))).await?;
                log_outcome(request, &outcome, 1);
                Ok(outcome)
            }
            Session::EngineManaged => self.allocate_managed(request, ctx).await,
        }
    }

    /// Retry loop around engine-owned attempts.
    async fn allocate_managed(
        &self,
        request: &AllocationRequest,
        ctx: &CallContext,
    ) -> AppResult<AllocationOutcome> {
        let mut attempt_no: u32 = 0;

        loop {
            ctx.check()?;
            debug!(
                category = %request.category,
                quantity = request.quantity,
                attempt = attempt_no + 1,
                "Starting allocation attempt"
            );

            match self.managed_attempt(request, ctx).await {
                Ok(outcome) => {
                    log_outcome(request, &outcome, attempt_no + 1);
                    return Ok(outcome);
                }
                Err(err) if err.is_retryable() && self.policy.should_retry(attempt_no) => {
                    let delay = self.policy.backoff(attempt_no);
                    warn!(
                        category = %request.category,
                        owner = %request.owner,
                        attempt = attempt_no + 1,
                        max_attempts = self.policy.max_attempts(),
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient store error, retrying allocation"
                    );
                    ctx.sleep(delay).await?;
                    attempt_no += 1;
                }
                Err(err) => {
                    if err.is_retryable() {
                        warn!(
                            category = %request.category,
                            attempts = attempt_no + 1,
                            error = %err,
                            "Allocation retries exhausted"
                        );
                    }
                    return Err(err);
                }
            }
        }
    }

    /// One attempt in a fresh transaction that this engine finishes.
    ///
    /// Only `begin` and the select/claim/read-back steps race the context
    /// and the attempt timeout. Once commit starts it runs to completion,
    /// so a durable commit is never reported as a failure and retried.
    async fn managed_attempt(
        &self,
        request: &AllocationRequest,
        ctx: &CallContext,
    ) -> AppResult<AllocationOutcome> {
        let mut tx = ctx.guard(self.timed(self.store.begin())).await?;

        match ctx.guard(self.timed(attempt(&mut tx, request))).await {
            Ok(outcome @ AllocationOutcome::Allocated { .. }) => {
                tx.commit().await?;
                Ok(outcome)
            }
            Ok(outcome) => {
                tx.rollback().await?;
                Ok(outcome)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback after failed attempt also failed");
                }
                Err(err)
            }
        }
    }

    /// Apply the per-attempt timeout, if configured.
    async fn timed<F, T>(&self, fut: F) -> AppResult<T>
    where
        F: std::future::Future<Output = AppResult<T>>,
    {
        match self.policy.attempt_timeout() {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                AppError::transient(format!(
                    "Allocation attempt timed out after {}ms",
                    limit.as_millis()
                ))
            })?,
            None => fut.await,
        }
    }
}

/// `SELECT -> CLAIM -> VERIFY` inside `tx`. Never commits or rolls back.
async fn attempt<T: StoreTransaction>(
    tx: &mut T,
    request: &AllocationRequest,
) -> AppResult<AllocationOutcome> {
    let query = CandidateQuery {
        category: request.category.clone(),
        filters: request.filters.clone(),
        limit: request.quantity,
    };

    let candidates = tx.find_candidates(&query).await?;
    if candidates.is_empty() {
        return Ok(AllocationOutcome::Exhausted);
    }

    let ids: Vec<ItemId> = candidates.iter().map(|item| item.id).collect();
    let claimed = tx.claim(&ids, &request.owner, Utc::now()).await?;

    if claimed != ids.len() as u64 {
        return Ok(AllocationOutcome::Conflict {
            requested: ids.len(),
            claimed,
        });
    }

    let mut items: Vec<AllocatedItem> = tx
        .find_by_ids(&ids)
        .await?
        .into_iter()
        .map(AllocatedItem::from)
        .collect();

    if items.len() != ids.len() {
        return Err(AppError::internal(format!(
            "Read back {} of {} claimed items",
            items.len(),
            ids.len()
        )));
    }

    items.sort_by_key(|item| item.index);
    Ok(AllocationOutcome::Allocated { items })
}

fn log_outcome(request: &AllocationRequest, outcome: &AllocationOutcome, attempts: u32) {
    match outcome {
        AllocationOutcome::Allocated { items } => info!(
            category = %request.category,
            owner = %request.owner,
            requested = request.quantity,
            allocated = items.len(),
            attempts = attempts,
            "Items allocated"
        ),
        AllocationOutcome::Exhausted => info!(
            category = %request.category,
            requested = request.quantity,
            "Pool exhausted, nothing allocated"
        ),
        AllocationOutcome::Conflict { requested, claimed } => warn!(
            category = %request.category,
            owner = %request.owner,
            requested = requested,
            claimed = claimed,
            "Allocation conflict, candidates claimed concurrently"
        ),
    }
}
