//! PostgreSQL item store using sqlx transactions.
//!
//! The claim is a single `UPDATE ... WHERE id = ANY($n) AND status =
//! 'available'`, so PostgreSQL's row locking decides races: a loser
//! either sees fewer rows updated (read committed) or is aborted with a
//! serialization failure (repeatable read / serializable), which maps to
//! a transient error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use tracing::debug;
use uuid::Uuid;

use indexpool_core::config::IsolationLevel;
use indexpool_core::error::AppError;
use indexpool_core::result::AppResult;
use indexpool_core::types::{ItemId, OwnerId};
use indexpool_entity::item::Item;

use super::{CandidateQuery, ItemStore, StoreTransaction};

const ITEM_COLUMNS: &str =
    "id, category, item_index, status, owner_id, allocated_at, metadata, created_at";

/// Item store backed by the `pool_items` table.
#[derive(Debug, Clone)]
pub struct PgItemStore {
    pool: PgPool,
    isolation: IsolationLevel,
}

impl PgItemStore {
    /// Create a store over an existing pool.
    pub fn new(pool: PgPool, isolation: IsolationLevel) -> Self {
        Self { pool, isolation }
    }

    /// The isolation level new transactions start with.
    pub fn isolation(&self) -> IsolationLevel {
        self.isolation
    }
}

#[async_trait]
impl ItemStore for PgItemStore {
    type Transaction = PgItemTransaction;

    async fn begin(&self) -> AppResult<PgItemTransaction> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::from_sqlx("Failed to begin transaction", e))?;

        let statement = format!(
            "SET TRANSACTION ISOLATION LEVEL {}",
            self.isolation.as_sql()
        );
        sqlx::query(&statement)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to set isolation level", e))?;

        Ok(PgItemTransaction { tx })
    }

    async fn health_check(&self) -> AppResult<bool> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|v| v == 1)
            .map_err(|e| AppError::from_sqlx("Health check failed", e))
    }
}

/// An open PostgreSQL transaction.
///
/// Dropping it without calling `commit` rolls it back.
#[derive(Debug)]
pub struct PgItemTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

impl PgItemTransaction {
    /// Borrow the underlying sqlx transaction, so callers can run their
    /// own statements in the same unit of work.
    pub fn inner_mut(&mut self) -> &mut sqlx::Transaction<'static, Postgres> {
        &mut self.tx
    }
}

impl From<sqlx::Transaction<'static, Postgres>> for PgItemTransaction {
    fn from(tx: sqlx::Transaction<'static, Postgres>) -> Self {
        Self { tx }
    }
}

fn to_uuids(ids: &[ItemId]) -> Vec<Uuid> {
    ids.iter().map(|id| id.into_uuid()).collect()
}

#[async_trait]
impl StoreTransaction for PgItemTransaction {
    async fn find_candidates(&mut self, query: &CandidateQuery) -> AppResult<Vec<Item>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM pool_items \
             WHERE category = $1 AND status = 'available' AND metadata @> $2 \
             ORDER BY item_index ASC LIMIT $3"
        );

        sqlx::query_as::<_, Item>(&sql)
            .bind(&query.category)
            .bind(query.filters.to_json())
            .bind(i64::from(query.limit))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to select candidates", e))
    }

    async fn claim(
        &mut self,
        ids: &[ItemId],
        owner: &OwnerId,
        allocated_at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE pool_items SET status = 'allocated', owner_id = $1, allocated_at = $2 \
             WHERE id = ANY($3) AND status = 'available'",
        )
        .bind(owner.as_str())
        .bind(allocated_at)
        .bind(to_uuids(ids))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to claim items", e))?;

        debug!(
            requested = ids.len(),
            updated = result.rows_affected(),
            "Claim executed"
        );
        Ok(result.rows_affected())
    }

    async fn find_by_ids(&mut self, ids: &[ItemId]) -> AppResult<Vec<Item>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM pool_items WHERE id = ANY($1) ORDER BY item_index ASC"
        );

        sqlx::query_as::<_, Item>(&sql)
            .bind(to_uuids(ids))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to read claimed items", e))
    }

    async fn commit(self) -> AppResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| AppError::from_sqlx("Failed to commit transaction", e))
    }

    async fn rollback(self) -> AppResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| AppError::from_sqlx("Failed to roll back transaction", e))
    }
}
