//! Pool item repository: seeding and reporting queries.
//!
//! Nothing here changes an item's status; claims go through the
//! allocation engine's store transaction.

use sqlx::PgPool;
use tracing::info;

use indexpool_core::error::AppError;
use indexpool_core::result::AppResult;
use indexpool_core::types::{ItemId, OwnerId};
use indexpool_entity::item::{Item, NewItem, PoolStats};

const ITEM_COLUMNS: &str =
    "id, category, item_index, status, owner_id, allocated_at, metadata, created_at";

/// Repository for `pool_items` records.
#[derive(Debug, Clone)]
pub struct ItemRepository {
    pool: PgPool,
}

impl ItemRepository {
    /// Create a new item repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find an item by ID.
    pub async fn find_by_id(&self, id: ItemId) -> AppResult<Option<Item>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM pool_items WHERE id = $1");
        sqlx::query_as::<_, Item>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to find item", e))
    }

    /// All items allocated to an owner, ascending by category then index.
    pub async fn find_by_owner(&self, owner: &OwnerId) -> AppResult<Vec<Item>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM pool_items WHERE owner_id = $1 \
             ORDER BY category, item_index"
        );
        sqlx::query_as::<_, Item>(&sql)
            .bind(owner.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to find owner items", e))
    }

    /// Insert items in one transaction. A duplicate `(category, index)`
    /// aborts the whole batch.
    pub async fn seed(&self, items: &[NewItem]) -> AppResult<Vec<Item>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::from_sqlx("Failed to begin seed transaction", e))?;

        let sql = format!(
            "INSERT INTO pool_items (category, item_index, metadata) VALUES ($1, $2, $3) \
             RETURNING {ITEM_COLUMNS}"
        );

        let mut created = Vec::with_capacity(items.len());
        for new in items {
            let item = sqlx::query_as::<_, Item>(&sql)
                .bind(&new.category)
                .bind(new.index)
                .bind(sqlx::types::Json(&new.metadata))
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::from_sqlx(
                        &format!(
                            "Failed to seed item {} in category '{}'",
                            new.index, new.category
                        ),
                        e,
                    )
                })?;
            created.push(item);
        }

        tx.commit()
            .await
            .map_err(|e| AppError::from_sqlx("Failed to commit seed transaction", e))?;

        info!(count = created.len(), "Seeded pool items");
        Ok(created)
    }

    /// Next free index for a category (`MAX(item_index) + 1`, or 1).
    pub async fn next_index(&self, category: &str) -> AppResult<i64> {
        let max: Option<i64> =
            sqlx::query_scalar("SELECT MAX(item_index) FROM pool_items WHERE category = $1")
                .bind(category)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| AppError::from_sqlx("Failed to read max index", e))?;
        Ok(max.map_or(1, |m| m + 1))
    }

    /// Per-category counts, optionally limited to one category.
    pub async fn stats(&self, category: Option<&str>) -> AppResult<Vec<PoolStats>> {
        sqlx::query_as::<_, PoolStats>(
            "SELECT category, \
                    COUNT(*) AS total, \
                    COUNT(*) FILTER (WHERE status = 'available') AS available, \
                    COUNT(*) FILTER (WHERE status = 'allocated') AS allocated \
             FROM pool_items \
             WHERE ($1::TEXT IS NULL OR category = $1) \
             GROUP BY category \
             ORDER BY category",
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to compute pool stats", e))
    }
}
