//! # Batch Repository
//!
//! Record operations for batches nested under a product.
//!
//! ## Batch Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Batch Lifecycle                                   │
//! │                                                                         │
//! │  1. CREATE                                                             │
//! │     ├── create(product_id, new)      after picking a product           │
//! │     └── create_by_code(code, …)      after scanning a barcode again    │
//! │         (id allocation + insert share one write transaction)           │
//! │                                                                         │
//! │  2. TRACK                                                              │
//! │     └── larder-core sorts by expiration and partitions by status       │
//! │                                                                         │
//! │  3. RESOLVE                                                            │
//! │     └── update() with status = Treated once used up or discarded       │
//! │                                                                         │
//! │  4. (OPTIONAL) DELETE                                                  │
//! │     └── delete(id)                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Batch ids come from a single arena shared by every product. The record
//! store enforces no foreign keys; this repository is what keeps every
//! batch attached to an existing product.

use std::collections::HashMap;

use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::id::{next_id, EntityKind};
use crate::pool::Database;
use crate::repository::product;
use larder_core::money::Money;
use larder_core::types::{Batch, BatchStatus, NewBatch, StoreRef};
use larder_core::validation;

// =============================================================================
// Row Mapping
// =============================================================================

/// Raw batch row. Status is kept as text so unrecognized values can fold
/// to `Pending` instead of failing the whole read.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct BatchRow {
    pub id: i64,
    pub product_id: i64,
    pub label: String,
    pub amount: i64,
    pub price_cents: Option<i64>,
    pub exp_date: NaiveDate,
    pub status: String,
}

impl BatchRow {
    pub(crate) fn into_batch(self) -> Batch {
        Batch {
            id: self.id,
            label: self.label,
            amount: self.amount,
            price: self.price_cents.map(Money::from_cents),
            exp_date: self.exp_date,
            status: BatchStatus::parse(&self.status),
        }
    }
}

const SELECT_BATCH: &str =
    "SELECT id, product_id, label, amount, price_cents, exp_date, status FROM batches";

/// Loads one product's batches in creation order.
pub(crate) async fn batches_for_product(
    pool: &SqlitePool,
    product_id: i64,
) -> DbResult<Vec<Batch>> {
    let rows: Vec<BatchRow> =
        sqlx::query_as(&format!("{SELECT_BATCH} WHERE product_id = ?1 ORDER BY id"))
            .bind(product_id)
            .fetch_all(pool)
            .await?;

    Ok(rows.into_iter().map(BatchRow::into_batch).collect())
}

/// Loads every batch, grouped by owning product, in creation order.
pub(crate) async fn batches_grouped(pool: &SqlitePool) -> DbResult<HashMap<i64, Vec<Batch>>> {
    let rows: Vec<BatchRow> = sqlx::query_as(&format!("{SELECT_BATCH} ORDER BY id"))
        .fetch_all(pool)
        .await?;

    let mut grouped: HashMap<i64, Vec<Batch>> = HashMap::new();
    for row in rows {
        grouped
            .entry(row.product_id)
            .or_default()
            .push(row.into_batch());
    }
    Ok(grouped)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for batch record operations.
#[derive(Debug, Clone)]
pub struct BatchRepository {
    db: Database,
}

impl BatchRepository {
    /// Creates a new BatchRepository.
    pub fn new(db: Database) -> Self {
        BatchRepository { db }
    }

    /// Creates a batch under an existing product.
    ///
    /// Verifies the owner, allocates the batch id and inserts — all inside
    /// one write transaction.
    ///
    /// ## Returns
    /// The new batch id.
    pub async fn create(&self, product_id: i64, batch: NewBatch) -> DbResult<i64> {
        let mut txn = self.db.begin_write().await?;

        let owner: Option<i64> = sqlx::query_scalar("SELECT id FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_optional(&mut *txn.conn())
            .await?;
        if owner.is_none() {
            return Err(DbError::not_found("Product", product_id));
        }

        let id = Self::insert_in_txn(txn.conn(), product_id, batch).await?;
        txn.commit().await?;

        Ok(id)
    }

    /// Creates a batch under the product matching a barcode.
    ///
    /// This is the scan-again path: the user scans a code that already has a
    /// product, and the new batch attaches to it instead of creating a
    /// duplicate product.
    ///
    /// ## Arguments
    /// * `code` - Product barcode/SKU
    /// * `store` - Scopes the lookup; when absent, matches on code alone
    pub async fn create_by_code(
        &self,
        code: &str,
        store: Option<&StoreRef>,
        batch: NewBatch,
    ) -> DbResult<i64> {
        let mut txn = self.db.begin_write().await?;

        let product_id = product::find_id_by_code(txn.conn(), code, store)
            .await?
            .ok_or_else(|| DbError::not_found("Product", code))?;

        let id = Self::insert_in_txn(txn.conn(), product_id, batch).await?;
        txn.commit().await?;

        Ok(id)
    }

    /// Gets a batch by id.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Batch>> {
        let row: Option<BatchRow> = sqlx::query_as(&format!("{SELECT_BATCH} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.map(BatchRow::into_batch))
    }

    /// Updates an existing batch (full-record replace by id).
    ///
    /// The owning product never changes through this path.
    pub async fn update(&self, batch: &Batch) -> DbResult<()> {
        validation::validate_batch_amount(batch.amount)?;
        if let Some(price) = batch.price {
            validation::validate_batch_price(price.cents())?;
        }

        debug!(id = %batch.id, "Updating batch");

        let mut txn = self.db.begin_write().await?;

        let result = sqlx::query(
            "UPDATE batches SET label = ?2, amount = ?3, price_cents = ?4, \
             exp_date = ?5, status = ?6 WHERE id = ?1",
        )
        .bind(batch.id)
        .bind(&batch.label)
        .bind(batch.amount)
        .bind(batch.price.map(|p| p.cents()))
        .bind(batch.exp_date)
        .bind(batch.status.as_str())
        .execute(&mut *txn.conn())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Batch", batch.id));
        }

        txn.commit().await
    }

    /// Deletes a batch.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        debug!(id = %id, "Deleting batch");

        let mut txn = self.db.begin_write().await?;

        let result = sqlx::query("DELETE FROM batches WHERE id = ?1")
            .bind(id)
            .execute(&mut *txn.conn())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Batch", id));
        }

        txn.commit().await
    }

    /// Inserts a batch inside an already-open write transaction.
    ///
    /// Used by this repository and by the product create/merge paths, which
    /// append batches within their own transaction.
    pub(crate) async fn insert_in_txn(
        conn: &mut SqliteConnection,
        product_id: i64,
        batch: NewBatch,
    ) -> DbResult<i64> {
        validation::validate_batch_amount(batch.amount)?;
        if let Some(price) = batch.price {
            validation::validate_batch_price(price.cents())?;
        }

        let id = next_id(conn, EntityKind::Batch).await?;

        sqlx::query(
            "INSERT INTO batches (id, product_id, label, amount, price_cents, exp_date, status) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(id)
        .bind(product_id)
        .bind(&batch.label)
        .bind(batch.amount)
        .bind(batch.price.map(|p| p.cents()))
        .bind(batch.exp_date)
        .bind(batch.status.as_str())
        .execute(&mut *conn)
        .await?;

        debug!(id = %id, product_id = %product_id, label = %batch.label, "Inserted batch");
        Ok(id)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use larder_core::types::NewProduct;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_batch(label: &str, amount: i64) -> NewBatch {
        NewBatch {
            label: label.to_string(),
            amount,
            price: None,
            exp_date: date(2026, 6, 1),
            status: BatchStatus::Pending,
        }
    }

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn create_product(db: &Database, name: &str, code: Option<&str>) -> i64 {
        db.products()
            .create(
                NewProduct {
                    name: name.to_string(),
                    code: code.map(str::to_string),
                    ..NewProduct::default()
                },
                false,
            )
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_appends_to_product() {
        let db = test_db().await;
        let product_id = create_product(&db, "Milk", None).await;

        let batch_id = db
            .batches()
            .create(product_id, new_batch("L-1", 6))
            .await
            .unwrap();

        let product = db.products().get_by_id(product_id).await.unwrap().unwrap();
        assert_eq!(product.batches.len(), 1);
        assert_eq!(product.batches[0].id, batch_id);
        assert_eq!(product.batches[0].label, "L-1");
    }

    #[tokio::test]
    async fn test_create_requires_existing_product() {
        let db = test_db().await;

        let err = db.batches().create(99, new_batch("L-1", 1)).await;
        assert!(matches!(err, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_ids_come_from_one_global_arena() {
        let db = test_db().await;
        let first = create_product(&db, "Milk", None).await;
        let second = create_product(&db, "Yogurt", None).await;

        let a = db.batches().create(first, new_batch("A", 1)).await.unwrap();
        let b = db.batches().create(second, new_batch("B", 1)).await.unwrap();
        let c = db.batches().create(first, new_batch("C", 1)).await.unwrap();

        assert!(a < b && b < c, "batch ids not globally increasing: {a}, {b}, {c}");
    }

    #[tokio::test]
    async fn test_create_by_code_attaches_to_matching_product() {
        let db = test_db().await;
        let milk = create_product(&db, "Milk", Some("789")).await;
        let _yogurt = create_product(&db, "Yogurt", Some("555")).await;

        db.batches()
            .create_by_code("789", None, new_batch("L-2", 3))
            .await
            .unwrap();

        let product = db.products().get_by_id(milk).await.unwrap().unwrap();
        assert_eq!(product.batches.len(), 1);
        assert_eq!(product.batches[0].label, "L-2");
    }

    #[tokio::test]
    async fn test_create_by_code_unknown_code_is_not_found() {
        let db = test_db().await;

        let err = db
            .batches()
            .create_by_code("000", None, new_batch("L-1", 1))
            .await;
        assert!(matches!(err, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_update_replaces_full_record() {
        let db = test_db().await;
        let product_id = create_product(&db, "Milk", None).await;
        let id = db
            .batches()
            .create(product_id, new_batch("L-1", 6))
            .await
            .unwrap();

        let updated = Batch {
            id,
            label: "L-1b".to_string(),
            amount: 2,
            price: Some(Money::from_cents(499)),
            exp_date: date(2026, 7, 1),
            status: BatchStatus::Treated,
        };
        db.batches().update(&updated).await.unwrap();

        let stored = db.batches().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored, updated);
    }

    #[tokio::test]
    async fn test_negative_amount_is_rejected() {
        let db = test_db().await;
        let product_id = create_product(&db, "Milk", None).await;

        let err = db.batches().create(product_id, new_batch("L-1", -1)).await;
        assert!(matches!(err, Err(DbError::Validation(_))));
    }

    #[tokio::test]
    async fn test_delete_removes_batch() {
        let db = test_db().await;
        let product_id = create_product(&db, "Milk", None).await;
        let id = db
            .batches()
            .create(product_id, new_batch("L-1", 6))
            .await
            .unwrap();

        db.batches().delete(id).await.unwrap();
        assert!(db.batches().get_by_id(id).await.unwrap().is_none());

        let err = db.batches().delete(id).await;
        assert!(matches!(err, Err(DbError::NotFound { .. })));
    }
}
