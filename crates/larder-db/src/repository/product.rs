//! # Product Repository
//!
//! Record operations for products: CRUD, duplicate detection and the
//! merge-by-code policy.
//!
//! ## Merge-by-Code
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              What happens when a barcode is scanned twice               │
//! │                                                                         │
//! │  create(product with code "789")                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  A product with code "789" in the same store already exists?           │
//! │       │                                                                 │
//! │       ├── NO  ──► allocate id, insert product, insert its batches      │
//! │       │           returns Some(new_id)                                  │
//! │       │                                                                 │
//! │       └── YES ──► incoming batches?                                     │
//! │                ├── none, ignore_duplicate = false                      │
//! │                │        └── DuplicateProduct error                     │
//! │                └── some (or ignoring duplicates)                       │
//! │                         └── batches attach to the EXISTING product     │
//! │                             returns None — never a second product      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Code uniqueness is scoped by `(code, store)`: the same barcode may exist
//! in two different stores. A lookup without a store matches on code alone.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::id::{next_id, EntityKind};
use crate::images::ImageStore;
use crate::pool::Database;
use crate::repository::batch::{self, BatchRepository};
use larder_core::types::{Batch, NewProduct, Product, ProductPatch, StoreRef};
use larder_core::validation::validate_product_name;
use larder_core::ValidationError;

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ProductRow {
    pub id: i64,
    pub name: String,
    pub code: Option<String>,
    pub photo: Option<String>,
    pub store: Option<String>,
    pub categories: String,
}

impl ProductRow {
    pub(crate) fn into_product(self, batches: Vec<Batch>) -> DbResult<Product> {
        let categories: Vec<String> = serde_json::from_str(&self.categories)
            .map_err(|e| DbError::Internal(format!("corrupt categories column: {e}")))?;

        Ok(Product {
            id: self.id,
            name: self.name,
            code: self.code,
            photo: self.photo,
            store: self.store.as_deref().and_then(StoreRef::from_raw),
            categories,
            batches,
        })
    }
}

pub(crate) const SELECT_PRODUCT: &str =
    "SELECT id, name, code, photo, store, categories FROM products";

/// Attaches each row's batches and maps to domain products.
pub(crate) async fn hydrate(pool: &SqlitePool, rows: Vec<ProductRow>) -> DbResult<Vec<Product>> {
    let mut grouped = batch::batches_grouped(pool).await?;

    rows.into_iter()
        .map(|row| {
            let batches = grouped.remove(&row.id).unwrap_or_default();
            row.into_product(batches)
        })
        .collect()
}

/// First product id matching a code, optionally scoped to a store.
///
/// Runs on the write transaction's connection so create paths check
/// duplicates against their own uncommitted state.
pub(crate) async fn find_id_by_code(
    conn: &mut SqliteConnection,
    code: &str,
    store: Option<&StoreRef>,
) -> DbResult<Option<i64>> {
    let id: Option<i64> = match store {
        Some(store) => {
            sqlx::query_scalar(
                "SELECT id FROM products WHERE code = ?1 AND store = ?2 ORDER BY id LIMIT 1",
            )
            .bind(code)
            .bind(store.as_raw())
            .fetch_optional(&mut *conn)
            .await?
        }
        None => {
            sqlx::query_scalar("SELECT id FROM products WHERE code = ?1 ORDER BY id LIMIT 1")
                .bind(code)
                .fetch_optional(&mut *conn)
                .await?
        }
    };

    Ok(id)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product record operations.
///
/// ## Usage
/// ```rust,ignore
/// let products = db.products();
///
/// let id = products.create(new_product, false).await?;
/// let product = products.get_by_id(id.unwrap()).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    db: Database,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(db: Database) -> Self {
        ProductRepository { db }
    }

    /// Checks whether a product with this code exists.
    ///
    /// ## Arguments
    /// * `code` - Product barcode/SKU
    /// * `store` - Scopes the check; when absent, matches on code alone
    ///   across all stores
    pub async fn exists_by_code(&self, code: &str, store: Option<&StoreRef>) -> DbResult<bool> {
        let mut conn = self.db.pool().acquire().await?;
        Ok(find_id_by_code(&mut conn, code, store).await?.is_some())
    }

    /// Creates a product, or merges its batches into an existing one.
    ///
    /// ## Merge policy
    /// If `product.code` is present and a product with the same
    /// `(code, store)` already exists:
    /// - no incoming batches and `ignore_duplicate` is false →
    ///   [`DbError::DuplicateProduct`]
    /// - otherwise every incoming batch is created under the existing
    ///   product and `Ok(None)` is returned
    ///
    /// ## Returns
    /// * `Ok(Some(id))` - A new product record was created
    /// * `Ok(None)` - Batches were attached to a pre-existing product
    pub async fn create(
        &self,
        product: NewProduct,
        ignore_duplicate: bool,
    ) -> DbResult<Option<i64>> {
        validate_product_name(&product.name)?;

        let mut txn = self.db.begin_write().await?;

        let code = product
            .code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        if let Some(code) = &code {
            if let Some(existing_id) =
                find_id_by_code(txn.conn(), code, product.store.as_ref()).await?
            {
                if product.batches.is_empty() && !ignore_duplicate {
                    return Err(DbError::DuplicateProduct { code: code.clone() });
                }

                debug!(
                    code = %code,
                    product_id = %existing_id,
                    batches = product.batches.len(),
                    "Product exists, attaching batches to it"
                );
                for new_batch in product.batches {
                    BatchRepository::insert_in_txn(txn.conn(), existing_id, new_batch).await?;
                }
                txn.commit().await?;
                return Ok(None);
            }
        }

        let id = next_id(txn.conn(), EntityKind::Product).await?;
        let store_raw = product
            .store
            .as_ref()
            .map(|s| s.as_raw().trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let categories = serde_json::to_string(&product.categories)
            .map_err(|e| DbError::Internal(e.to_string()))?;

        sqlx::query(
            "INSERT INTO products (id, name, code, photo, store, categories) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(id)
        .bind(product.name.trim())
        .bind(&code)
        .bind(&product.photo)
        .bind(&store_raw)
        .bind(&categories)
        .execute(&mut *txn.conn())
        .await?;

        for new_batch in product.batches {
            BatchRepository::insert_in_txn(txn.conn(), id, new_batch).await?;
        }

        txn.commit().await?;
        info!(id = %id, "Created product");
        Ok(Some(id))
    }

    /// Applies a partial update, keyed by id (upsert).
    ///
    /// Fields absent from the patch are left untouched. When no record with
    /// the patch's id exists, one is inserted under that id — a name is then
    /// required.
    pub async fn update(&self, patch: ProductPatch) -> DbResult<()> {
        if let Some(name) = &patch.name {
            validate_product_name(name)?;
        }

        debug!(id = %patch.id, "Updating product");

        let mut txn = self.db.begin_write().await?;

        let existing: Option<ProductRow> =
            sqlx::query_as(&format!("{SELECT_PRODUCT} WHERE id = ?1"))
                .bind(patch.id)
                .fetch_optional(&mut *txn.conn())
                .await?;

        let store_to_raw = |store: Option<StoreRef>| {
            store
                .map(|s| s.as_raw().trim().to_string())
                .filter(|s| !s.is_empty())
        };

        match existing {
            Some(row) => {
                let name = patch
                    .name
                    .map(|n| n.trim().to_string())
                    .unwrap_or(row.name);
                let code = patch.code.unwrap_or(row.code);
                let photo = patch.photo.unwrap_or(row.photo);
                let store = match patch.store {
                    Some(store) => store_to_raw(store),
                    None => row.store,
                };
                let categories = match patch.categories {
                    Some(ids) => serde_json::to_string(&ids)
                        .map_err(|e| DbError::Internal(e.to_string()))?,
                    None => row.categories,
                };

                sqlx::query(
                    "UPDATE products SET name = ?2, code = ?3, photo = ?4, store = ?5, \
                     categories = ?6 WHERE id = ?1",
                )
                .bind(patch.id)
                .bind(&name)
                .bind(&code)
                .bind(&photo)
                .bind(&store)
                .bind(&categories)
                .execute(&mut *txn.conn())
                .await?;
            }
            None => {
                let name = patch.name.ok_or(ValidationError::Required {
                    field: "name".to_string(),
                })?;
                let categories = serde_json::to_string(&patch.categories.unwrap_or_default())
                    .map_err(|e| DbError::Internal(e.to_string()))?;

                sqlx::query(
                    "INSERT INTO products (id, name, code, photo, store, categories) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )
                .bind(patch.id)
                .bind(name.trim())
                .bind(patch.code.flatten())
                .bind(patch.photo.flatten())
                .bind(store_to_raw(patch.store.flatten()))
                .bind(&categories)
                .execute(&mut *txn.conn())
                .await?;
            }
        }

        txn.commit().await
    }

    /// Deletes a product, its photo file and its batches.
    ///
    /// The photo file is removed first; a file that is already gone counts
    /// as success. Batch rows go in the same transaction as the product row,
    /// so a deleted product never leaves orphan batches behind.
    pub async fn delete(&self, id: i64, images: &ImageStore) -> DbResult<()> {
        let product = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))?;

        if let Some(file_name) = &product.photo {
            images.remove(file_name)?;
        }

        let mut txn = self.db.begin_write().await?;

        sqlx::query("DELETE FROM batches WHERE product_id = ?1")
            .bind(id)
            .execute(&mut *txn.conn())
            .await?;

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&mut *txn.conn())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        txn.commit().await?;
        info!(id = %id, "Deleted product");
        Ok(())
    }

    /// Gets a product by id, with its batches in creation order.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Product>> {
        let row: Option<ProductRow> = sqlx::query_as(&format!("{SELECT_PRODUCT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        match row {
            Some(row) => {
                let batches = batch::batches_for_product(self.db.pool(), row.id).await?;
                Ok(Some(row.into_product(batches)?))
            }
            None => Ok(None),
        }
    }

    /// Gets the first product matching a code, optionally scoped to a store.
    ///
    /// Absence is surfaced as `Ok(None)`; callers branch on presence.
    pub async fn get_by_code(
        &self,
        code: &str,
        store: Option<&StoreRef>,
    ) -> DbResult<Option<Product>> {
        let mut conn = self.db.pool().acquire().await?;
        let id = find_id_by_code(&mut conn, code, store).await?;
        drop(conn);

        match id {
            Some(id) => self.get_by_id(id).await,
            None => Ok(None),
        }
    }

    /// Lists every product with its batches.
    pub async fn list_all(&self) -> DbResult<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!("{SELECT_PRODUCT} ORDER BY id"))
            .fetch_all(self.db.pool())
            .await?;

        hydrate(self.db.pool(), rows).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
