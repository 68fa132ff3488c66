//! # Store Registry
//!
//! Store records plus reconciliation of the two store identity schemes.
//!
//! ## Two Identity Schemes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     How a product points at a store                     │
//! │                                                                         │
//! │  New scheme                          Old scheme                         │
//! │  ──────────                          ──────────                         │
//! │  products.store = "d9c6…"            products.store = "Corner Market"  │
//! │         │                                   │                           │
//! │         ▼                                   ▼                           │
//! │  stores row (UUID, name)             no stores row at all              │
//! │                                                                         │
//! │  get_all_stores() returns the union:                                   │
//! │    • every real stores row                                             │
//! │    • every distinct legacy name that no real store already carries,    │
//! │      with the empty-string id sentinel                                 │
//! │                                                                         │
//! │  get_all_products_by_store(id) honors BOTH: a product is "in" the      │
//! │  store when its raw value equals the uuid OR the store's name, so      │
//! │  legacy data keeps working after the store gets a real record.         │
//! │                                                                         │
//! │  promote_legacy_store(name) ends the split for one name: it creates    │
//! │  the real record (exactly once) and rewrites matching products to      │
//! │  the uuid.                                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::SqliteConnection;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::product::{self, ProductRow, SELECT_PRODUCT};
use larder_core::types::{Product, Store};
use larder_core::validation::validate_entity_name;
use larder_core::{ValidationError, LEGACY_STORE_ID};

#[derive(Debug, sqlx::FromRow)]
struct StoreRow {
    id: String,
    name: String,
}

impl StoreRow {
    fn into_store(self) -> Store {
        Store {
            id: self.id,
            name: self.name,
        }
    }
}

/// Registry for store records and legacy name references.
#[derive(Debug, Clone)]
pub struct StoreRegistry {
    db: Database,
}

impl StoreRegistry {
    /// Creates a new StoreRegistry.
    pub fn new(db: Database) -> Self {
        StoreRegistry { db }
    }

    /// Gets a store by id. Absence is `Ok(None)`, never an error.
    pub async fn get_store(&self, id: &str) -> DbResult<Option<Store>> {
        let row: Option<StoreRow> = sqlx::query_as("SELECT id, name FROM stores WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.map(StoreRow::into_store))
    }

    /// All stores visible to the application.
    ///
    /// Real records come first (sorted by name); legacy names referenced by
    /// products follow, carrying the empty-string id sentinel. A legacy
    /// entry is suppressed when a real store already has exactly that name,
    /// and a raw value that is some real store's uuid is a reference, not a
    /// legacy name.
    pub async fn get_all_stores(&self) -> DbResult<Vec<Store>> {
        let mut conn = self.db.pool().acquire().await?;
        all_stores_on(&mut conn).await
    }

    /// Creates a store with a fresh UUID.
    ///
    /// ## Errors
    /// [`DbError::DuplicateStore`] when a case-insensitive name match
    /// already exists — real or legacy.
    pub async fn create_store(&self, name: &str) -> DbResult<Store> {
        validate_entity_name("store", name)?;
        let name = name.trim();

        let mut txn = self.db.begin_write().await?;

        let all = all_stores_on(txn.conn()).await?;
        if all
            .iter()
            .any(|s| s.name.to_lowercase() == name.to_lowercase())
        {
            return Err(DbError::DuplicateStore {
                name: name.to_string(),
            });
        }

        let store = Store {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
        };

        sqlx::query("INSERT INTO stores (id, name) VALUES (?1, ?2)")
            .bind(&store.id)
            .bind(&store.name)
            .execute(&mut *txn.conn())
            .await?;

        txn.commit().await?;
        info!(id = %store.id, name = %store.name, "Created store");
        Ok(store)
    }

    /// Full-record replace, insert-if-absent, keyed by id.
    ///
    /// Legacy entries (empty-string id) never reach this table; promote
    /// them first.
    pub async fn update_store(&self, store: &Store) -> DbResult<()> {
        validate_entity_name("store", &store.name)?;
        if store.id == LEGACY_STORE_ID {
            return Err(ValidationError::Required {
                field: "store id".to_string(),
            }
            .into());
        }

        debug!(id = %store.id, "Upserting store");

        let mut txn = self.db.begin_write().await?;

        sqlx::query(
            "INSERT INTO stores (id, name) VALUES (?1, ?2) \
             ON CONFLICT (id) DO UPDATE SET name = excluded.name",
        )
        .bind(&store.id)
        .bind(store.name.trim())
        .execute(&mut *txn.conn())
        .await?;

        txn.commit().await
    }

    /// Promotes a legacy name to a real store record, exactly once.
    ///
    /// If an equal-named real store already exists (case-insensitive) it is
    /// reused; otherwise one is created under a fresh UUID. Either way,
    /// every product still carrying the raw name is rewritten to the uuid
    /// in the same transaction. Idempotent.
    pub async fn promote_legacy_store(&self, legacy_name: &str) -> DbResult<Store> {
        validate_entity_name("store", legacy_name)?;
        let legacy_name = legacy_name.trim();

        let mut txn = self.db.begin_write().await?;

        let existing: Option<StoreRow> =
            sqlx::query_as("SELECT id, name FROM stores WHERE LOWER(name) = LOWER(?1)")
                .bind(legacy_name)
                .fetch_optional(&mut *txn.conn())
                .await?;

        let store = match existing {
            Some(row) => row.into_store(),
            None => {
                let store = Store {
                    id: Uuid::new_v4().to_string(),
                    name: legacy_name.to_string(),
                };
                sqlx::query("INSERT INTO stores (id, name) VALUES (?1, ?2)")
                    .bind(&store.id)
                    .bind(&store.name)
                    .execute(&mut *txn.conn())
                    .await?;
                store
            }
        };

        let rewritten = sqlx::query("UPDATE products SET store = ?1 WHERE store = ?2")
            .bind(&store.id)
            .bind(legacy_name)
            .execute(&mut *txn.conn())
            .await?;

        txn.commit().await?;
        info!(
            id = %store.id,
            name = %store.name,
            products = rewritten.rows_affected(),
            "Promoted legacy store"
        );
        Ok(store)
    }

    /// Products scoped to a store — or, with `None`, the products that have
    /// no store assigned at all (and only those).
    ///
    /// A product matches a store by uuid reference or by carrying the
    /// store's display name as a legacy reference.
    pub async fn get_all_products_by_store(
        &self,
        store_id: Option<&str>,
    ) -> DbResult<Vec<Product>> {
        let rows: Vec<ProductRow> = match store_id {
            None => {
                sqlx::query_as(&format!("{SELECT_PRODUCT} WHERE store IS NULL ORDER BY id"))
                    .fetch_all(self.db.pool())
                    .await?
            }
            Some(id) => match self.get_store(id).await? {
                Some(store) => {
                    sqlx::query_as(&format!(
                        "{SELECT_PRODUCT} WHERE store = ?1 OR store = ?2 ORDER BY id"
                    ))
                    .bind(id)
                    .bind(&store.name)
                    .fetch_all(self.db.pool())
                    .await?
                }
                None => {
                    sqlx::query_as(&format!("{SELECT_PRODUCT} WHERE store = ?1 ORDER BY id"))
                        .bind(id)
                        .fetch_all(self.db.pool())
                        .await?
                }
            },
        };

        product::hydrate(self.db.pool(), rows).await
    }
}

/// The real-plus-legacy store union, on an arbitrary connection so
/// `create_store` can run it inside its own write transaction.
async fn all_stores_on(conn: &mut SqliteConnection) -> DbResult<Vec<Store>> {
    let rows: Vec<StoreRow> = sqlx::query_as("SELECT id, name FROM stores ORDER BY name")
        .fetch_all(&mut *conn)
        .await?;
    let mut stores: Vec<Store> = rows.into_iter().map(StoreRow::into_store).collect();

    let raw_refs: Vec<String> =
        sqlx::query_scalar("SELECT DISTINCT store FROM products WHERE store IS NOT NULL")
            .fetch_all(&mut *conn)
            .await?;

    for raw in raw_refs {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        // A uuid reference to a real store is not a legacy name.
        if stores.iter().any(|s| s.id == raw) {
            continue;
        }
        // The name already belongs to a real store.
        if stores.iter().any(|s| s.name == raw) {
            continue;
        }
        stores.push(Store {
            id: LEGACY_STORE_ID.to_string(),
            name: raw.to_string(),
        });
    }

    Ok(stores)
}

// =============================================================================
// Unit Tests
// =============================================================================
