//! # Integer Id Allocation
//!
//! The record store has no native sequence generation for integer primary
//! keys, so the data layer hands them out itself: each entity table is one
//! logical arena with a monotonically increasing index, and the next id is
//! `max + 1` over the existing records.
//!
//! ## Why Allocation Lives Inside the Write Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Two writers computing max+1 outside a transaction:                     │
//! │                                                                         │
//! │    writer A: MAX(id) = 7  →  inserts id 8                              │
//! │    writer B: MAX(id) = 7  →  inserts id 8   ← COLLISION                │
//! │                                                                         │
//! │  With allocation inside the single write transaction:                   │
//! │                                                                         │
//! │    writer A: [gate] MAX(id) = 7 → insert 8 → commit [gate released]    │
//! │    writer B: [gate] MAX(id) = 8 → insert 9 → commit                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`next_id`] takes `&mut SqliteConnection`, which repository code can only
//! obtain from an open [`WriteTxn`](crate::pool::WriteTxn) — allocating
//! outside a write transaction doesn't compile.
//!
//! Ids are never recycled: deleting records leaves gaps, which is expected.

use sqlx::SqliteConnection;

use crate::error::DbResult;

/// Entity types with data-layer-allocated integer keys.
///
/// Stores and categories use UUIDs and are not allocated here. Batch ids
/// come from a single arena shared by all products.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Product,
    Batch,
}

impl EntityKind {
    /// The arena (table) backing this entity type.
    const fn table(&self) -> &'static str {
        match self {
            EntityKind::Product => "products",
            EntityKind::Batch => "batches",
        }
    }
}

/// Returns the next free id for the given entity type: `MAX(id) + 1`,
/// starting at 1 for an empty arena.
///
/// Must be followed by the insert using the returned id on the same
/// connection, inside the same transaction.
pub async fn next_id(conn: &mut SqliteConnection, kind: EntityKind) -> DbResult<i64> {
    let max: Option<i64> = sqlx::query_scalar(&format!("SELECT MAX(id) FROM {}", kind.table()))
        .fetch_one(&mut *conn)
        .await?;

    Ok(max.unwrap_or(0) + 1)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_empty_arena_starts_at_one() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut txn = db.begin_write().await.unwrap();
        assert_eq!(next_id(txn.conn(), EntityKind::Product).await.unwrap(), 1);
        assert_eq!(next_id(txn.conn(), EntityKind::Batch).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_allocation_is_monotonic_per_arena() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut last = 0;
        for n in 0..5 {
            let mut txn = db.begin_write().await.unwrap();
            let id = next_id(txn.conn(), EntityKind::Product).await.unwrap();
            assert!(id > last, "allocated id {id} not greater than {last}");
            last = id;

            sqlx::query("INSERT INTO products (id, name) VALUES (?1, ?2)")
                .bind(id)
                .bind(format!("product-{n}"))
                .execute(&mut *txn.conn())
                .await
                .unwrap();
            txn.commit().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_arenas_are_independent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut txn = db.begin_write().await.unwrap();
        sqlx::query("INSERT INTO products (id, name) VALUES (7, 'x')")
            .execute(&mut *txn.conn())
            .await
            .unwrap();

        assert_eq!(next_id(txn.conn(), EntityKind::Product).await.unwrap(), 8);
        assert_eq!(next_id(txn.conn(), EntityKind::Batch).await.unwrap(), 1);
    }
}
