//! # Record Store
//!
//! Connection pool, configuration and the single-writer transaction scope.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Record Store Access                              │
//! │                                                                         │
//! │  Reads                                 Writes                           │
//! │  ─────                                 ──────                           │
//! │  repo.get_by_id(…)                     repo.create(…)                   │
//! │       │                                     │                           │
//! │       ▼                                     ▼                           │
//! │  SqlitePool ◄── many concurrent        Database::begin_write()          │
//! │  (snapshot as of call time)                 │                           │
//! │                                             ▼                           │
//! │                                        ┌──────────────────────┐         │
//! │                                        │ WriteTxn             │         │
//! │                                        │  • async write gate  │         │
//! │                                        │  • BEGIN … COMMIT    │         │
//! │                                        │  • rollback on drop  │         │
//! │                                        └──────────────────────┘         │
//! │                                                                         │
//! │  Exactly one WriteTxn exists at a time, system-wide. A mutating        │
//! │  operation does ALL of its reads and writes through the one WriteTxn   │
//! │  it opened — there is no API to open a second one while the first is   │
//! │  held, so nesting cannot happen by construction.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! SQLite WAL (Write-Ahead Logging) mode is enabled for:
//! - Better concurrent read performance
//! - Readers don't block the writer, the writer doesn't block readers
//! - Better crash recovery

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::batch::BatchRepository;
use crate::repository::category::CategoryRepository;
use crate::repository::product::ProductRepository;
use crate::repository::store::StoreRegistry;

// =============================================================================
// Configuration
// =============================================================================

/// Record store configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/larder.db")
///     .max_connections(5)
///     .min_connections(1);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5 (sufficient for a single-device app)
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection timeout duration.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a new configuration with the given database path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an in-memory configuration (for testing).
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let db = Database::new(DbConfig::in_memory()).await?;
    /// // Database is isolated, perfect for tests
    /// ```
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1, // In-memory requires single connection
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            run_migrations: true,
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main record store handle providing repository access.
///
/// Cheap to clone; all clones share the pool and the write gate.
#[derive(Debug, Clone)]
pub struct Database {
    /// The SQLite connection pool.
    pool: SqlitePool,

    /// Gate serializing write transactions. Every mutation in the data
    /// layer runs while holding this lock.
    write_gate: Arc<Mutex<()>>,
}

impl Database {
    /// Creates a new record store handle.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite:
    ///    - WAL mode for concurrent reads
    ///    - NORMAL synchronous (balance of safety/speed)
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing record store"
        );

        // sqlite://path creates file if not exists
        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .create_if_missing(true);

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Record store pool created"
        );

        let db = Database {
            pool,
            write_gate: Arc::new(Mutex::new(())),
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs database migrations.
    ///
    /// Idempotent: safe to run multiple times.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running record store migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Opens the single system-wide write transaction.
    ///
    /// Waits until no other write transaction is open, then begins a SQLite
    /// transaction. Id allocation and the inserts that follow it must all
    /// happen through the returned [`WriteTxn`] — that is what makes
    /// max+1 allocation race-free.
    pub async fn begin_write(&self) -> DbResult<WriteTxn> {
        let gate = Arc::clone(&self.write_gate).lock_owned().await;

        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!("Write transaction opened");
        Ok(WriteTxn { tx, _gate: gate })
    }

    /// Returns a reference to the connection pool, for reads.
    ///
    /// Reads see a consistent snapshot as of call time; no further
    /// isolation is promised.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the product repository.
    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.clone())
    }

    /// Returns the batch repository.
    pub fn batches(&self) -> BatchRepository {
        BatchRepository::new(self.clone())
    }

    /// Returns the store registry.
    pub fn stores(&self) -> StoreRegistry {
        StoreRegistry::new(self.clone())
    }

    /// Returns the category repository.
    pub fn categories(&self) -> CategoryRepository {
        CategoryRepository::new(self.clone())
    }

    /// Closes the connection pool.
    pub async fn close(&self) {
        info!("Closing record store pool");
        self.pool.close().await;
    }

    /// Checks if the store is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Write Transaction
// =============================================================================

/// The exclusive write scope.
///
/// Holds both the write gate and an open SQLite transaction. All mutations
/// inside are atomic: [`commit`](WriteTxn::commit) applies them, and
/// dropping the value on any other exit path (early return, `?`, panic)
/// rolls everything back and releases the gate.
pub struct WriteTxn {
    tx: Transaction<'static, Sqlite>,
    _gate: OwnedMutexGuard<()>,
}

impl WriteTxn {
    /// The transaction's connection. Reads through this connection see the
    /// transaction's own uncommitted writes.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    /// Commits the transaction and releases the write gate.
    pub async fn commit(self) -> DbResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        debug!("Write transaction committed");
        Ok(())
    }

    /// Explicitly rolls back. Equivalent to dropping the value, but lets
    /// callers surface rollback failures.
    pub async fn rollback(self) -> DbResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        debug!("Write transaction rolled back");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        assert!(db.health_check().await);
    }

    #[tokio::test]
    async fn test_config_builder() {
        let config = DbConfig::new("/tmp/test.db")
            .max_connections(10)
            .min_connections(2);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
    }

    #[tokio::test]
    async fn test_single_writer_at_a_time() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let first = db.begin_write().await.unwrap();

        // A second writer must wait until the first scope ends.
        let second = tokio::time::timeout(Duration::from_millis(50), db.begin_write()).await;
        assert!(second.is_err(), "second write scope opened while one was held");

        drop(first);
        let reopened = tokio::time::timeout(Duration::from_secs(1), db.begin_write()).await;
        assert!(reopened.is_ok());
    }

    #[tokio::test]
    async fn test_drop_rolls_back() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        {
            let mut txn = db.begin_write().await.unwrap();
            sqlx::query("INSERT INTO stores (id, name) VALUES (?1, ?2)")
                .bind("abc")
                .bind("Dropped Market")
                .execute(&mut *txn.conn())
                .await
                .unwrap();
            // No commit: scope ends, transaction rolls back.
        }

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stores")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_commit_persists() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut txn = db.begin_write().await.unwrap();
        sqlx::query("INSERT INTO stores (id, name) VALUES (?1, ?2)")
            .bind("abc")
            .bind("Kept Market")
            .execute(&mut *txn.conn())
            .await
            .unwrap();
        txn.commit().await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stores")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
