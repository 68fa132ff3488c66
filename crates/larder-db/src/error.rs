//! # Data Layer Error Types
//!
//! Error types for record-store operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  UI layer ← Branches on variant for user-facing messages               │
//! │                                                                         │
//! │  Lookups that the caller is expected to branch on (get by id/code)     │
//! │  surface absence as Ok(None), not as NotFound.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use larder_core::ValidationError;

/// Data layer operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found where the operation requires it to exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A product with this code already exists in the same store and the
    /// incoming payload carried no batches to merge into it.
    #[error("product with code '{code}' already exists and there are no batches to add")]
    DuplicateProduct { code: String },

    /// A store with this name already exists (real or legacy,
    /// case-insensitive).
    #[error("store '{name}' already exists")]
    DuplicateStore { name: String },

    /// A category with this name already exists (case-insensitive).
    #[error("category '{name}' already exists")]
    DuplicateCategory { name: String },

    /// Input failed validation before anything was written.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Database connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Transaction begin/commit failed.
    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    /// Disk or file I/O failure (photo files, backup artifacts).
    #[error("storage failure: {0}")]
    Storage(String),

    /// Backup artifact malformed, version unsupported, or its internal
    /// references cannot be resolved. The destination dataset is left as
    /// it was before the import started.
    #[error("backup import failed: {0}")]
    ImportIntegrity(String),

    /// Internal data layer error.
    #[error("internal data layer error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and id.
    pub fn not_found(entity: impl Into<String>, id: impl std::fmt::Display) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Creates an ImportIntegrity error.
    pub fn import_integrity(message: impl Into<String>) -> Self {
        DbError::ImportIntegrity(message.into())
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → DbError::QueryFailed (message kept)
/// sqlx::Error::PoolTimedOut   → DbError::ConnectionFailed
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => DbError::QueryFailed(db_err.message().to_string()),

            sqlx::Error::PoolTimedOut => {
                DbError::ConnectionFailed("connection pool exhausted".to_string())
            }

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<std::io::Error> for DbError {
    fn from(err: std::io::Error) -> Self {
        DbError::Storage(err.to_string())
    }
}

/// Result type for data layer operations.
pub type DbResult<T> = Result<T, DbError>;
