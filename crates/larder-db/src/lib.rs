//! # larder-db: Data Layer for Larder
//!
//! This crate provides persistence for the Larder expiration tracker.
//! It uses SQLite for local storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Larder Data Flow                                │
//! │                                                                         │
//! │  UI action (form submit, barcode scan, backup tap)                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     larder-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌────────────────┐   ┌───────────────┐  │   │
//! │  │   │ Record Store  │   │  Repositories  │   │ Id Allocator  │  │   │
//! │  │   │  (pool.rs)    │   │ product/batch/ │   │   (id.rs)     │  │   │
//! │  │   │               │   │ store/category │   │               │  │   │
//! │  │   │ SqlitePool    │◄──│                │──►│ MAX(id) + 1   │  │   │
//! │  │   │ + write gate  │   │                │   │ in-transaction│  │   │
//! │  │   └───────────────┘   └────────────────┘   └───────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌────────────────┐                       │   │
//! │  │   │    Backup     │   │  Photo files   │                       │   │
//! │  │   │ (backup.rs)   │   │  (images.rs)   │                       │   │
//! │  │   └───────────────┘   └────────────────┘                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database + photo directory on device storage                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool, configuration and the single-writer
//!   transaction scope
//! - [`migrations`] - Embedded database migrations
//! - [`id`] - Manual integer id allocation
//! - [`error`] - Data layer error types
//! - [`repository`] - Repository implementations (product, batch, store,
//!   category)
//! - [`images`] - Photo-file collaborator
//! - [`backup`] - Portable artifact export/import
//!
//! ## Usage
//!
//! ```rust,ignore
//! use larder_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/larder.db")).await?;
//!
//! let id = db.products().create(new_product, false).await?;
//! let stores = db.stores().get_all_stores().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod backup;
pub mod error;
pub mod id;
pub mod images;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use images::ImageStore;
pub use pool::{Database, DbConfig, WriteTxn};

// Repository re-exports for convenience
pub use repository::batch::BatchRepository;
pub use repository::category::CategoryRepository;
pub use repository::product::ProductRepository;
pub use repository::store::StoreRegistry;

// Backup surface
pub use backup::{export_backup, import_backup, BackupArtifact, ImportSummary, BACKUP_VERSION};
