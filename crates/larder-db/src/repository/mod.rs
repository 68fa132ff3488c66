//! # Repository Module
//!
//! Repository implementations for the larder record store.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts record access behind a clean API.    │
//! │                                                                         │
//! │  UI form submit                                                        │
//! │       │                                                                 │
//! │       │  db.products().create(new_product, false)                      │
//! │       │  ↓                                                              │
//! │       ▼                                                                 │
//! │  ProductRepository                                                     │
//! │  ├── opens ONE write transaction                                       │
//! │  ├── duplicate check, id allocation, inserts — all inside it           │
//! │  └── commit (or rollback on any error path)                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite record store                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Product CRUD, duplicate detection, merge-by-code
//! - [`batch::BatchRepository`] - Batch CRUD under a product
//! - [`store::StoreRegistry`] - Store records plus legacy name reconciliation
//! - [`category::CategoryRepository`] - Category records

pub mod batch;
pub mod category;
pub mod product;
pub mod store;
