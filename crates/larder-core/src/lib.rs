//! # larder-core: Pure Domain Logic for Larder
//!
//! This crate is the **heart** of Larder, a perishable-product expiration
//! tracker. It contains the domain rules as pure functions with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Larder Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Mobile UI (out of scope)                     │   │
//! │  │    Product forms ──► Batch lists ──► Store filter ──► Backup   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ larder-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   batch   │  │   money   │  │ validation│  │   │
//! │  │   │  Product  │  │  sorting  │  │   Money   │  │   rules   │  │   │
//! │  │   │  StoreRef │  │  expiry   │  │  (cents)  │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    larder-db (Data Layer)                       │   │
//! │  │          SQLite record store, repositories, backup              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Batch, Store, Category, StoreRef)
//! - [`batch`] - Batch ordering, status partitioning, expiry classification
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Validation error types
//! - [`validation`] - Input validation rules

pub mod batch;
pub mod error;
pub mod money;
pub mod types;
pub mod validation;

pub use batch::ExpiryStatus;
pub use error::ValidationError;
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default size of the "next to expire" warning window, in days.
///
/// A batch whose expiration date falls within this many days of today is
/// classified as [`ExpiryStatus::NextToExpire`]. The UI lets users change the
/// window; callers pass their effective value into
/// [`batch::expiry_status`] explicitly rather than reading ambient state.
pub const DEFAULT_DAYS_TO_BE_NEXT_TO_EXPIRE: u32 = 30;

/// Sentinel id carried by [`types::Store`] entries that exist only as a
/// name reference on products (the pre-UUID identity scheme).
pub const LEGACY_STORE_ID: &str = "";
