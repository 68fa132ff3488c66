//! # Domain Types
//!
//! Core domain types used throughout Larder.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │     Batch       │   │     Store       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (i64)       │──►│  id (i64)       │   │  id (UUID|"")   │       │
//! │  │  code (barcode) │   │  label          │   │  name           │       │
//! │  │  store (ref)    │   │  exp_date       │   └─────────────────┘       │
//! │  │  categories     │   │  amount, price  │                             │
//! │  └─────────────────┘   │  status         │   ┌─────────────────┐       │
//! │                        └─────────────────┘   │    Category     │       │
//! │  ┌─────────────────┐   ┌─────────────────┐   │  ─────────────  │       │
//! │  │    StoreRef     │   │   BatchStatus   │   │  id (UUID)      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  name           │       │
//! │  │  Id(uuid)       │   │  Pending        │   └─────────────────┘       │
//! │  │  Name(legacy)   │   │  Treated        │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity Scheme
//! Products and batches carry integer ids handed out by the data layer
//! (the record store has no native sequence generation). Stores and
//! categories carry UUID v4 strings. A store may additionally be referenced
//! the old way, by raw name — see [`StoreRef`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::money::Money;

// =============================================================================
// Batch Status
// =============================================================================

/// Whether a batch still needs attention.
///
/// `Treated` marks batches the user already resolved (used up, discarded,
/// returned). Everything else is actionable and sorts into `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum BatchStatus {
    Pending,
    Treated,
}

impl BatchStatus {
    /// Parses a persisted status value.
    ///
    /// Unknown or blank values fold to `Pending`: an unrecognized status must
    /// stay visible in the actionable bucket, never be dropped.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("treated") {
            BatchStatus::Treated
        } else {
            BatchStatus::Pending
        }
    }

    /// The canonical persisted form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Treated => "treated",
        }
    }
}

impl Default for BatchStatus {
    fn default() -> Self {
        BatchStatus::Pending
    }
}

// =============================================================================
// Store Reference
// =============================================================================

/// A product's store reference, under either identity scheme.
///
/// Historically a product's store was recorded as a raw name string. Stores
/// later became first-class UUID-identified records, but old product rows
/// keep their name references until promoted. Both forms must keep working:
///
/// ```text
/// raw column value          StoreRef
/// ─────────────────         ──────────────────────────
/// "d9c6…-uuid"         ──►  Id("d9c6…-uuid")
/// "Corner Market"      ──►  Name("Corner Market")
/// NULL / ""            ──►  (none — no store assigned)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum StoreRef {
    /// Reference to a [`Store`] record by UUID.
    Id(String),
    /// Legacy reference by raw store name.
    Name(String),
}

impl StoreRef {
    /// Classifies a raw persisted value.
    ///
    /// Returns `None` for blank values, which normalize to "no store
    /// assigned".
    pub fn from_raw(raw: &str) -> Option<StoreRef> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if Uuid::parse_str(raw).is_ok() {
            Some(StoreRef::Id(raw.to_string()))
        } else {
            Some(StoreRef::Name(raw.to_string()))
        }
    }

    /// The raw value as persisted on the product record.
    pub fn as_raw(&self) -> &str {
        match self {
            StoreRef::Id(id) => id,
            StoreRef::Name(name) => name,
        }
    }

    /// The store UUID, when referenced by id.
    pub fn id(&self) -> Option<&str> {
        match self {
            StoreRef::Id(id) => Some(id),
            StoreRef::Name(_) => None,
        }
    }
}

// =============================================================================
// Entities
// =============================================================================

/// A tracked inventory item, optionally barcoded, optionally store-scoped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    /// Unique identifier, allocated by the data layer. Immutable once
    /// assigned.
    pub id: i64,

    /// Display name. Required, non-empty after trim.
    pub name: String,

    /// Optional barcode/SKU. Uniqueness is scoped by `(code, store)`:
    /// the same code may exist in two different stores.
    pub code: Option<String>,

    /// File name of an externally managed photo.
    pub photo: Option<String>,

    /// Store reference, or `None` for "no store assigned".
    pub store: Option<StoreRef>,

    /// Category ids, in display order. Current UI usage keeps at most one.
    pub categories: Vec<String>,

    /// Owned batches, in creation order.
    pub batches: Vec<Batch>,
}

/// A dated quantity of a product with its own expiration and status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Batch {
    /// Unique identifier, allocated from a single counter shared by all
    /// batches (not scoped per product).
    pub id: i64,

    /// Free-text batch label (e.g. the lot number printed on the package).
    pub label: String,

    /// Unit count on hand. Never negative.
    pub amount: i64,

    /// Unit price, when captured. Absent means "no price data",
    /// which is distinct from a free item priced at zero.
    pub price: Option<Money>,

    /// Expiration date.
    #[ts(as = "String")]
    pub exp_date: NaiveDate,

    /// Actionable vs. resolved.
    pub status: BatchStatus,
}

/// A physical/logical location a product can be scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Store {
    /// UUID v4, or the empty-string sentinel for a legacy store that exists
    /// only as a name reference on products.
    pub id: String,

    /// Display name. Unique among real stores (case-insensitive).
    pub name: String,
}

impl Store {
    /// Whether this entry is a not-yet-promoted legacy store.
    pub fn is_legacy(&self) -> bool {
        self.id.is_empty()
    }
}

/// A product category. Lifecycle independent of products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Category {
    /// UUID v4.
    pub id: String,

    /// Display name.
    pub name: String,
}

// =============================================================================
// Input Payloads
// =============================================================================

/// Payload for creating a product, with any initial batches.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub store: Option<StoreRef>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub batches: Vec<NewBatch>,
}

/// Payload for creating a batch under a product.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewBatch {
    pub label: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub price: Option<Money>,
    #[ts(as = "String")]
    pub exp_date: NaiveDate,
    #[serde(default)]
    pub status: BatchStatus,
}

/// Partial update for a product, keyed by id.
///
/// The outer `Option` on each field means "was this field supplied";
/// the inner `Option` (where present) carries nullability:
///
/// ```text
/// field value                 effect on the stored record
/// ─────────────────           ───────────────────────────
/// name: None                  left untouched
/// name: Some(n)               replaced with n
/// store: Some(None)           cleared (no store assigned)
/// store: Some(Some(ref))      replaced with ref
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductPatch {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub code: Option<Option<String>>,
    #[serde(default)]
    pub photo: Option<Option<String>>,
    #[serde(default)]
    pub store: Option<Option<StoreRef>>,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
}

impl ProductPatch {
    /// An empty patch for the given product id.
    pub fn new(id: i64) -> Self {
        ProductPatch {
            id,
            name: None,
            code: None,
            photo: None,
            store: None,
            categories: None,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_known_values() {
        assert_eq!(BatchStatus::parse("treated"), BatchStatus::Treated);
        assert_eq!(BatchStatus::parse("Treated"), BatchStatus::Treated);
        assert_eq!(BatchStatus::parse("pending"), BatchStatus::Pending);
    }

    #[test]
    fn test_status_parse_unknown_folds_to_pending() {
        assert_eq!(BatchStatus::parse(""), BatchStatus::Pending);
        assert_eq!(BatchStatus::parse("checado"), BatchStatus::Pending);
        assert_eq!(BatchStatus::parse("  "), BatchStatus::Pending);
    }

    #[test]
    fn test_store_ref_classification() {
        let uuid = "c56a4180-65aa-42ec-a945-5fd21dec0538";
        assert_eq!(
            StoreRef::from_raw(uuid),
            Some(StoreRef::Id(uuid.to_string()))
        );
        assert_eq!(
            StoreRef::from_raw("Corner Market"),
            Some(StoreRef::Name("Corner Market".to_string()))
        );
        assert_eq!(StoreRef::from_raw(""), None);
        assert_eq!(StoreRef::from_raw("   "), None);
    }

    #[test]
    fn test_legacy_store_sentinel() {
        let legacy = Store {
            id: String::new(),
            name: "Old Market".to_string(),
        };
        assert!(legacy.is_legacy());

        let real = Store {
            id: "c56a4180-65aa-42ec-a945-5fd21dec0538".to_string(),
            name: "Old Market".to_string(),
        };
        assert!(!real.is_legacy());
    }
}
