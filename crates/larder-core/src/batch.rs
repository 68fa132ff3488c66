//! # Batch Rules
//!
//! Pure ordering, partitioning and classification rules for batches.
//!
//! ## Where These Run
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Batch Rules in the App                             │
//! │                                                                         │
//! │  Product details screen                                                │
//! │  ├── sort_by_exp_date()        earliest-expiring batch first           │
//! │  └── partition_by_status()     "Treated" section vs actionable list    │
//! │                                                                         │
//! │  Home / store / category lists                                         │
//! │  ├── sort_products_by_next_exp()  most urgent product first            │
//! │  └── expiry_status()              red (expired) / yellow (soon) card   │
//! │                                                                         │
//! │  Product card                                                          │
//! │  └── total_value()             amount × price, when both are known     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{Batch, BatchStatus, Product};

// =============================================================================
// Ordering
// =============================================================================

/// Sorts batches ascending by expiration date.
///
/// The sort is stable: batches sharing an expiration date keep their
/// relative order, and sorting an already-sorted sequence returns it
/// unchanged. Callers rely on "earliest-expiring first".
pub fn sort_by_exp_date(mut batches: Vec<Batch>) -> Vec<Batch> {
    batches.sort_by_key(|b| b.exp_date);
    batches
}

/// Sorts each product's batches by expiration, then orders the products by
/// their first batch's expiration date.
///
/// Products without batches sort last. Used by every list screen so the
/// most urgent product is at the top.
pub fn sort_products_by_next_exp(mut products: Vec<Product>) -> Vec<Product> {
    for product in &mut products {
        product.batches.sort_by_key(|b| b.exp_date);
    }
    products.sort_by_key(|p| match p.batches.first() {
        Some(batch) => (false, batch.exp_date),
        None => (true, NaiveDate::MAX),
    });
    products
}

// =============================================================================
// Status Partition
// =============================================================================

/// Splits batches into `(treated, pending)`.
///
/// The partition is total and disjoint: every batch lands in exactly one
/// bucket, and anything that is not `Treated` — including statuses a newer
/// app version might write — counts as pending. Input order is preserved
/// within each bucket.
pub fn partition_by_status(batches: Vec<Batch>) -> (Vec<Batch>, Vec<Batch>) {
    batches
        .into_iter()
        .partition(|b| b.status == BatchStatus::Treated)
}

/// The earliest-expiring batch that still needs attention.
pub fn next_pending_batch(product: &Product) -> Option<&Batch> {
    product
        .batches
        .iter()
        .filter(|b| b.status != BatchStatus::Treated)
        .min_by_key(|b| b.exp_date)
}

// =============================================================================
// Totals
// =============================================================================

/// The total value held in a batch: `amount × price`.
///
/// Returns `None` unless both amount and price are strictly positive —
/// absence distinguishes "no price data" from a free item worth zero.
pub fn total_value(batch: &Batch) -> Option<Money> {
    match batch.price {
        Some(price) if price.is_positive() && batch.amount > 0 => Some(price * batch.amount),
        _ => None,
    }
}

// =============================================================================
// Expiry Classification
// =============================================================================

/// How close a batch is to its expiration date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ExpiryStatus {
    /// The expiration date is in the past.
    Expired,
    /// Expires within the warning window.
    NextToExpire,
    /// Nothing to flag yet.
    Ok,
}

/// Classifies a batch against `today` and a warning window in days.
///
/// The window is passed explicitly — it is a user preference owned by the
/// UI layer (30 days unless changed), never ambient state read from here.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use larder_core::batch::{expiry_status, ExpiryStatus};
/// use larder_core::types::{Batch, BatchStatus};
///
/// let batch = Batch {
///     id: 1,
///     label: "L-7".to_string(),
///     amount: 2,
///     price: None,
///     exp_date: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
///     status: BatchStatus::Pending,
/// };
/// let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
/// assert_eq!(expiry_status(&batch, today, 30), ExpiryStatus::NextToExpire);
/// ```
pub fn expiry_status(batch: &Batch, today: NaiveDate, warn_days: u32) -> ExpiryStatus {
    if batch.exp_date < today {
        return ExpiryStatus::Expired;
    }

    let window_end = today
        .checked_add_days(Days::new(u64::from(warn_days)))
        .unwrap_or(NaiveDate::MAX);

    if batch.exp_date <= window_end {
        ExpiryStatus::NextToExpire
    } else {
        ExpiryStatus::Ok
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn batch(id: i64, label: &str, exp: NaiveDate, status: BatchStatus) -> Batch {
        Batch {
            id,
            label: label.to_string(),
            amount: 1,
            price: None,
            exp_date: exp,
            status,
        }
    }

    #[test]
    fn test_sort_by_exp_date_ascending() {
        let sorted = sort_by_exp_date(vec![
            batch(1, "late", date(2026, 6, 1), BatchStatus::Pending),
            batch(2, "early", date(2026, 1, 1), BatchStatus::Pending),
            batch(3, "mid", date(2026, 3, 1), BatchStatus::Pending),
        ]);

        let labels: Vec<&str> = sorted.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["early", "mid", "late"]);
    }

    #[test]
    fn test_sort_is_stable_and_idempotent() {
        let same_day = vec![
            batch(1, "first", date(2026, 1, 1), BatchStatus::Pending),
            batch(2, "second", date(2026, 1, 1), BatchStatus::Pending),
            batch(3, "third", date(2026, 1, 1), BatchStatus::Pending),
        ];

        let once = sort_by_exp_date(same_day.clone());
        assert_eq!(once, same_day);

        let twice = sort_by_exp_date(once.clone());
        assert_eq!(twice, once);
    }

    #[test]
    fn test_partition_is_total_and_disjoint() {
        let batches = vec![
            batch(1, "a", date(2026, 1, 1), BatchStatus::Treated),
            batch(2, "b", date(2026, 1, 2), BatchStatus::Pending),
            // A status an unknown writer produced, folded at decode time.
            batch(3, "c", date(2026, 1, 3), BatchStatus::parse("???")),
            batch(4, "d", date(2026, 1, 4), BatchStatus::Treated),
        ];

        let (treated, pending) = partition_by_status(batches);

        assert_eq!(treated.len() + pending.len(), 4);
        assert!(treated.iter().all(|b| b.status == BatchStatus::Treated));
        assert!(pending.iter().all(|b| b.status != BatchStatus::Treated));
        // Unknown status never disappears; it lands in pending.
        assert!(pending.iter().any(|b| b.label == "c"));
        // Input order preserved within buckets.
        let treated_labels: Vec<&str> = treated.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(treated_labels, vec!["a", "d"]);
    }

    #[test]
    fn test_total_value_requires_positive_amount_and_price() {
        let mut b = batch(1, "a", date(2026, 1, 1), BatchStatus::Pending);

        b.amount = 10;
        b.price = Some(Money::from_cents(349));
        assert_eq!(total_value(&b), Some(Money::from_cents(3490)));

        b.price = None;
        assert_eq!(total_value(&b), None);

        b.price = Some(Money::zero());
        assert_eq!(total_value(&b), None);

        b.price = Some(Money::from_cents(349));
        b.amount = 0;
        assert_eq!(total_value(&b), None);
    }

    #[test]
    fn test_expiry_status_boundaries() {
        let today = date(2026, 3, 1);
        let window = 30;

        let yesterday = batch(1, "a", date(2026, 2, 28), BatchStatus::Pending);
        assert_eq!(expiry_status(&yesterday, today, window), ExpiryStatus::Expired);

        let today_batch = batch(2, "b", today, BatchStatus::Pending);
        assert_eq!(
            expiry_status(&today_batch, today, window),
            ExpiryStatus::NextToExpire
        );

        let window_edge = batch(3, "c", date(2026, 3, 31), BatchStatus::Pending);
        assert_eq!(
            expiry_status(&window_edge, today, window),
            ExpiryStatus::NextToExpire
        );

        let beyond = batch(4, "d", date(2026, 4, 1), BatchStatus::Pending);
        assert_eq!(expiry_status(&beyond, today, window), ExpiryStatus::Ok);
    }

    #[test]
    fn test_next_pending_batch_skips_treated() {
        let product = Product {
            id: 1,
            name: "Milk".to_string(),
            code: None,
            photo: None,
            store: None,
            categories: vec![],
            batches: vec![
                batch(1, "treated-early", date(2026, 1, 1), BatchStatus::Treated),
                batch(2, "pending-late", date(2026, 5, 1), BatchStatus::Pending),
                batch(3, "pending-early", date(2026, 2, 1), BatchStatus::Pending),
            ],
        };

        let next = next_pending_batch(&product).unwrap();
        assert_eq!(next.label, "pending-early");
    }

    #[test]
    fn test_sort_products_by_next_exp_puts_batchless_last() {
        let p = |id: i64, name: &str, batches: Vec<Batch>| Product {
            id,
            name: name.to_string(),
            code: None,
            photo: None,
            store: None,
            categories: vec![],
            batches,
        };

        let sorted = sort_products_by_next_exp(vec![
            p(1, "empty", vec![]),
            p(
                2,
                "urgent",
                vec![batch(1, "a", date(2026, 1, 1), BatchStatus::Pending)],
            ),
            p(
                3,
                "later",
                vec![
                    batch(2, "b", date(2026, 6, 1), BatchStatus::Pending),
                    batch(3, "c", date(2026, 2, 1), BatchStatus::Pending),
                ],
            ),
        ]);

        let names: Vec<&str> = sorted.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["urgent", "later", "empty"]);
        // Nested batches were sorted too.
        assert_eq!(sorted[1].batches[0].label, "c");
    }
}
