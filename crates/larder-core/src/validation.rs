//! # Validation Module
//!
//! Input validation rules applied before anything is written.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Mobile forms                                                 │
//! │  ├── Basic format checks (empty, length)                               │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (run by the repositories)                        │
//! │  └── The rules that must hold no matter which screen called in         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Schema (NOT NULL, defaults)                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{ValidationError, ValidationResult};

/// Validates a product name.
///
/// ## Rules
/// - Must not be empty after trimming
/// - Must be at most 200 characters
///
/// ## Example
/// ```rust
/// use larder_core::validation::validate_product_name;
///
/// assert!(validate_product_name("Whole Milk 1L").is_ok());
/// assert!(validate_product_name("   ").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a store or category name.
pub fn validate_entity_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.len() > 120 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 120,
        });
    }

    Ok(())
}

/// Validates a batch amount (unit count).
pub fn validate_batch_amount(amount: i64) -> ValidationResult<()> {
    if amount < 0 {
        return Err(ValidationError::Negative {
            field: "amount".to_string(),
        });
    }
    Ok(())
}

/// Validates a batch price in cents.
pub fn validate_batch_price(price_cents: i64) -> ValidationResult<()> {
    if price_cents < 0 {
        return Err(ValidationError::Negative {
            field: "price".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_name_rules() {
        assert!(validate_product_name("Milk").is_ok());
        assert!(validate_product_name("").is_err());
        assert!(validate_product_name("  \t ").is_err());
        assert!(validate_product_name(&"x".repeat(201)).is_err());
    }

    #[test]
    fn test_entity_name_rules() {
        assert!(validate_entity_name("store", "Corner Market").is_ok());
        assert!(validate_entity_name("store", "").is_err());
    }

    #[test]
    fn test_amount_and_price_rules() {
        assert!(validate_batch_amount(0).is_ok());
        assert!(validate_batch_amount(10).is_ok());
        assert!(validate_batch_amount(-1).is_err());
        assert!(validate_batch_price(0).is_ok());
        assert!(validate_batch_price(-5).is_err());
    }
}
