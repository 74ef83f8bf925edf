//! # Validation Module
//!
//! Input validation utilities for Tally.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Request decoding (serde)                                     │
//! │  ├── Closed enums: unknown directions / ref types never decode         │
//! │  └── Decimal parsing                                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (business rules)                                 │
//! │  ├── quantity > 0, money >= 0                                          │
//! │  └── codes and references present and bounded                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (stock >= 0)                                                │
//! │  └── Append-only triggers on stock_cards                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::validation::{validate_product_code, validate_stock_quantity};
//!
//! validate_product_code("KOPI-250").unwrap();
//! validate_stock_quantity(5).unwrap();
//! assert!(validate_stock_quantity(0).is_err());
//! ```

use rust_decimal::Decimal;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{Percentage, ProductStock, StockMovement};
use crate::MAX_CODE_LENGTH;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product code (business key).
///
/// ## Rules
/// - Must not be empty
/// - At most [`MAX_CODE_LENGTH`] characters
/// - Only alphanumeric characters, hyphens, underscores, dots
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_product_code;
///
/// assert!(validate_product_code("KOPI-250").is_ok());
/// assert!(validate_product_code("").is_err());
/// assert!(validate_product_code("A".repeat(100).as_str()).is_err());
/// ```
pub fn validate_product_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "code".to_string(),
        });
    }

    if code.chars().count() > MAX_CODE_LENGTH {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: MAX_CODE_LENGTH,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must contain only letters, numbers, hyphens, underscores and dots"
                .to_string(),
        });
    }

    Ok(())
}

/// Validates a product name.
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates an identifier or document reference: present and bounded.
///
/// `field` names the offending input in the error.
pub fn validate_reference(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > MAX_CODE_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_CODE_LENGTH,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates an order line quantity (fractional allowed, must be > 0).
pub fn validate_order_quantity(quantity: Decimal) -> ValidationResult<()> {
    if quantity <= Decimal::ZERO {
        return Err(ValidationError::must_be_positive("quantity"));
    }
    Ok(())
}

/// Validates a stock movement quantity (whole units, must be > 0).
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_stock_quantity;
///
/// assert!(validate_stock_quantity(1).is_ok());
/// assert!(validate_stock_quantity(0).is_err());
/// assert!(validate_stock_quantity(-3).is_err());
/// ```
pub fn validate_stock_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::must_be_positive("quantity"));
    }
    Ok(())
}

/// Validates that a monetary input is zero or greater.
pub fn validate_non_negative(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::must_not_be_negative(field));
    }
    Ok(())
}

/// Validates that a percentage rate is zero or greater.
///
/// Rates above 100 are allowed; a 150% VAT is unusual but not wrong.
pub fn validate_rate(field: &str, rate: Percentage) -> ValidationResult<()> {
    if rate.is_negative() {
        return Err(ValidationError::must_not_be_negative(field));
    }
    Ok(())
}

// =============================================================================
// Composite Validators
// =============================================================================

/// Validates a stock movement before it reaches the ledger.
///
/// ## Rules
/// - `product_id` and `ref_code` present
/// - `quantity > 0`
/// - `unit_cost >= 0` whenever supplied, in either direction
pub fn validate_movement(movement: &StockMovement) -> ValidationResult<()> {
    validate_reference("product_id", &movement.product_id)?;
    validate_stock_quantity(movement.quantity)?;
    validate_reference("ref_code", &movement.ref_code)?;

    if let Some(cost) = movement.unit_cost {
        validate_non_negative("unit_cost", cost)?;
    }

    Ok(())
}

/// Validates a product record before it is registered.
pub fn validate_product(product: &ProductStock) -> ValidationResult<()> {
    validate_reference("id", &product.id)?;
    validate_product_code(&product.code)?;
    validate_product_name(&product.name)?;

    if product.stock < 0 {
        return Err(ValidationError::must_not_be_negative("stock"));
    }
    validate_non_negative("cost_price", product.cost_price)
}

// =============================================================================
// Unit Tests
// =============================================================================
