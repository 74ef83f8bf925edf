//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations                       │
//! │  ├── ValidationError  - Input validation failures                      │
//! │  └── ReplayError      - Stock card history is not self-consistent      │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                      │
//! │  ├── DbError          - Storage failures (transient: retry)            │
//! │  └── LedgerError      - What ledger callers see, with movement index   │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → LedgerError → caller              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (line, product code, quantities)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations or domain logic failures.
/// They should be caught and translated to user-friendly messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Product cannot be found.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Outbound movement would drive stock below zero.
    ///
    /// ## User Workflow
    /// ```text
    /// Complete sales order (qty: 10)
    ///      │
    ///      ▼
    /// Stock card: stock_before=5
    ///      │
    ///      ▼
    /// InsufficientStock { product_code: "KOPI-250", stock_before: 5, requested: 10 }
    ///      │
    ///      ▼
    /// UI shows: "Insufficient stock for KOPI-250: available 5, requested 10"
    /// ```
    #[error("Insufficient stock for {product_code}: available {stock_before}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        product_code: String,
        stock_before: i64,
        requested: i64,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements. They are
/// always the caller's fault and are never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be strictly greater than zero.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must be zero or greater.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// A derived value came out negative (an upstream input is wrong).
    #[error("{field} would be negative")]
    NegativeResult { field: String },

    /// Arithmetic left the representable decimal range.
    #[error("{field} is too large to compute")]
    Overflow { field: String },

    /// Invalid format (e.g., unparsable decimal in storage).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// A rule violated by a specific order line (1-based).
    #[error("line {line}: {rule}")]
    Line {
        line: usize,
        rule: Box<ValidationError>,
    },
}

impl ValidationError {
    /// Returns the 1-based order line this error refers to, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            ValidationError::Line { line, .. } => Some(*line),
            _ => None,
        }
    }

    pub(crate) fn must_be_positive(field: &str) -> Self {
        ValidationError::MustBePositive {
            field: field.to_string(),
        }
    }

    pub(crate) fn must_not_be_negative(field: &str) -> Self {
        ValidationError::MustNotBeNegative {
            field: field.to_string(),
        }
    }

    pub(crate) fn negative_result(field: &str) -> Self {
        ValidationError::NegativeResult {
            field: field.to_string(),
        }
    }

    pub(crate) fn overflow(field: &str) -> Self {
        ValidationError::Overflow {
            field: field.to_string(),
        }
    }
}

// =============================================================================
// Replay Error
// =============================================================================

/// Reasons a stock card cannot be replayed into a consistent history.
///
/// Positions are 1-based indexes into the replayed entries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayError {
    /// An entry does not start where the previous one ended.
    #[error("entry {position}: stock_before is {found}, expected {expected}")]
    Discontinuity {
        position: usize,
        expected: i64,
        found: i64,
    },

    /// An entry's own before/after does not match its signed quantity.
    #[error("entry {position}: {stock_before} {signed_quantity:+} != {stock_after}")]
    InconsistentEntry {
        position: usize,
        stock_before: i64,
        signed_quantity: i64,
        stock_after: i64,
    },

    /// Stock went below zero after an entry.
    #[error("entry {position}: stock dropped to {stock}")]
    NegativeStock { position: usize, stock: i64 },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
