//! # tally-core: Pure Business Logic for Tally
//!
//! This crate is the **heart** of the inventory ledger and order pricing
//! engine. It contains the business rules as pure functions with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Tally Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │           Order workflows (purchase / sales order forms)        │   │
//! │  │      price order ──► persist order ──► complete ──► stock       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  pricing  │  │   stock   │  │   │
//! │  │   │ OrderLine │  │   Money   │  │ Subtotal  │  │ IN / OUT  │  │   │
//! │  │   │ Movement  │  │ Rounding  │  │ VAT, fees │  │ Avg. cost │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO LOCKS • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 tally-db (Inventory Ledger)                     │   │
//! │  │     optimistic concurrency, atomic commits, SQLite / memory     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (order lines, totals, products, movements)
//! - [`money`] - Decimal money type with a single, explicit rounding step
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//! - [`pricing`] - Order pricing calculator
//! - [`stock`] - Stock movement rules, weighted-average cost, replay
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Decimal Money**: No floating point anywhere near a monetary value
//! 4. **Fail Fast**: Negative intermediates are errors, never clamped to zero
//!
//! ## Example Usage
//!
//! ```rust
//! use rust_decimal::Decimal;
//! use tally_core::pricing;
//! use tally_core::{DiscountKind, Money, OrderKind, OrderLineInput, Percentage, PricingRequest};
//!
//! let request = PricingRequest {
//!     kind: OrderKind::Purchase,
//!     lines: vec![OrderLineInput::new(Decimal::from(2), Money::from_minor(10000, 2))],
//!     discount_kind: DiscountKind::Percent,
//!     discount_value: Decimal::from(10),
//!     vat_rate: Percentage::from_decimal(Decimal::from(10)),
//!     other_fee: Money::zero(),
//! };
//!
//! let priced = pricing::calculate(&request).unwrap();
//! assert_eq!(priced.totals.final_amount, Money::from_minor(19800, 2));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod pricing;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use tally_core::Money` instead of
// `use tally_core::money::Money`

pub use error::{CoreError, CoreResult, ReplayError, ValidationError};
pub use money::Money;
pub use pricing::PricingCalculator;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Decimal places of the currency's minor unit (cents for most currencies).
///
/// Order totals are rounded to this scale exactly once, when the priced
/// order is produced. Deployments with other currencies pass their own
/// scale to [`PricingCalculator::new`].
pub const DEFAULT_CURRENCY_SCALE: u32 = 2;

/// Decimal places kept for the weighted-average unit cost of a product.
pub const COST_SCALE: u32 = 4;

/// Maximum length of product codes and document references.
pub const MAX_CODE_LENGTH: usize = 64;
