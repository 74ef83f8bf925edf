//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Decimal Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  Summing 500 order lines in floats drifts by whole cents.              │
//! │                                                                         │
//! │  OUR SOLUTION: rust_decimal                                             │
//! │    • Exact base-10 arithmetic, 28 significant digits                    │
//! │    • Fractional quantities and percentage rates stay exact              │
//! │    • Rounding to the minor unit happens ONCE, at output                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use rust_decimal::Decimal;
//! use tally_core::money::Money;
//!
//! // Create from minor units (preferred for literals)
//! let price = Money::from_minor(1099, 2); // 10.99
//!
//! // Arithmetic operations keep full precision
//! let line = price.times(Decimal::from(3));      // 32.97
//! let total = line + Money::from_minor(500, 2);  // 37.97
//! assert_eq!(total, Money::from_minor(3797, 2));
//! ```

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use crate::types::Percentage;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the major currency unit, held at full decimal precision.
///
/// ## Design Decisions
/// - **Decimal (signed)**: negative values exist only transiently so that
///   validation can detect them; they are never clamped
/// - **Single field tuple struct**: Zero-cost abstraction over `Decimal`
/// - **Transparent serde**: serializes exactly like the inner decimal
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  OrderLineInput.unit_price ──► line total ──► subtotal ──► VAT ──►     │
/// │                                                              final     │
/// │                                                                         │
/// │  StockMovement.unit_cost ──► weighted-average cost ──► cost_price      │
/// │                                                                         │
/// │  EVERY monetary value in the engine flows through this type            │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Wraps a decimal amount expressed in major units.
    #[inline]
    pub const fn new(amount: Decimal) -> Self {
        Money(amount)
    }

    /// Creates a value from minor units at the given scale.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// let price = Money::from_minor(1099, 2); // 10.99
    /// assert_eq!(price.to_string(), "10.99");
    /// ```
    #[inline]
    pub fn from_minor(minor: i64, scale: u32) -> Self {
        Money(Decimal::new(minor, scale))
    }

    /// Returns the underlying decimal amount.
    #[inline]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    /// Checks if the value is zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Multiplies by a quantity, keeping full precision.
    ///
    /// Panics on decimal overflow; the pricing path uses
    /// [`Money::checked_times`] instead.
    #[inline]
    pub fn times(&self, quantity: Decimal) -> Money {
        Money(self.0 * quantity)
    }

    /// Multiplies by a quantity, returning `None` on overflow.
    #[inline]
    pub fn checked_times(&self, quantity: Decimal) -> Option<Money> {
        self.0.checked_mul(quantity).map(Money)
    }

    /// Divides by a quantity, returning `None` on a zero divisor or overflow.
    #[inline]
    pub fn checked_divide(&self, quantity: Decimal) -> Option<Money> {
        self.0.checked_div(quantity).map(Money)
    }

    /// Adds another amount, returning `None` on overflow.
    #[inline]
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Subtracts another amount, returning `None` on overflow.
    #[inline]
    pub fn checked_sub(&self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    /// Applies a percentage rate and returns the resulting portion.
    ///
    /// No rounding happens here; callers round once at output.
    ///
    /// ## Example
    /// ```rust
    /// use rust_decimal::Decimal;
    /// use tally_core::money::Money;
    /// use tally_core::types::Percentage;
    ///
    /// let base = Money::from_minor(18000, 2); // 180.00
    /// let vat = base.apply_rate(Percentage::from_decimal(Decimal::from(10)));
    /// assert_eq!(vat, Some(Money::from_minor(1800, 2)));
    /// ```
    pub fn apply_rate(&self, rate: Percentage) -> Option<Money> {
        self.0
            .checked_mul(rate.value())
            .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
            .map(Money)
    }

    /// Rounds to `scale` decimal places, half away from zero.
    ///
    /// ## Rounding Mode
    /// ```text
    /// ┌─────────────────────────────────────────────────────────────────────┐
    /// │  HALF AWAY FROM ZERO (commercial rounding)                          │
    /// │                                                                     │
    /// │    0.125 → 0.13      0.124 → 0.12      -0.125 → -0.13              │
    /// │                                                                     │
    /// │  Applied exactly once per output value, never per intermediate.    │
    /// └─────────────────────────────────────────────────────────────────────┘
    /// ```
    pub fn round_to(&self, scale: u32) -> Money {
        Money(
            self.0
                .round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero),
        )
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display shows the plain decimal amount; currency symbols are a UI concern.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Money(amount)
    }
}

/// Addition of two Money values.
impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

/// Addition assignment (+=).
impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

/// Subtraction of two Money values.
impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

/// Subtraction assignment (-=).
impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
