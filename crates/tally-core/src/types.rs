//! # Domain Types
//!
//! Core domain types used throughout Tally.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  PRICING (pure, per request)                                            │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ PricingRequest  │──►│ OrderLineResult │──►│  OrderTotals    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  kind           │   │  total_amount   │   │  subtotal       │       │
//! │  │  lines[]        │   │  unit_effective │   │  discount, VAT  │       │
//! │  │  discount, VAT  │   │  profit (sales) │   │  final_amount   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  STOCK (persisted by the ledger)                                        │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  ProductStock   │   │  StockMovement  │──►│ StockCardEntry  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id, code, name │   │  product_id     │   │  stock_before   │       │
//! │  │  stock (i64)    │   │  quantity > 0   │   │  stock_after    │       │
//! │  │  cost_price     │   │  IN / OUT       │   │  append-only    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Products carry:
//! - `id`: opaque, immutable, used for relations and the ledger
//! - `code`: human-readable business key shown in error messages

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Percentage
// =============================================================================

/// A rate expressed in percent, e.g. `10` for 10%.
///
/// ## Why Decimal Percent?
/// Order discounts and VAT rates arrive as percents with arbitrary decimals
/// (`8.25`). Keeping them as `Decimal` means `amount * rate / 100` is exact
/// until the single rounding step at output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percentage(Decimal);

impl Percentage {
    /// Creates a percentage from its decimal value in percent.
    #[inline]
    pub const fn from_decimal(value: Decimal) -> Self {
        Percentage(value)
    }

    /// Returns the rate in percent.
    #[inline]
    pub const fn value(&self) -> Decimal {
        self.0
    }

    /// Zero rate.
    #[inline]
    pub const fn zero() -> Self {
        Percentage(Decimal::ZERO)
    }

    /// Checks if the rate is zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Checks if the rate is below zero.
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

// =============================================================================
// Order Kind & Discount Kind
// =============================================================================

/// Which side of the business an order is on.
///
/// Only sales orders compute profit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    /// Goods bought from a supplier.
    Purchase,
    /// Goods sold to a customer.
    Sales,
}

/// How `discount_value` on an order is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    /// Flat amount subtracted from the subtotal.
    #[default]
    Amount,
    /// Percent of the subtotal.
    Percent,
}

// =============================================================================
// Order Lines
// =============================================================================

/// One priced line on a purchase or sales order, as entered by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderLineInput {
    /// Quantity ordered; fractional quantities are allowed.
    #[ts(as = "String")]
    pub quantity: Decimal,

    /// Price per unit before the line discount.
    #[ts(as = "String")]
    pub unit_price: Money,

    /// Flat discount on the whole line.
    #[serde(default)]
    #[ts(as = "String")]
    pub line_discount: Money,

    /// Unit cost, used for profit on sales orders only.
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub cost_price: Option<Money>,
}

impl OrderLineInput {
    /// Creates a line with no discount and no cost price.
    pub fn new(quantity: Decimal, unit_price: Money) -> Self {
        Self {
            quantity,
            unit_price,
            line_discount: Money::zero(),
            cost_price: None,
        }
    }

    /// Sets the flat line discount.
    pub fn with_discount(mut self, discount: Money) -> Self {
        self.line_discount = discount;
        self
    }

    /// Sets the unit cost used for profit.
    pub fn with_cost_price(mut self, cost_price: Money) -> Self {
        self.cost_price = Some(cost_price);
        self
    }
}

/// A line after pricing. Derived, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderLineResult {
    /// 1-based position in the request.
    pub line: usize,
    #[ts(as = "String")]
    pub quantity: Decimal,
    #[ts(as = "String")]
    pub unit_price: Money,
    #[ts(as = "String")]
    pub line_discount: Money,
    /// `unit_price × quantity − line_discount`.
    #[ts(as = "String")]
    pub total_amount: Money,
    /// `total_amount ÷ quantity`.
    #[ts(as = "String")]
    pub unit_effective_price: Money,
    /// Sales orders with a cost price only.
    #[ts(as = "Option<String>")]
    pub profit: Option<Money>,
}

// =============================================================================
// Order Totals
// =============================================================================

/// Order-level totals derived from the priced lines.
///
/// ## Calculation Chain
/// ```text
/// subtotal = Σ line.total_amount
///     │
///     ▼  − discount_amount (flat, or subtotal × discount_value / 100)
/// after_discount
///     │
///     ▼  + vat_amount (after_discount × vat_rate / 100) + other_fee
/// final_amount
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderTotals {
    #[ts(as = "String")]
    pub subtotal: Money,
    pub discount_kind: DiscountKind,
    #[ts(as = "String")]
    pub discount_value: Decimal,
    #[ts(as = "String")]
    pub discount_amount: Money,
    #[ts(as = "String")]
    pub after_discount: Money,
    #[ts(as = "String")]
    pub vat_rate: Percentage,
    #[ts(as = "String")]
    pub vat_amount: Money,
    #[ts(as = "String")]
    pub other_fee: Money,
    #[ts(as = "String")]
    pub final_amount: Money,
    /// Sum of line profits; `None` for purchase orders.
    #[ts(as = "Option<String>")]
    pub total_profit: Option<Money>,
}

// =============================================================================
// Pricing Request / Result
// =============================================================================

/// Everything the calculator needs to price one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PricingRequest {
    pub kind: OrderKind,
    pub lines: Vec<OrderLineInput>,
    #[serde(default)]
    pub discount_kind: DiscountKind,
    #[serde(default)]
    #[ts(as = "String")]
    pub discount_value: Decimal,
    #[serde(default)]
    #[ts(as = "String")]
    pub vat_rate: Percentage,
    #[serde(default)]
    #[ts(as = "String")]
    pub other_fee: Money,
}

impl PricingRequest {
    /// Creates a request with no discount, no VAT and no fee.
    pub fn new(kind: OrderKind, lines: Vec<OrderLineInput>) -> Self {
        Self {
            kind,
            lines,
            discount_kind: DiscountKind::default(),
            discount_value: Decimal::ZERO,
            vat_rate: Percentage::zero(),
            other_fee: Money::zero(),
        }
    }
}

/// The calculator's output: per-line results plus order totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PricedOrder {
    pub lines: Vec<OrderLineResult>,
    pub totals: OrderTotals,
}

// =============================================================================
// Product Stock
// =============================================================================

/// The stock-relevant slice of a product record.
///
/// `stock` changes only through the ledger; `cost_price` changes only on
/// inbound movements that carry a unit cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductStock {
    pub id: String,
    pub code: String,
    pub name: String,
    pub stock: i64,
    /// Weighted-average unit cost.
    #[ts(as = "String")]
    pub cost_price: Money,
}

impl ProductStock {
    /// A product with no stock and no cost basis yet.
    pub fn new(id: impl Into<String>, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
            name: name.into(),
            stock: 0,
            cost_price: Money::zero(),
        }
    }
}

// =============================================================================
// Movement Direction & Reference Type
// =============================================================================

/// Whether a movement adds or removes stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum MovementDirection {
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "OUT")]
    Out,
}

impl MovementDirection {
    /// Storage / wire representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MovementDirection::In => "IN",
            MovementDirection::Out => "OUT",
        }
    }

    /// `+1` for IN, `-1` for OUT.
    pub const fn sign(&self) -> i64 {
        match self {
            MovementDirection::In => 1,
            MovementDirection::Out => -1,
        }
    }
}

impl fmt::Display for MovementDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN" => Ok(MovementDirection::In),
            "OUT" => Ok(MovementDirection::Out),
            other => Err(format!("unknown movement direction: {other}")),
        }
    }
}

/// The kind of document a movement is tied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum RefType {
    Purchase,
    Sale,
}

impl RefType {
    /// Storage / wire representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            RefType::Purchase => "purchase",
            RefType::Sale => "sale",
        }
    }
}

impl fmt::Display for RefType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase" => Ok(RefType::Purchase),
            "sale" => Ok(RefType::Sale),
            other => Err(format!("unknown reference type: {other}")),
        }
    }
}

// =============================================================================
// Stock Movement
// =============================================================================

/// A request to move stock for one product, tied to a reference document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockMovement {
    pub product_id: String,
    /// Always positive; `direction` carries the sign.
    pub quantity: i64,
    /// Inbound unit cost. Ignored for OUT.
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub unit_cost: Option<Money>,
    /// Document number, e.g. `PO-2024-0012`.
    pub ref_code: String,
    pub ref_type: RefType,
    pub direction: MovementDirection,
    #[serde(default)]
    pub note: Option<String>,
    /// Who triggered the movement.
    #[serde(default)]
    pub actor: Option<String>,
}

impl StockMovement {
    /// An inbound movement from a purchase document.
    pub fn inbound(
        product_id: impl Into<String>,
        quantity: i64,
        unit_cost: Option<Money>,
        ref_code: impl Into<String>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            unit_cost,
            ref_code: ref_code.into(),
            ref_type: RefType::Purchase,
            direction: MovementDirection::In,
            note: None,
            actor: None,
        }
    }

    /// An outbound movement from a sales document.
    pub fn outbound(product_id: impl Into<String>, quantity: i64, ref_code: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            unit_cost: None,
            ref_code: ref_code.into(),
            ref_type: RefType::Sale,
            direction: MovementDirection::Out,
            note: None,
            actor: None,
        }
    }

    /// Sets the actor recorded on the stock card.
    pub fn by(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Sets a free-text note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Quantity with the direction's sign applied.
    pub fn signed_quantity(&self) -> i64 {
        self.quantity * self.direction.sign()
    }
}

// =============================================================================
// Stock Card Entry
// =============================================================================

/// One immutable row of a product's stock card.
///
/// ## Chain Invariant
/// ```text
/// entry[n].stock_after  = entry[n].stock_before + entry[n].signed_quantity
/// entry[n+1].stock_before = entry[n].stock_after
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockCardEntry {
    pub id: String,
    pub product_id: String,
    pub ref_code: String,
    pub ref_type: RefType,
    pub direction: MovementDirection,
    pub signed_quantity: i64,
    /// The supplied inbound cost, or the cost basis at the time of movement.
    #[ts(as = "String")]
    pub unit_cost: Money,
    pub stock_before: i64,
    pub stock_after: i64,
    pub note: Option<String>,
    pub actor: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Movement Result
// =============================================================================

/// What one applied movement did to its product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MovementResult {
    pub product_id: String,
    pub product_code: String,
    pub stock_before: i64,
    pub stock_after: i64,
    pub quantity_moved: i64,
    pub direction: MovementDirection,
    /// Cost basis after the movement.
    #[ts(as = "String")]
    pub cost_after: Money,
}

// =============================================================================
// Queries
// =============================================================================

/// Current stock of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockLevel {
    pub product_id: String,
    pub code: String,
    pub name: String,
    pub stock: i64,
    #[ts(as = "String")]
    pub cost_price: Money,
}

impl From<ProductStock> for StockLevel {
    fn from(product: ProductStock) -> Self {
        Self {
            product_id: product.id,
            code: product.code,
            name: product.name,
            stock: product.stock,
            cost_price: product.cost_price,
        }
    }
}

/// Answer to "can I take `requested` units right now?".
///
/// Advisory only: nothing is reserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Availability {
    pub product_id: String,
    pub requested: i64,
    pub available: bool,
    pub current_stock: i64,
}

/// Half-open time window `[from, to)` over stock card entries.
///
/// A missing bound is unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TimeRange {
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub to: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// The whole history.
    pub const fn all() -> Self {
        Self { from: None, to: None }
    }

    /// Checks whether `at` falls inside the window.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| at >= from) && self.to.map_or(true, |to| at < to)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
