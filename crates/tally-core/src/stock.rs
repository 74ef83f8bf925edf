//! # Stock Movement Rules
//!
//! The pure half of the inventory ledger: what one movement does to one
//! product, and whether a stock card replays into the recorded balance.
//! Persistence, batching and concurrency live in `tally-db`.
//!
//! ## One Movement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  (stock_before, cost_before)                                            │
//! │          │                                                              │
//! │    ┌─────┴──────┐                                                       │
//! │    ▼            ▼                                                       │
//! │   IN           OUT                                                      │
//! │   stock += q   stock -= q  ──► < 0 ? InsufficientStock                  │
//! │   unit_cost>0? cost unchanged                                           │
//! │    └─► weighted average                                                 │
//! │          │                                                              │
//! │          ▼                                                              │
//! │  (stock_after, cost_after) + one StockCardEntry                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Weighted-Average Cost
//! ```text
//! cost_after = (stock_before × cost_before + quantity × unit_cost)
//!              ─────────────────────────────────────────────────
//!                       stock_before + quantity
//!
//! stock_before ≤ 0  →  cost_after = unit_cost
//! ```
//! The result is rounded once to [`COST_SCALE`] places.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ReplayError, ValidationError};
use crate::money::Money;
use crate::types::{
    MovementDirection, MovementResult, ProductStock, StockCardEntry, StockMovement,
};
use crate::validation::validate_movement;
use crate::COST_SCALE;

// =============================================================================
// Applying a Movement
// =============================================================================

/// The effect of one movement on one product, before it is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovementOutcome {
    pub stock_before: i64,
    pub stock_after: i64,
    pub cost_before: Money,
    pub cost_after: Money,
    /// Cost written to the stock card: the supplied inbound cost, else the
    /// cost basis at the time of the movement.
    pub recorded_unit_cost: Money,
}

impl MovementOutcome {
    /// Applies the outcome's balance to `product`.
    pub fn apply_to(&self, product: &mut ProductStock) {
        product.stock = self.stock_after;
        product.cost_price = self.cost_after;
    }

    /// The caller-facing summary of this movement.
    pub fn to_result(&self, product: &ProductStock, movement: &StockMovement) -> MovementResult {
        MovementResult {
            product_id: product.id.clone(),
            product_code: product.code.clone(),
            stock_before: self.stock_before,
            stock_after: self.stock_after,
            quantity_moved: movement.quantity,
            direction: movement.direction,
            cost_after: self.cost_after,
        }
    }
}

/// Computes what `movement` does to `product`.
///
/// ## Returns
/// * `Ok(MovementOutcome)` - new balance and the cost to record
/// * `Err(CoreError::InsufficientStock)` - an OUT would go below zero
/// * `Err(CoreError::Validation)` - malformed movement or arithmetic overflow
///
/// ## Example
/// ```rust
/// use tally_core::stock::apply_movement;
/// use tally_core::{Money, ProductStock, StockMovement};
///
/// let product = ProductStock::new("p-1", "KOPI-250", "Kopi Bubuk 250g");
/// let inbound = StockMovement::inbound("p-1", 10, Some(Money::from_minor(100, 0)), "PO-1");
///
/// let outcome = apply_movement(&product, &inbound).unwrap();
/// assert_eq!(outcome.stock_after, 10);
/// assert_eq!(outcome.cost_after, Money::from_minor(100, 0));
/// ```
pub fn apply_movement(
    product: &ProductStock,
    movement: &StockMovement,
) -> CoreResult<MovementOutcome> {
    validate_movement(movement)?;

    let stock_before = product.stock;
    let cost_before = product.cost_price;

    match movement.direction {
        MovementDirection::In => {
            let stock_after = stock_before
                .checked_add(movement.quantity)
                .ok_or_else(|| ValidationError::overflow("stock"))?;

            let (cost_after, recorded_unit_cost) = match movement.unit_cost {
                Some(unit_cost) if unit_cost.is_positive() => {
                    let cost = weighted_average_cost(
                        stock_before,
                        cost_before,
                        movement.quantity,
                        unit_cost,
                    )
                    .ok_or_else(|| ValidationError::overflow("cost_price"))?;
                    (cost, unit_cost)
                }
                _ => (cost_before, cost_before),
            };

            Ok(MovementOutcome {
                stock_before,
                stock_after,
                cost_before,
                cost_after,
                recorded_unit_cost,
            })
        }
        MovementDirection::Out => {
            let stock_after = stock_before - movement.quantity;
            if stock_after < 0 {
                return Err(CoreError::InsufficientStock {
                    product_id: product.id.clone(),
                    product_code: product.code.clone(),
                    stock_before,
                    requested: movement.quantity,
                });
            }

            Ok(MovementOutcome {
                stock_before,
                stock_after,
                cost_before,
                cost_after: cost_before,
                recorded_unit_cost: cost_before,
            })
        }
    }
}

/// Blends an inbound lot into the current cost basis.
///
/// Returns `None` only on decimal overflow.
pub fn weighted_average_cost(
    stock_before: i64,
    cost_before: Money,
    quantity: i64,
    unit_cost: Money,
) -> Option<Money> {
    if stock_before <= 0 {
        return Some(unit_cost.round_to(COST_SCALE));
    }

    let held = cost_before.checked_times(Decimal::from(stock_before))?;
    let incoming = unit_cost.checked_times(Decimal::from(quantity))?;
    let stock_after = Decimal::from(stock_before.checked_add(quantity)?);

    held.checked_add(incoming)?
        .checked_divide(stock_after)
        .map(|cost| cost.round_to(COST_SCALE))
}

impl StockCardEntry {
    /// Builds the stock card row for an applied movement.
    pub fn record(movement: &StockMovement, outcome: &MovementOutcome, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            product_id: movement.product_id.clone(),
            ref_code: movement.ref_code.clone(),
            ref_type: movement.ref_type,
            direction: movement.direction,
            signed_quantity: movement.signed_quantity(),
            unit_cost: outcome.recorded_unit_cost,
            stock_before: outcome.stock_before,
            stock_after: outcome.stock_after,
            note: movement.note.clone(),
            actor: movement.actor.clone(),
            created_at: at,
        }
    }
}

// =============================================================================
// Replay & Audit
// =============================================================================

/// Totals from a successful replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReplaySummary {
    pub entries: usize,
    pub total_in: i64,
    pub total_out: i64,
    /// Stock after the last entry.
    pub stock: i64,
}

/// Replays a stock card, in insertion order, from an empty ledger.
///
/// Checks that every entry starts where the previous one ended, that each
/// entry's own arithmetic holds, and that stock never goes below zero.
pub fn replay(entries: &[StockCardEntry]) -> Result<ReplaySummary, ReplayError> {
    let mut summary = ReplaySummary::default();

    for (index, entry) in entries.iter().enumerate() {
        let position = index + 1;

        if entry.stock_before != summary.stock {
            return Err(ReplayError::Discontinuity {
                position,
                expected: summary.stock,
                found: entry.stock_before,
            });
        }

        if entry.stock_before.checked_add(entry.signed_quantity) != Some(entry.stock_after) {
            return Err(ReplayError::InconsistentEntry {
                position,
                stock_before: entry.stock_before,
                signed_quantity: entry.signed_quantity,
                stock_after: entry.stock_after,
            });
        }

        if entry.stock_after < 0 {
            return Err(ReplayError::NegativeStock {
                position,
                stock: entry.stock_after,
            });
        }

        if entry.signed_quantity >= 0 {
            summary.total_in += entry.signed_quantity;
        } else {
            summary.total_out -= entry.signed_quantity;
        }
        summary.entries = position;
        summary.stock = entry.stock_after;
    }

    Ok(summary)
}

/// Result of checking a product's stock card against its recorded balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub product_id: String,
    pub recorded_stock: i64,
    /// `None` when the card could not be replayed.
    pub replayed_stock: Option<i64>,
    pub entries: usize,
    pub total_in: i64,
    pub total_out: i64,
    pub consistent: bool,
    pub problem: Option<String>,
}

/// Replays `entries` and compares the outcome with `product.stock`.
pub fn audit(product: &ProductStock, entries: &[StockCardEntry]) -> AuditReport {
    match replay(entries) {
        Ok(summary) => {
            let consistent = summary.stock == product.stock;
            AuditReport {
                product_id: product.id.clone(),
                recorded_stock: product.stock,
                replayed_stock: Some(summary.stock),
                entries: summary.entries,
                total_in: summary.total_in,
                total_out: summary.total_out,
                consistent,
                problem: (!consistent).then(|| {
                    format!(
                        "replayed stock {} does not match recorded stock {}",
                        summary.stock, product.stock
                    )
                }),
            }
        }
        Err(err) => AuditReport {
            product_id: product.id.clone(),
            recorded_stock: product.stock,
            replayed_stock: None,
            entries: entries.len(),
            total_in: entries.iter().map(|e| e.signed_quantity.max(0)).sum(),
            total_out: entries.iter().map(|e| (-e.signed_quantity).max(0)).sum(),
            consistent: false,
            problem: Some(err.to_string()),
        },
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn product(stock: i64, cost: Decimal) -> ProductStock {
        ProductStock {
            stock,
            cost_price: Money::new(cost),
            ..ProductStock::new("p-1", "KOPI-250", "Kopi Bubuk 250g")
        }
    }

    fn run(product: &mut ProductStock, movements: &[StockMovement]) -> Vec<StockCardEntry> {
        movements
            .iter()
            .map(|m| {
                let outcome = apply_movement(product, m).unwrap();
                outcome.apply_to(product);
                StockCardEntry::record(m, &outcome, Utc::now())
            })
            .collect()
    }

    #[test]
    fn test_weighted_average_example() {
        let mut p = product(0, dec!(0));
        run(
            &mut p,
            &[
                StockMovement::inbound("p-1", 10, Some(Money::new(dec!(100))), "PO-1"),
                StockMovement::inbound("p-1", 10, Some(Money::new(dec!(200))), "PO-2"),
            ],
        );
        assert_eq!(p.stock, 20);
        assert_eq!(p.cost_price, Money::new(dec!(150)));
    }

    #[test]
    fn test_weighted_average_rounds_to_cost_scale() {
        // (1 × 1 + 2 × 2) / 3 = 1.6666…
        let cost = weighted_average_cost(1, Money::new(dec!(1)), 2, Money::new(dec!(2))).unwrap();
        assert_eq!(cost.amount(), dec!(1.6667));
    }

    #[test]
    fn test_weighted_average_over_many_lots() {
        // (quantity, unit cost, basis after the lot at 4 dp)
        let lots = [
            (3, dec!(10.01), dec!(10.0100)),
            (7, dec!(9.99), dec!(9.9960)),
            (2, dec!(10.05), dec!(10.0050)),
            (11, dec!(9.97), dec!(9.9883)),
            (13, dec!(10.03), dec!(10.0034)),
            (1, dec!(12.345), dec!(10.0667)),
            (17, dec!(9.8765), dec!(10.0068)),
            (4, dec!(10.1111), dec!(10.0140)),
            (9, dec!(9.9999), dec!(10.0121)),
            (6, dec!(10.0001), dec!(10.0111)),
        ];

        let mut p = product(0, dec!(0));
        let mut value = Decimal::ZERO;
        for (i, (quantity, unit_cost, expected)) in lots.iter().enumerate() {
            let m = StockMovement::inbound(
                "p-1",
                *quantity,
                Some(Money::new(*unit_cost)),
                format!("PO-{i}"),
            );
            let outcome = apply_movement(&p, &m).unwrap();
            assert_eq!(outcome.cost_after.amount(), *expected, "lot {}", i + 1);

            p.stock = outcome.stock_after;
            p.cost_price = outcome.cost_after;
            value += *unit_cost * Decimal::from(*quantity);
        }

        // Unrounded: 730.8096 / 73 = 10.01109041…
        assert_eq!(p.stock, 73);
        let exact = value / Decimal::from(p.stock);
        let drift = (p.cost_price.amount() - exact).abs();
        assert!(drift <= dec!(0.00005) * Decimal::from(lots.len() as i64), "drift {drift}");
        assert!(drift < dec!(0.00001));
    }

    #[test]
    fn test_inbound_without_cost_keeps_basis() {
        let p = product(5, dec!(12.5));
        let m = StockMovement::inbound("p-1", 5, None, "ADJ-1");
        let outcome = apply_movement(&p, &m).unwrap();
        assert_eq!(outcome.stock_after, 10);
        assert_eq!(outcome.cost_after, Money::new(dec!(12.5)));
        assert_eq!(outcome.recorded_unit_cost, Money::new(dec!(12.5)));

        let zero = StockMovement::inbound("p-1", 5, Some(Money::zero()), "ADJ-2");
        assert_eq!(apply_movement(&p, &zero).unwrap().cost_after, Money::new(dec!(12.5)));
    }

    #[test]
    fn test_outbound_never_changes_cost() {
        let p = product(10, dec!(150));
        let mut m = StockMovement::outbound("p-1", 4, "SO-1");
        m.unit_cost = Some(Money::new(dec!(999)));
        let outcome = apply_movement(&p, &m).unwrap();
        assert_eq!(outcome.stock_after, 6);
        assert_eq!(outcome.cost_after, Money::new(dec!(150)));
        assert_eq!(outcome.recorded_unit_cost, Money::new(dec!(150)));
    }

    #[test]
    fn test_insufficient_stock() {
        let p = product(5, dec!(1));
        let err = apply_movement(&p, &StockMovement::outbound("p-1", 10, "SO-9")).unwrap_err();
        assert_eq!(
            err,
            CoreError::InsufficientStock {
                product_id: "p-1".to_string(),
                product_code: "KOPI-250".to_string(),
                stock_before: 5,
                requested: 10,
            }
        );
    }

    #[test]
    fn test_outbound_to_exactly_zero() {
        let p = product(5, dec!(1));
        let outcome = apply_movement(&p, &StockMovement::outbound("p-1", 5, "SO-1")).unwrap();
        assert_eq!(outcome.stock_after, 0);
    }

    #[test]
    fn test_record_entry() {
        let p = product(3, dec!(10));
        let m = StockMovement::outbound("p-1", 2, "SO-7").by("kasir-1");
        let outcome = apply_movement(&p, &m).unwrap();
        let entry = StockCardEntry::record(&m, &outcome, Utc::now());

        assert_eq!(entry.signed_quantity, -2);
        assert_eq!(entry.stock_before, 3);
        assert_eq!(entry.stock_after, 1);
        assert_eq!(entry.actor.as_deref(), Some("kasir-1"));
        assert!(Uuid::parse_str(&entry.id).is_ok());
    }

    #[test]
    fn test_audit_detects_discontinuity() {
        let mut p = product(0, dec!(0));
        let mut entries = run(
            &mut p,
            &[
                StockMovement::inbound("p-1", 10, Some(Money::new(dec!(1))), "PO-1"),
                StockMovement::outbound("p-1", 3, "SO-1"),
            ],
        );
        assert!(audit(&p, &entries).consistent);

        entries[1].stock_before = 9;
        entries[1].stock_after = 6;
        let report = audit(&p, &entries);
        assert!(!report.consistent);
        assert_eq!(report.replayed_stock, None);
        assert_eq!(
            report.problem.as_deref(),
            Some("entry 2: stock_before is 9, expected 10")
        );
    }

    #[test]
    fn test_audit_detects_balance_drift() {
        let mut p = product(0, dec!(0));
        let entries = run(&mut p, &[StockMovement::inbound("p-1", 4, None, "PO-1")]);
        p.stock = 5;

        let report = audit(&p, &entries);
        assert!(!report.consistent);
        assert_eq!(report.replayed_stock, Some(4));
        assert_eq!(report.total_in, 4);
    }

    // =========================================================================
    // Property Tests
    // =========================================================================

    fn arb_movement() -> impl Strategy<Value = StockMovement> {
        (any::<bool>(), 1i64..50, proptest::option::of(0i64..100_000)).prop_map(
            |(inbound, qty, cost_minor)| {
                if inbound {
                    StockMovement::inbound("p-1", qty, cost_minor.map(|c| Money::from_minor(c, 2)), "PO")
                } else {
                    StockMovement::outbound("p-1", qty, "SO")
                }
            },
        )
    }

    proptest! {
        #[test]
        fn prop_stock_card_replays_to_balance(movements in proptest::collection::vec(arb_movement(), 0..60)) {
            let mut p = product(0, dec!(0));
            let mut entries = Vec::new();

            for m in &movements {
                match apply_movement(&p, m) {
                    Ok(outcome) => {
                        if m.direction == MovementDirection::Out {
                            prop_assert_eq!(outcome.cost_after, outcome.cost_before);
                        }
                        outcome.apply_to(&mut p);
                        entries.push(StockCardEntry::record(m, &outcome, Utc::now()));
                    }
                    Err(CoreError::InsufficientStock { stock_before, requested, .. }) => {
                        prop_assert!(stock_before < requested);
                        prop_assert_eq!(stock_before, p.stock);
                    }
                    Err(other) => prop_assert!(false, "unexpected error: {}", other),
                }
                prop_assert!(p.stock >= 0);
                prop_assert!(!p.cost_price.is_negative());
            }

            let summary = replay(&entries).unwrap();
            prop_assert_eq!(summary.stock, p.stock);
            prop_assert_eq!(summary.total_in - summary.total_out, p.stock);
            prop_assert!(audit(&p, &entries).consistent);
        }
    }
}
