//! # Pricing Calculator
//!
//! Validates and totals a purchase or sales order. Pure and stateless:
//! the same request always produces the same priced order.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PricingRequest                                                         │
//! │       │                                                                 │
//! │       ▼  per line, in order (first violation wins, 1-based line index) │
//! │  quantity > 0 → unit_price ≥ 0 → line_discount ≥ 0 → cost_price ≥ 0    │
//! │       │        → total_amount = unit_price × quantity − line_discount  │
//! │       │        → total_amount ≥ 0                                      │
//! │       ▼                                                                 │
//! │  subtotal = Σ total_amount                                              │
//! │       │  discount_value ≥ 0, vat_rate ≥ 0                              │
//! │       ▼                                                                 │
//! │  after_discount ≥ 0 → other_fee ≥ 0 → final_amount ≥ 0                 │
//! │       │                                                                 │
//! │       ▼  ONE rounding step (currency_scale, half away from zero)       │
//! │  PricedOrder                                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Negative intermediates are rejected, never clamped to zero.

use rust_decimal::Decimal;

use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{
    DiscountKind, OrderKind, OrderLineInput, OrderLineResult, OrderTotals, Percentage,
    PricedOrder, PricingRequest,
};
use crate::validation::{
    validate_non_negative, validate_order_quantity, validate_rate, ValidationResult,
};
use crate::DEFAULT_CURRENCY_SCALE;

// =============================================================================
// Calculator
// =============================================================================

/// Prices orders in a currency with `currency_scale` minor-unit digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingCalculator {
    currency_scale: u32,
}

impl Default for PricingCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_CURRENCY_SCALE)
    }
}

/// A line at full precision, before output rounding.
struct ExactLine {
    total_amount: Money,
    unit_effective_price: Money,
    profit: Option<Money>,
}

impl PricingCalculator {
    /// Creates a calculator rounding to `currency_scale` decimal places.
    pub const fn new(currency_scale: u32) -> Self {
        Self { currency_scale }
    }

    /// Decimal places used for output rounding.
    pub const fn currency_scale(&self) -> u32 {
        self.currency_scale
    }

    /// Prices an order.
    ///
    /// ## Returns
    /// * `Ok(PricedOrder)` - per-line results and order totals
    /// * `Err(CoreError::Validation)` - the first rule violated; line-level
    ///   failures are wrapped in [`ValidationError::Line`]
    ///
    /// ## Example
    /// ```rust
    /// use rust_decimal::Decimal;
    /// use tally_core::{Money, OrderKind, OrderLineInput, PricingCalculator, PricingRequest};
    ///
    /// let request = PricingRequest::new(
    ///     OrderKind::Sales,
    ///     vec![OrderLineInput::new(Decimal::from(3), Money::from_minor(1000, 2))
    ///         .with_cost_price(Money::from_minor(600, 2))],
    /// );
    ///
    /// let priced = PricingCalculator::default().calculate(&request).unwrap();
    /// assert_eq!(priced.totals.subtotal, Money::from_minor(3000, 2));
    /// assert_eq!(priced.totals.total_profit, Some(Money::from_minor(1200, 2)));
    /// ```
    pub fn calculate(&self, request: &PricingRequest) -> CoreResult<PricedOrder> {
        if request.lines.is_empty() {
            return Err(ValidationError::Required {
                field: "lines".to_string(),
            }
            .into());
        }

        let mut exact_lines = Vec::with_capacity(request.lines.len());
        for (index, input) in request.lines.iter().enumerate() {
            let exact = price_line(request.kind, input).map_err(|rule| ValidationError::Line {
                line: index + 1,
                rule: Box::new(rule),
            })?;
            exact_lines.push(exact);
        }

        let subtotal = exact_lines
            .iter()
            .try_fold(Money::zero(), |acc, line| acc.checked_add(line.total_amount))
            .ok_or_else(|| ValidationError::overflow("subtotal"))?;

        // Order-level inputs are checked before they are used.
        if request.discount_value < Decimal::ZERO {
            return Err(ValidationError::must_not_be_negative("discount_value").into());
        }
        validate_rate("vat_rate", request.vat_rate)?;

        let discount_amount = match request.discount_kind {
            DiscountKind::Amount => Money::new(request.discount_value),
            DiscountKind::Percent => subtotal
                .apply_rate(Percentage::from_decimal(request.discount_value))
                .ok_or_else(|| ValidationError::overflow("discount_amount"))?,
        };

        let after_discount = subtotal
            .checked_sub(discount_amount)
            .ok_or_else(|| ValidationError::overflow("after_discount"))?;
        if after_discount.is_negative() {
            return Err(ValidationError::negative_result("after_discount").into());
        }

        validate_non_negative("other_fee", request.other_fee)?;

        let vat_amount = after_discount
            .apply_rate(request.vat_rate)
            .ok_or_else(|| ValidationError::overflow("vat_amount"))?;

        let final_amount = after_discount
            .checked_add(vat_amount)
            .and_then(|amount| amount.checked_add(request.other_fee))
            .ok_or_else(|| ValidationError::overflow("final_amount"))?;
        if final_amount.is_negative() {
            return Err(ValidationError::negative_result("final_amount").into());
        }

        let total_profit = match request.kind {
            OrderKind::Purchase => None,
            OrderKind::Sales => Some(
                exact_lines
                    .iter()
                    .filter_map(|line| line.profit)
                    .try_fold(Money::zero(), |acc, profit| acc.checked_add(profit))
                    .ok_or_else(|| ValidationError::overflow("total_profit"))?,
            ),
        };

        // Rounding happens here and nowhere else.
        let scale = self.currency_scale;
        let lines = request
            .lines
            .iter()
            .zip(exact_lines)
            .enumerate()
            .map(|(index, (input, exact))| OrderLineResult {
                line: index + 1,
                quantity: input.quantity,
                unit_price: input.unit_price,
                line_discount: input.line_discount,
                total_amount: exact.total_amount.round_to(scale),
                unit_effective_price: exact.unit_effective_price.round_to(scale),
                profit: exact.profit.map(|p| p.round_to(scale)),
            })
            .collect();

        let totals = OrderTotals {
            subtotal: subtotal.round_to(scale),
            discount_kind: request.discount_kind,
            discount_value: request.discount_value,
            discount_amount: discount_amount.round_to(scale),
            after_discount: after_discount.round_to(scale),
            vat_rate: request.vat_rate,
            vat_amount: vat_amount.round_to(scale),
            other_fee: request.other_fee,
            final_amount: final_amount.round_to(scale),
            total_profit: total_profit.map(|p| p.round_to(scale)),
        };

        Ok(PricedOrder { lines, totals })
    }
}

/// Prices an order with the default currency scale.
pub fn calculate(request: &PricingRequest) -> CoreResult<PricedOrder> {
    PricingCalculator::default().calculate(request)
}

fn price_line(kind: OrderKind, input: &OrderLineInput) -> ValidationResult<ExactLine> {
    validate_order_quantity(input.quantity)?;
    validate_non_negative("unit_price", input.unit_price)?;
    validate_non_negative("line_discount", input.line_discount)?;
    if let Some(cost) = input.cost_price {
        validate_non_negative("cost_price", cost)?;
    }

    let total_amount = input
        .unit_price
        .checked_times(input.quantity)
        .and_then(|gross| gross.checked_sub(input.line_discount))
        .ok_or_else(|| ValidationError::overflow("total_amount"))?;
    if total_amount.is_negative() {
        return Err(ValidationError::negative_result("total_amount"));
    }

    let unit_effective_price = total_amount
        .checked_divide(input.quantity)
        .ok_or_else(|| ValidationError::overflow("unit_effective_price"))?;

    let profit = match (kind, input.cost_price) {
        (OrderKind::Sales, Some(cost)) => Some(
            cost.checked_times(input.quantity)
                .and_then(|cost_total| total_amount.checked_sub(cost_total))
                .ok_or_else(|| ValidationError::overflow("profit"))?,
        ),
        _ => None,
    };

    Ok(ExactLine {
        total_amount,
        unit_effective_price,
        profit,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn money(d: Decimal) -> Money {
        Money::new(d)
    }

    fn line(qty: Decimal, price: Decimal) -> OrderLineInput {
        OrderLineInput::new(qty, money(price))
    }

    fn validation(err: CoreError) -> ValidationError {
        match err {
            CoreError::Validation(v) => v,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_purchase_order_with_percent_discount_and_vat() {
        let request = PricingRequest {
            discount_kind: DiscountKind::Percent,
            discount_value: dec!(10),
            vat_rate: Percentage::from_decimal(dec!(10)),
            ..PricingRequest::new(OrderKind::Purchase, vec![line(dec!(2), dec!(100))])
        };

        let priced = calculate(&request).unwrap();
        let totals = &priced.totals;

        assert_eq!(priced.lines[0].total_amount, money(dec!(200)));
        assert_eq!(totals.subtotal, money(dec!(200)));
        assert_eq!(totals.discount_amount, money(dec!(20)));
        assert_eq!(totals.after_discount, money(dec!(180)));
        assert_eq!(totals.vat_amount, money(dec!(18)));
        assert_eq!(totals.final_amount, money(dec!(198)));
        assert_eq!(totals.total_profit, None);
        assert_eq!(priced.lines[0].profit, None);
    }

    #[test]
    fn test_sales_order_profit() {
        let request = PricingRequest::new(
            OrderKind::Sales,
            vec![
                line(dec!(2), dec!(50)).with_cost_price(money(dec!(30))),
                line(dec!(1), dec!(20)),
                line(dec!(4), dec!(10))
                    .with_discount(money(dec!(5)))
                    .with_cost_price(money(dec!(6))),
            ],
        );

        let priced = calculate(&request).unwrap();

        assert_eq!(priced.lines[0].profit, Some(money(dec!(40))));
        assert_eq!(priced.lines[1].profit, None);
        assert_eq!(priced.lines[2].total_amount, money(dec!(35)));
        assert_eq!(priced.lines[2].unit_effective_price, money(dec!(8.75)));
        assert_eq!(priced.lines[2].profit, Some(money(dec!(11))));
        assert_eq!(priced.totals.total_profit, Some(money(dec!(51))));
    }

    #[test]
    fn test_purchase_order_ignores_cost_price() {
        let request = PricingRequest::new(
            OrderKind::Purchase,
            vec![line(dec!(1), dec!(10)).with_cost_price(money(dec!(4)))],
        );
        let priced = calculate(&request).unwrap();
        assert_eq!(priced.lines[0].profit, None);
        assert_eq!(priced.totals.total_profit, None);
    }

    #[test]
    fn test_line_errors_name_the_line_in_rule_order() {
        let mut bad = line(dec!(0), dec!(-1));
        bad.line_discount = money(dec!(-1));
        let request =
            PricingRequest::new(OrderKind::Sales, vec![line(dec!(1), dec!(1)), bad.clone()]);

        let err = validation(calculate(&request).unwrap_err());
        assert_eq!(err.line(), Some(2));
        assert_eq!(err.to_string(), "line 2: quantity must be positive");

        bad.quantity = dec!(1);
        let request = PricingRequest::new(OrderKind::Sales, vec![bad]);
        let err = validation(calculate(&request).unwrap_err());
        assert_eq!(err.to_string(), "line 1: unit_price must not be negative");
    }

    #[test]
    fn test_line_discount_larger_than_line_fails() {
        let request = PricingRequest::new(
            OrderKind::Purchase,
            vec![line(dec!(1), dec!(10)).with_discount(money(dec!(10.01)))],
        );
        let err = validation(calculate(&request).unwrap_err());
        assert_eq!(err.to_string(), "line 1: total_amount would be negative");
    }

    #[test]
    fn test_negative_cost_price_fails() {
        let request = PricingRequest::new(
            OrderKind::Sales,
            vec![line(dec!(1), dec!(10)).with_cost_price(money(dec!(-1)))],
        );
        let err = validation(calculate(&request).unwrap_err());
        assert_eq!(err.to_string(), "line 1: cost_price must not be negative");
    }

    #[test]
    fn test_empty_order_is_rejected() {
        let request = PricingRequest::new(OrderKind::Sales, vec![]);
        assert_eq!(
            validation(calculate(&request).unwrap_err()),
            ValidationError::Required {
                field: "lines".to_string()
            }
        );
    }

    #[test]
    fn test_order_level_failures() {
        let base = PricingRequest::new(OrderKind::Purchase, vec![line(dec!(1), dec!(100))]);

        let over_discount = PricingRequest {
            discount_value: dec!(150),
            ..base.clone()
        };
        assert_eq!(
            validation(calculate(&over_discount).unwrap_err()),
            ValidationError::negative_result("after_discount")
        );

        let negative_discount = PricingRequest {
            discount_value: dec!(-1),
            ..base.clone()
        };
        assert_eq!(
            validation(calculate(&negative_discount).unwrap_err()),
            ValidationError::must_not_be_negative("discount_value")
        );

        let negative_vat = PricingRequest {
            vat_rate: Percentage::from_decimal(dec!(-5)),
            ..base.clone()
        };
        assert_eq!(
            validation(calculate(&negative_vat).unwrap_err()),
            ValidationError::must_not_be_negative("vat_rate")
        );

        let negative_fee = PricingRequest {
            other_fee: money(dec!(-0.5)),
            ..base
        };
        assert_eq!(
            validation(calculate(&negative_fee).unwrap_err()),
            ValidationError::must_not_be_negative("other_fee")
        );
    }

    #[test]
    fn test_full_discount_is_allowed() {
        let request = PricingRequest {
            discount_kind: DiscountKind::Percent,
            discount_value: dec!(100),
            other_fee: money(dec!(5)),
            ..PricingRequest::new(OrderKind::Purchase, vec![line(dec!(3), dec!(7))])
        };
        let priced = calculate(&request).unwrap();
        assert!(priced.totals.after_discount.is_zero());
        assert_eq!(priced.totals.final_amount, money(dec!(5)));
    }

    #[test]
    fn test_rounds_once_at_output() {
        // 3 × 0.333 = 0.999 exact. Rounding the line first would yield 1.08.
        let request = PricingRequest {
            vat_rate: Percentage::from_decimal(dec!(7.5)),
            ..PricingRequest::new(OrderKind::Purchase, vec![line(dec!(3), dec!(0.333))])
        };
        let priced = calculate(&request).unwrap();

        assert_eq!(priced.lines[0].total_amount, money(dec!(1.00)));
        assert_eq!(priced.totals.vat_amount, money(dec!(0.07)));
        // 0.999 + 0.074925 = 1.073925
        assert_eq!(priced.totals.final_amount, money(dec!(1.07)));
    }

    #[test]
    fn test_custom_currency_scale() {
        let request = PricingRequest::new(OrderKind::Purchase, vec![line(dec!(1), dec!(10.5))]);
        let priced = PricingCalculator::new(0).calculate(&request).unwrap();
        assert_eq!(priced.totals.final_amount, money(dec!(11)));
    }

    // =========================================================================
    // Property Tests
    // =========================================================================

    fn arb_line() -> impl Strategy<Value = OrderLineInput> {
        (1i64..500, 0i64..1_000_000, 0i64..100, proptest::option::of(0i64..1_000_000)).prop_map(
            |(qty, price_minor, discount_pct, cost_minor)| {
                let unit_price = Money::from_minor(price_minor, 2);
                let gross = unit_price.times(Decimal::from(qty));
                // Keep the discount at or below the line's gross amount.
                let discount = gross
                    .apply_rate(Percentage::from_decimal(Decimal::from(discount_pct)))
                    .unwrap_or_default()
                    .round_to(2)
                    .min(gross);
                OrderLineInput {
                    quantity: Decimal::from(qty),
                    unit_price,
                    line_discount: discount,
                    cost_price: cost_minor.map(|c| Money::from_minor(c, 2)),
                }
            },
        )
    }

    fn arb_request() -> impl Strategy<Value = PricingRequest> {
        (
            prop_oneof![Just(OrderKind::Purchase), Just(OrderKind::Sales)],
            proptest::collection::vec(arb_line(), 1..20),
            0i64..=100,
            0i64..=2500,
            0i64..100_000,
        )
            .prop_map(|(kind, lines, discount_pct, vat_bps, fee_minor)| PricingRequest {
                discount_kind: DiscountKind::Percent,
                discount_value: Decimal::from(discount_pct),
                vat_rate: Percentage::from_decimal(Decimal::new(vat_bps, 2)),
                other_fee: Money::from_minor(fee_minor, 2),
                ..PricingRequest::new(kind, lines)
            })
    }

    proptest! {
        #[test]
        fn prop_subtotal_is_sum_of_line_totals(request in arb_request()) {
            let priced = calculate(&request).unwrap();
            let sum: Money = priced.lines.iter().map(|l| l.total_amount).sum();
            prop_assert_eq!(sum, priced.totals.subtotal);
        }

        #[test]
        fn prop_final_amount_is_never_negative(request in arb_request()) {
            let priced = calculate(&request).unwrap();
            prop_assert!(!priced.totals.final_amount.is_negative());
            prop_assert!(!priced.totals.after_discount.is_negative());
        }

        #[test]
        fn prop_calculation_is_idempotent(request in arb_request()) {
            prop_assert_eq!(calculate(&request), calculate(&request));
        }

        #[test]
        fn prop_profit_only_for_sales(request in arb_request()) {
            let priced = calculate(&request).unwrap();
            match request.kind {
                OrderKind::Purchase => {
                    prop_assert!(priced.totals.total_profit.is_none());
                    prop_assert!(priced.lines.iter().all(|l| l.profit.is_none()));
                }
                OrderKind::Sales => prop_assert!(priced.totals.total_profit.is_some()),
            }
        }
    }
}
