use rust_decimal::{Decimal, RoundingStrategy};

use crate::lines::numeric::parse;
use crate::models::line_item::LineItem;

/// Amount of one row: quantity times rate.
///
/// A product too large for a `Decimal` saturates at `Decimal::MAX` (or
/// `Decimal::MIN` when exactly one factor is negative).
pub fn line_amount(row: &LineItem) -> Decimal {
    let quantity = parse(&row.quantity);
    let rate = parse(&row.rate);
    quantity.checked_mul(rate).unwrap_or_else(|| {
        if quantity.is_sign_negative() != rate.is_sign_negative() {
            Decimal::MIN
        } else {
            Decimal::MAX
        }
    })
}

/// Invoice total over the given rows.
///
/// Always computed from the rows passed in; nothing is cached. Positive and
/// negative amounts are summed apart, each saturating at the `Decimal`
/// bounds, so the result does not depend on row order and never overflows.
pub fn total(rows: &[LineItem]) -> Decimal {
    let (credit, debit) = rows.iter().map(line_amount).fold(
        (Decimal::ZERO, Decimal::ZERO),
        |(credit, debit), amount| {
            if amount.is_sign_negative() {
                (credit, debit.checked_add(amount).unwrap_or(Decimal::MIN))
            } else {
                (credit.checked_add(amount).unwrap_or(Decimal::MAX), debit)
            }
        },
    );
    // Opposite signs: this sum is always in range.
    credit + debit
}

/// Two-decimal fixed formatting used when amounts are shown or printed.
pub fn format_fixed(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.2}", rounded)
}

/// Quantity as printed on documents: the coerced number without trailing zeros.
pub fn format_quantity(value: Decimal) -> String {
    value.normalize().to_string()
}
