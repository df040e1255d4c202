//! VAT arithmetic shared by documents and analytics.

use rust_decimal::{Decimal, RoundingStrategy};

/// Fixed VAT rate: 5%.
pub const VAT_RATE: Decimal = Decimal::from_parts(5, 0, 0, false, 2);

/// Round to 2 decimal places, ties to even.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

/// VAT due on `amount`.
pub fn vat_for(amount: Decimal) -> Decimal {
    round_money(amount * VAT_RATE)
}

/// Amount plus VAT, rounded once from the exact sum.
pub fn with_vat(amount: Decimal) -> Decimal {
    round_money(amount + amount * VAT_RATE)
}

/// Mean value, zero when there is nothing to average.
pub fn average(total: Decimal, count: i64) -> Decimal {
    if count <= 0 {
        Decimal::ZERO
    } else {
        round_money(total / Decimal::from(count))
    }
}

/// Render with exactly two fractional digits.
pub fn format_money(value: Decimal) -> String {
    format!("{:.2}", round_money(value))
}
