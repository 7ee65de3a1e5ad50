//! Monetary amounts and rounding rules.
//!
//! All prices, fees and refunds are [`rust_decimal::Decimal`] — never a
//! float — so the "2 decimal places" and "rounded half-up" invariants in
//! the booking/payment cores are exact rather than approximate.

use rust_decimal::{Decimal, RoundingStrategy};

/// Round `amount` to 2 decimal places using half-up rounding.
///
/// This is the rounding rule the refund policy (see
/// [`crate::refund::compute_refund`]) uses for the partial-refund tier.
#[must_use]
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Compute `price_per_seat * seats`, rounded to 2 decimal places.
#[must_use]
pub fn line_total(price_per_seat: Decimal, seats: u32) -> Decimal {
    round_currency(price_per_seat * Decimal::from(seats))
}

/// Compute a percentage fee on `amount`, rounded to 2 decimal places.
#[must_use]
pub fn percentage_fee(amount: Decimal, pct: Decimal) -> Decimal {
    round_currency(amount * pct)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rounds_half_up() {
        assert_eq!(round_currency(dec!(1.005)), dec!(1.01));
        assert_eq!(round_currency(dec!(1.004)), dec!(1.00));
    }

    #[test]
    fn line_total_multiplies_and_rounds() {
        assert_eq!(line_total(dec!(333.33), 3), dec!(999.99));
    }

    #[test]
    fn platform_fee_default_five_percent() {
        assert_eq!(percentage_fee(dec!(1000), dec!(0.05)), dec!(50.00));
    }
}
