//! Time-based cancellation refund policy.

use crate::money::round_currency;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Configurable thresholds for the refund policy.
///
/// Defaults match the specification: full refund at 24h+ before departure,
/// a 50% partial refund between 6h and 24h, nothing inside 6h.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RefundPolicyConfig {
    /// Hours before departure at or above which a full refund applies.
    pub full_refund_hours: i64,
    /// Hours before departure at or above which a partial refund applies.
    pub partial_refund_hours: i64,
    /// Fraction of the total refunded in the partial-refund tier.
    pub partial_refund_pct: Decimal,
}

impl Default for RefundPolicyConfig {
    fn default() -> Self {
        Self {
            full_refund_hours: 24,
            partial_refund_hours: 6,
            partial_refund_pct: Decimal::new(50, 2),
        }
    }
}

/// Compute the refund amount for a booking cancelled at `now`, given its
/// `departure` instant and `total` price.
///
/// # Errors
///
/// This function cannot fail; the tiers are total and ordered exhaustively.
#[must_use]
pub fn compute_refund(
    config: &RefundPolicyConfig,
    total: Decimal,
    departure: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Decimal {
    let hours_until_departure = (departure - now).num_hours();

    if hours_until_departure >= config.full_refund_hours {
        total
    } else if hours_until_departure >= config.partial_refund_hours {
        round_currency(total * config.partial_refund_pct)
    } else {
        Decimal::ZERO
    }
}
