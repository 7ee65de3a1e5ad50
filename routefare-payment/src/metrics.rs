//! Business metrics for the payment core.
//!
//! ## Exported metrics
//!
//! - `payment_payments_total{status}` — counter, payments by status transition
//! - `payment_refund_amount_total` — counter, cents refunded
//! - `payment_reconciliation_discrepancies_total` — counter, reconciliation mismatches found

use metrics::describe_counter;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Register metric descriptions. Call once at application startup.
pub fn register_business_metrics() {
    describe_counter!(
        "payment_payments_total",
        "Total payments by status transition (initiated, succeeded, failed, refunded)"
    );
    describe_counter!("payment_refund_amount_total", "Total refund amount issued, in minor currency units");
    describe_counter!(
        "payment_reconciliation_discrepancies_total",
        "Total discrepancies found between local payments and the gateway during reconciliation"
    );
}

/// Record a payment record created (checkout started).
pub fn record_payment_initiated() {
    metrics::counter!("payment_payments_total", "status" => "initiated").increment(1);
}

/// Record a payment reaching SUCCESS.
pub fn record_payment_succeeded() {
    metrics::counter!("payment_payments_total", "status" => "succeeded").increment(1);
}

/// Record a payment reaching FAILED.
pub fn record_payment_failed() {
    metrics::counter!("payment_payments_total", "status" => "failed").increment(1);
}

/// Record a payment reaching REFUNDED and its refund amount.
pub fn record_payment_refunded(amount: Decimal) {
    metrics::counter!("payment_payments_total", "status" => "refunded").increment(1);
    if let Some(cents) = (amount * Decimal::from(100)).round().to_u64() {
        metrics::counter!("payment_refund_amount_total").increment(cents);
    }
}

/// Record a reconciliation discrepancy found for a single payment.
pub fn record_reconciliation_discrepancy() {
    metrics::counter!("payment_reconciliation_discrepancies_total").increment(1);
}
