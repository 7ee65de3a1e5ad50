//! Payment entity and the value objects its operations pass around.

use chrono::{DateTime, Utc};
use routefare_domain::{BookingId, PaymentId, PaymentStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How long a checkout session survives before the hold it backs expires.
pub const PAYMENT_EXPIRY: std::time::Duration = std::time::Duration::from_secs(15 * 60);
/// Minimum chargeable amount (spec §4.H `initiatePayment` validation).
pub const MIN_AMOUNT: Decimal = Decimal::from_parts(1, 0, 0, false, 2); // 0.01

/// A single payment, covering its full six-state lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    /// Primary key.
    pub id: PaymentId,
    /// Booking this payment settles.
    pub booking_id: BookingId,
    /// Charge amount.
    pub amount: Decimal,
    /// ISO-4217 currency code.
    pub currency: String,
    /// Customer email, for receipts.
    pub customer_email: String,
    /// Customer display name.
    pub customer_name: String,
    /// Lifecycle state.
    pub status: PaymentStatus,
    /// Unique reference handed to the gateway.
    pub gateway_reference: String,
    /// Checkout URL returned by the gateway, once initiated.
    pub checkout_url: Option<String>,
    /// Gateway transaction id, once charged.
    pub transaction_id: Option<String>,
    /// Client-supplied idempotency key.
    pub idempotency_key: Option<String>,
    /// Non-null while status is INITIATED or PENDING.
    pub expires_at: Option<DateTime<Utc>>,
    /// Set when the gateway confirms success.
    pub completed_at: Option<DateTime<Utc>>,
    /// Reason recorded on FAILED.
    pub failure_reason: Option<String>,
    /// Amount refunded, if any.
    pub refund_amount: Option<Decimal>,
    /// Reason recorded on REFUNDED.
    pub refund_reason: Option<String>,
    /// When refunded.
    pub refunded_at: Option<DateTime<Utc>>,
    /// When the record was first created.
    pub created_at: DateTime<Utc>,
}

/// A request to initiate a payment, as received from the HTTP layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiatePaymentRequest {
    /// Booking being paid for.
    pub booking_id: BookingId,
    /// Charge amount.
    pub amount: Decimal,
    /// ISO-4217 currency code.
    pub currency: String,
    /// Customer email, for receipts.
    pub customer_email: String,
    /// Customer display name.
    pub customer_name: String,
    /// Client-supplied idempotency key.
    pub idempotency_key: Option<String>,
}

/// The gateway event kinds `processWebhook` understands (spec §4.H).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayEventType {
    /// The charge succeeded.
    ChargeSuccess,
    /// The charge failed.
    ChargeFailed,
}

/// A decoded gateway webhook payload. `raw_body`/`signature` are verified
/// by [`crate::webhook::verify_signature`] before this is trusted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// The gateway's reference for the charge this event concerns.
    pub gateway_reference: String,
    /// What happened.
    pub event_type: GatewayEventType,
    /// Gateway transaction id, present on success.
    pub transaction_id: Option<String>,
    /// Failure reason, present on failure.
    pub failure_reason: Option<String>,
}

/// One row of a scheduled gateway/local reconciliation run (spec §4.H).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationRecord {
    /// The date reconciled (always D-1 relative to the run).
    pub date: chrono::NaiveDate,
    /// Payment this row concerns.
    pub payment_id: PaymentId,
    /// `MATCHED` or `DISCREPANCY`.
    pub outcome: ReconciliationOutcome,
    /// Populated when `outcome` is `DISCREPANCY`.
    pub details: Option<String>,
    /// When this record was written.
    pub reconciled_at: DateTime<Utc>,
}

/// Outcome of comparing a local payment against the gateway's record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconciliationOutcome {
    /// Amount and status agree.
    Matched,
    /// Amount or status disagree, or one side is missing the record.
    Discrepancy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_amount_is_one_cent() {
        assert_eq!(MIN_AMOUNT.to_string(), "0.01");
    }
}
