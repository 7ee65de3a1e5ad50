//! Third-party gateway adapter boundary.
//!
//! `routefare-payment` never speaks to a concrete provider directly — the
//! wiring layer (`routefare-service`) supplies a [`PaymentGateway`]
//! implementation (Stripe, a sandbox stub, whatever). This mirrors the
//! teacher's `PaymentProjectionQuery`-shaped injected-trait pattern in
//! `examples/ticketing/src/aggregates/payment.rs`, generalized from a
//! read-only query to a write-capable charge/query adapter.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors a gateway adapter may raise. Distinguishes transient failures
/// (worth retrying) from permanent ones (the charge was rejected).
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway is unreachable or timed out. Retriable.
    #[error("gateway unreachable: {0}")]
    Transient(String),
    /// The gateway rejected the charge outright (e.g. card declined).
    #[error("charge rejected: {0}")]
    Rejected(String),
}

/// Result of successfully initializing a charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeHandle {
    /// URL the customer is redirected to for checkout.
    pub checkout_url: String,
}

/// Current gateway-side status of a charge, as reported by a query call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayChargeStatus {
    /// Checkout not yet completed.
    Pending,
    /// Charge succeeded.
    Succeeded,
    /// Charge failed.
    Failed,
}

/// One gateway-side transaction, as seen by the reconciliation job.
#[derive(Debug, Clone)]
pub struct GatewayTransaction {
    /// The gateway reference this transaction corresponds to.
    pub gateway_reference: String,
    /// Amount the gateway recorded for this charge.
    pub amount: Decimal,
    /// Current gateway-side status.
    pub status: GatewayChargeStatus,
}

/// The third-party payment gateway, as consumed by the payment core.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Begin a checkout for `gateway_reference`/`amount`/`currency`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the gateway rejects or cannot be
    /// reached.
    async fn initialize_charge(
        &self,
        gateway_reference: &str,
        amount: Decimal,
        currency: &str,
    ) -> Result<ChargeHandle, GatewayError>;

    /// Query the current gateway-side status of a charge.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the gateway cannot be reached.
    async fn query_charge(
        &self,
        gateway_reference: &str,
    ) -> Result<GatewayChargeStatus, GatewayError>;

    /// List every gateway transaction recorded on `date`, for
    /// reconciliation.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the gateway cannot be reached.
    async fn list_transactions_for_date(
        &self,
        date: chrono::NaiveDate,
    ) -> Result<Vec<GatewayTransaction>, GatewayError>;
}
