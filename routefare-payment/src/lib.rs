//! Payment Orchestration Core (spec §4.H): gateway checkout, webhook
//! ingestion, refunds, and scheduled reconciliation.
//!
//! This crate owns the payment aggregate end to end: the six-state payment
//! lifecycle, HMAC-verified webhook ingestion, and the retrying integrator
//! call back into the booking core (spec §4.L). It never depends on
//! `routefare-booking` directly — only through the injected
//! [`booking_client::BookingClient`] boundary — and never speaks to a
//! concrete charge provider, only through [`gateway::PaymentGateway`].

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod booking_client;
pub mod gateway;
pub mod metrics;
pub mod payment;
pub mod reconciliation;
pub mod types;
pub mod webhook;

pub use booking_client::{BookingCallError, BookingClient};
pub use gateway::{ChargeHandle, GatewayChargeStatus, GatewayError, GatewayTransaction, PaymentGateway};
pub use payment::{PaymentAction, PaymentEnvironment, PaymentProjectionQuery, PaymentReducer, PaymentState};
pub use reconciliation::run_reconciliation;
pub use types::{
    GatewayEventType, InitiatePaymentRequest, Payment, ReconciliationOutcome, ReconciliationRecord,
    WebhookPayload, MIN_AMOUNT, PAYMENT_EXPIRY,
};
pub use webhook::verify_signature;
