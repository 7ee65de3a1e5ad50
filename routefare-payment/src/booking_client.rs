//! Cross-service integrator (spec §4.L): couples payment outcomes back
//! into the booking core over a retrying RPC boundary.
//!
//! `routefare-payment` never depends on `routefare-booking` directly — the
//! wiring layer supplies a [`BookingClient`] (an in-process call, an HTTP
//! client, whatever transport `routefare-service` chooses). Retries use
//! `routefare-runtime`'s exponential backoff, configured to the spec's "3
//! attempts, base 2 s" policy.

use async_trait::async_trait;
use routefare_domain::{BookingId, PaymentId};
use routefare_runtime::retry::{retry_with_backoff, RetryPolicy};
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a call into the booking core.
#[derive(Debug, Error, Clone)]
#[error("booking call failed: {0}")]
pub struct BookingCallError(pub String);

/// The booking core's confirm/cancel surface, as consumed by payment.
#[async_trait]
pub trait BookingClient: Send + Sync {
    /// Call `confirmBooking(bookingId, paymentId)`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingCallError`] if the call fails or times out.
    async fn confirm_booking(
        &self,
        booking_id: BookingId,
        payment_id: PaymentId,
    ) -> Result<(), BookingCallError>;

    /// Call `cancelBooking(bookingId, reason, actor)` best-effort.
    ///
    /// # Errors
    ///
    /// Returns [`BookingCallError`] if the call fails or times out.
    async fn cancel_booking(
        &self,
        booking_id: BookingId,
        reason: &str,
    ) -> Result<(), BookingCallError>;
}

fn integrator_policy() -> RetryPolicy {
    RetryPolicy::builder()
        .max_retries(3)
        .initial_delay(Duration::from_secs(2))
        .max_delay(Duration::from_secs(8))
        .multiplier(2.0)
        .build()
}

/// Confirm a booking with the spec's retry policy (3 attempts, base 2 s).
/// A failure here is logged, never propagated as a webhook failure — the
/// reconciliation job heals any resulting drift.
pub async fn confirm_booking_with_retry(
    client: &dyn BookingClient,
    booking_id: BookingId,
    payment_id: PaymentId,
) {
    let result = retry_with_backoff(integrator_policy(), || async {
        client.confirm_booking(booking_id, payment_id).await
    })
    .await;

    if let Err(error) = result {
        tracing::error!(
            %booking_id,
            %payment_id,
            %error,
            "confirmBooking failed after retries, deferring to reconciliation"
        );
    }
}

/// Cancel a booking best-effort, with the same retry policy. Errors are
/// logged only.
pub async fn cancel_booking_with_retry(client: &dyn BookingClient, booking_id: BookingId, reason: &str) {
    let result = retry_with_backoff(integrator_policy(), || async {
        client.cancel_booking(booking_id, reason).await
    })
    .await;

    if let Err(error) = result {
        tracing::error!(%booking_id, %error, "cancelBooking failed after retries");
    }
}
