//! In-process [`BookingClient`] (spec §4.L): both cores share one binary
//! and one event store, so the "cross-service" call is a direct
//! `store.send`/`wait_with_timeout` round trip against the shared booking
//! [`Store`] rather than an HTTP or gRPC hop.

use async_trait::async_trait;
use routefare_booking::{BookingAction, BookingEnvironment, BookingProjectionQuery, BookingReducer, BookingState};
use routefare_domain::{BookingId, PaymentId};
use routefare_payment::booking_client::{BookingCallError, BookingClient};
use routefare_runtime::Store;
use std::sync::Arc;
use std::time::Duration;

/// Timeout the payment core will wait for a confirm/cancel round trip
/// before treating it as failed (and deferring to reconciliation).
const CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// [`BookingClient`] backed by the same in-process booking [`Store`] the
/// HTTP handlers dispatch against.
pub struct InProcessBookingClient {
    store: Arc<Store<BookingState, BookingAction, BookingEnvironment, BookingReducer>>,
    projection: Arc<dyn BookingProjectionQuery>,
}

impl InProcessBookingClient {
    /// Build a client wrapping the shared booking store.
    #[must_use]
    pub fn new(
        store: Arc<Store<BookingState, BookingAction, BookingEnvironment, BookingReducer>>,
        projection: Arc<dyn BookingProjectionQuery>,
    ) -> Self {
        Self { store, projection }
    }
}

#[async_trait]
impl BookingClient for InProcessBookingClient {
    async fn confirm_booking(
        &self,
        booking_id: BookingId,
        payment_id: PaymentId,
    ) -> Result<(), BookingCallError> {
        let mut handle = self
            .store
            .send(BookingAction::ConfirmBooking { booking_id, payment_id })
            .await;
        handle
            .wait_with_timeout(CALL_TIMEOUT)
            .await
            .map_err(|()| BookingCallError("confirmBooking timed out".to_string()))?;

        let confirmed = self
            .store
            .state(|s| s.get(&booking_id).map(|b| b.status))
            .await;

        match confirmed {
            Some(routefare_booking::BookingStatus::Confirmed) => Ok(()),
            Some(status) => Err(BookingCallError(format!(
                "confirmBooking left booking {booking_id} in state {status:?}"
            ))),
            None => Err(BookingCallError(format!("booking {booking_id} not found"))),
        }
    }

    async fn cancel_booking(
        &self,
        booking_id: BookingId,
        reason: &str,
    ) -> Result<(), BookingCallError> {
        let actor = self
            .projection
            .load_booking(booking_id)
            .await
            .map_err(BookingCallError)?
            .ok_or_else(|| BookingCallError(format!("booking {booking_id} not found")))?
            .rider_id;

        let mut handle = self
            .store
            .send(BookingAction::CancelBooking {
                booking_id,
                reason: reason.to_string(),
                actor,
            })
            .await;
        handle
            .wait_with_timeout(CALL_TIMEOUT)
            .await
            .map_err(|()| BookingCallError("cancelBooking timed out".to_string()))?;

        let cancelled = self
            .store
            .state(|s| s.get(&booking_id).map(|b| b.status))
            .await;

        match cancelled {
            Some(routefare_booking::BookingStatus::Cancelled) => Ok(()),
            Some(status) => Err(BookingCallError(format!(
                "cancelBooking left booking {booking_id} in state {status:?}"
            ))),
            None => Err(BookingCallError(format!("booking {booking_id} not found"))),
        }
    }
}
