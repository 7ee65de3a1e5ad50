//! Booking entity and the value objects its operations pass around.

use chrono::{DateTime, NaiveDate, Utc};
use routefare_domain::{BookingId, DriverId, HubId, PaymentId, RiderId, RouteId, StopId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use routefare_domain::BookingStatus;

/// Default cap on seats a single booking may request.
pub const MAX_SEATS_PER_BOOKING: u32 = 4;
/// Platform fee taken as a percentage of the total price.
pub const PLATFORM_FEE_PCT: Decimal = Decimal::from_parts(5, 0, 0, false, 2); // 0.05
/// How long a seat hold (and the PENDING/HELD booking backing it) survives unconfirmed.
pub const HOLD_TTL: std::time::Duration = std::time::Duration::from_secs(10 * 60);

/// A single booking, covering its full ten-state lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    /// Primary key.
    pub id: BookingId,
    /// Short, human-shareable reference (globally unique).
    pub reference: String,
    /// Rider who made the booking.
    pub rider_id: RiderId,
    /// Route being booked.
    pub route_id: RouteId,
    /// Driver operating the route, once known.
    pub driver_id: Option<DriverId>,
    /// Boarding stop.
    pub origin_stop_id: StopId,
    /// Alighting stop.
    pub destination_stop_id: StopId,
    /// Calendar date of travel.
    pub travel_date: NaiveDate,
    /// Scheduled departure instant for `travel_date`.
    pub departure_at: DateTime<Utc>,
    /// Number of seats booked (1..=`MAX_SEATS_PER_BOOKING`).
    pub seats_booked: u32,
    /// Allocated seat numbers, distinct, in ascending order.
    pub seat_numbers: Vec<u32>,
    /// Price per seat at the time of booking.
    pub price_per_seat: Decimal,
    /// `price_per_seat * seats_booked`, rounded to 2 decimals.
    pub total_price: Decimal,
    /// Platform fee taken from `total_price`.
    pub platform_fee: Decimal,
    /// Lifecycle state.
    pub status: BookingStatus,
    /// Associated payment, once one has been initiated.
    pub payment_id: Option<PaymentId>,
    /// Last known status of the associated payment.
    pub payment_status: Option<String>,
    /// Client-supplied idempotency key, if any.
    pub idempotency_key: Option<String>,
    /// Non-null iff `status` is PENDING, HELD, or PAYMENT_INITIATED.
    pub expires_at: Option<DateTime<Utc>>,
    /// Set when the booking reaches CONFIRMED.
    pub confirmed_at: Option<DateTime<Utc>>,
    /// Set when the booking reaches CANCELLED.
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Set when the booking reaches COMPLETED.
    pub completed_at: Option<DateTime<Utc>>,
    /// Why the booking was cancelled, if it was.
    pub cancellation_reason: Option<String>,
    /// Amount refunded on cancellation.
    pub refund_amount: Option<Decimal>,
    /// Refund processing status (`NONE`, `PENDING`, `COMPLETED`).
    pub refund_status: Option<String>,
    /// When the record was first created.
    pub created_at: DateTime<Utc>,
}

impl Booking {
    /// True if `status` is one of the non-terminal, cancellable states.
    #[must_use]
    pub fn is_cancellable(&self) -> bool {
        self.status.is_cancellable()
    }
}

/// A request to create a booking, as received from the HTTP layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    /// Rider making the request.
    pub rider_id: RiderId,
    /// Route to book.
    pub route_id: RouteId,
    /// Boarding stop.
    pub origin_stop_id: StopId,
    /// Alighting stop.
    pub destination_stop_id: StopId,
    /// Calendar date of travel.
    pub travel_date: NaiveDate,
    /// Seats requested.
    pub seats_requested: u32,
    /// Client-supplied idempotency key.
    pub idempotency_key: Option<String>,
}

/// Authoritative pricing and availability, as returned by matchmaking (4.I)
/// validation. `routefare-booking` depends on this shape but not on the
/// matchmaking crate itself — see [`crate::booking::RouteValidation`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePricing {
    /// Driver currently assigned to the route.
    pub driver_id: DriverId,
    /// Scheduled departure instant for the requested `travel_date`.
    pub departure_at: DateTime<Utc>,
    /// Total seats the vehicle has, independent of bookings.
    pub seats_total: u32,
    /// Price per seat at the time of validation.
    pub price_per_seat: Decimal,
    /// Whether the route is `ACTIVE` and open to new bookings.
    pub route_active: bool,
}

/// Stop id pair used to key availability/ confirmed-count lookups — kept
/// distinct from `(RouteId, NaiveDate)` in the hub graph, but booking only
/// ever needs the latter.
pub type RouteDate = (RouteId, NaiveDate);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_fee_pct_is_five_percent() {
        assert_eq!(PLATFORM_FEE_PCT.to_string(), "0.05");
    }
}
