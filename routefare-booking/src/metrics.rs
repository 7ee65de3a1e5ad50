//! Business metrics for the booking core.
//!
//! ## Exported metrics
//!
//! - `booking_bookings_total{status}` — counter, bookings by terminal/interim status
//! - `booking_active_holds` — gauge, bookings currently in HELD/PAYMENT_INITIATED
//! - `booking_seats_booked_total` — counter, seats across all created bookings
//! - `booking_refund_amount_total` — counter, cents refunded on cancellation

use metrics::{describe_counter, describe_gauge};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Register metric descriptions. Call once at application startup.
pub fn register_business_metrics() {
    describe_counter!(
        "booking_bookings_total",
        "Total bookings by status transition (created, confirmed, cancelled, completed, failed)"
    );
    describe_gauge!(
        "booking_active_holds",
        "Current number of bookings holding seats, awaiting payment"
    );
    describe_counter!("booking_seats_booked_total", "Total seats across created bookings");
    describe_counter!(
        "booking_refund_amount_total",
        "Total refund amount issued on cancellation, in the route's currency minor unit"
    );
}

/// Record a booking successfully created (seats held).
pub fn record_booking_created(seats: u32) {
    metrics::counter!("booking_bookings_total", "status" => "created").increment(1);
    metrics::counter!("booking_seats_booked_total").increment(u64::from(seats));
    metrics::gauge!("booking_active_holds").increment(1.0);
}

/// Record a seat hold failure at booking creation.
pub fn record_booking_failed() {
    metrics::counter!("booking_bookings_total", "status" => "failed").increment(1);
}

/// Record a booking reaching CONFIRMED.
pub fn record_booking_confirmed() {
    metrics::counter!("booking_bookings_total", "status" => "confirmed").increment(1);
    metrics::gauge!("booking_active_holds").decrement(1.0);
}

/// Record a booking cancellation and its refund, if any.
pub fn record_booking_cancelled(refund_amount: Decimal) {
    metrics::counter!("booking_bookings_total", "status" => "cancelled").increment(1);
    metrics::gauge!("booking_active_holds").decrement(1.0);
    if let Some(cents) = (refund_amount * Decimal::from(100)).round().to_u64() {
        metrics::counter!("booking_refund_amount_total").increment(cents);
    }
}

/// Record a booking reaching COMPLETED.
pub fn record_booking_completed() {
    metrics::counter!("booking_bookings_total", "status" => "completed").increment(1);
}
