//! `PostgreSQL`-backed [`BookingProjectionQuery`], plus the extra read
//! queries the HTTP handlers need (by-reference lookup, rider history,
//! upcoming bookings) that the reducer's own snapshot-hydration trait
//! doesn't expose.

use chrono::{NaiveDate, Utc};
use routefare_booking::types::{Booking, BookingStatus};
use routefare_booking::BookingProjectionQuery;
use routefare_domain::{BookingId, RiderId};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::future::Future;
use std::pin::Pin;

/// `PostgreSQL`-backed booking read model.
pub struct PostgresBookingProjection {
    pool: PgPool,
}

impl PostgresBookingProjection {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a booking snapshot, replacing any prior row (upsert).
    ///
    /// # Errors
    ///
    /// Returns a message if the write fails.
    pub async fn upsert(&self, booking: &Booking) -> Result<(), String> {
        sqlx::query(
            r"
            INSERT INTO bookings (
                id, reference, rider_id, route_id, driver_id, origin_stop_id,
                destination_stop_id, travel_date, departure_at, seats_booked,
                seat_numbers, price_per_seat, total_price, platform_fee, status,
                payment_id, payment_status, idempotency_key, expires_at,
                confirmed_at, cancelled_at, completed_at, cancellation_reason,
                refund_amount, refund_status, created_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26
            )
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                driver_id = EXCLUDED.driver_id,
                payment_id = EXCLUDED.payment_id,
                payment_status = EXCLUDED.payment_status,
                expires_at = EXCLUDED.expires_at,
                confirmed_at = EXCLUDED.confirmed_at,
                cancelled_at = EXCLUDED.cancelled_at,
                completed_at = EXCLUDED.completed_at,
                cancellation_reason = EXCLUDED.cancellation_reason,
                refund_amount = EXCLUDED.refund_amount,
                refund_status = EXCLUDED.refund_status
            ",
        )
        .bind(booking.id.as_uuid())
        .bind(&booking.reference)
        .bind(booking.rider_id.as_uuid())
        .bind(booking.route_id.as_uuid())
        .bind(booking.driver_id.map(|d| d.as_uuid()))
        .bind(booking.origin_stop_id.as_uuid())
        .bind(booking.destination_stop_id.as_uuid())
        .bind(booking.travel_date)
        .bind(booking.departure_at)
        .bind(booking.seats_booked as i32)
        .bind(
            booking
                .seat_numbers
                .iter()
                .map(|s| *s as i32)
                .collect::<Vec<i32>>(),
        )
        .bind(booking.price_per_seat)
        .bind(booking.total_price)
        .bind(booking.platform_fee)
        .bind(status_str(booking.status))
        .bind(booking.payment_id.map(|p| p.as_uuid()))
        .bind(&booking.payment_status)
        .bind(&booking.idempotency_key)
        .bind(booking.expires_at)
        .bind(booking.confirmed_at)
        .bind(booking.cancelled_at)
        .bind(booking.completed_at)
        .bind(&booking.cancellation_reason)
        .bind(booking.refund_amount)
        .bind(&booking.refund_status)
        .bind(booking.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("booking upsert failed: {e}"))?;

        Ok(())
    }

    /// Look up a booking by its human-shareable reference.
    ///
    /// # Errors
    ///
    /// Returns a message if the query fails.
    pub async fn find_by_reference(&self, reference: &str) -> Result<Option<Booking>, String> {
        let row: Option<BookingRow> = sqlx::query_as("SELECT * FROM bookings WHERE reference = $1")
            .bind(reference)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| format!("booking lookup failed: {e}"))?;
        Ok(row.map(row_to_booking))
    }

    /// Page through a rider's bookings, most recent first.
    ///
    /// # Errors
    ///
    /// Returns a message if the query fails.
    pub async fn list_for_rider(
        &self,
        rider_id: RiderId,
        page: i64,
        size: i64,
    ) -> Result<Vec<Booking>, String> {
        let rows: Vec<BookingRow> = sqlx::query_as(
            "SELECT * FROM bookings WHERE rider_id = $1 ORDER BY created_at DESC OFFSET $2 LIMIT $3",
        )
        .bind(rider_id.as_uuid())
        .bind(page.max(0) * size.max(1))
        .bind(size.max(1))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| format!("booking list failed: {e}"))?;
        Ok(rows.into_iter().map(row_to_booking).collect())
    }

    /// A rider's bookings whose travel date is today or later and whose
    /// status isn't terminal.
    ///
    /// # Errors
    ///
    /// Returns a message if the query fails.
    pub async fn list_upcoming(&self, rider_id: RiderId) -> Result<Vec<Booking>, String> {
        let rows: Vec<BookingRow> = sqlx::query_as(
            r"
            SELECT * FROM bookings
            WHERE rider_id = $1 AND travel_date >= $2
              AND status NOT IN ('CANCELLED', 'EXPIRED', 'FAILED', 'COMPLETED')
            ORDER BY departure_at ASC
            ",
        )
        .bind(rider_id.as_uuid())
        .bind(Utc::now().date_naive())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| format!("upcoming booking list failed: {e}"))?;
        Ok(rows.into_iter().map(row_to_booking).collect())
    }

    /// Bookings whose seat hold has lapsed but whose record never
    /// transitioned out of it — the reducer's own `delay` effect (spec
    /// §4.G) should have cancelled these already; surviving rows here mean
    /// that effect was lost to a process restart, the case the scheduler's
    /// hold-expiration/orphaned-hold-cleanup jobs (spec §4.E) sweep up.
    ///
    /// # Errors
    ///
    /// Returns a message if the query fails.
    pub async fn list_expired_holds(&self) -> Result<Vec<Booking>, String> {
        let rows: Vec<BookingRow> = sqlx::query_as(
            r"
            SELECT * FROM bookings
            WHERE status IN ('PENDING', 'HELD', 'PAYMENT_INITIATED') AND expires_at <= $1
            ORDER BY expires_at ASC
            ",
        )
        .bind(Utc::now())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| format!("expired-hold list failed: {e}"))?;
        Ok(rows.into_iter().map(row_to_booking).collect())
    }
}

impl BookingProjectionQuery for PostgresBookingProjection {
    fn load_booking(
        &self,
        booking_id: BookingId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Booking>, String>> + Send + '_>> {
        Box::pin(async move {
            let row: Option<BookingRow> = sqlx::query_as("SELECT * FROM bookings WHERE id = $1")
                .bind(booking_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| format!("booking lookup failed: {e}"))?;
            Ok(row.map(row_to_booking))
        })
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: uuid::Uuid,
    reference: String,
    rider_id: uuid::Uuid,
    route_id: uuid::Uuid,
    driver_id: Option<uuid::Uuid>,
    origin_stop_id: uuid::Uuid,
    destination_stop_id: uuid::Uuid,
    travel_date: NaiveDate,
    departure_at: chrono::DateTime<Utc>,
    seats_booked: i32,
    seat_numbers: Vec<i32>,
    price_per_seat: Decimal,
    total_price: Decimal,
    platform_fee: Decimal,
    status: String,
    payment_id: Option<uuid::Uuid>,
    payment_status: Option<String>,
    idempotency_key: Option<String>,
    expires_at: Option<chrono::DateTime<Utc>>,
    confirmed_at: Option<chrono::DateTime<Utc>>,
    cancelled_at: Option<chrono::DateTime<Utc>>,
    completed_at: Option<chrono::DateTime<Utc>>,
    cancellation_reason: Option<String>,
    refund_amount: Option<Decimal>,
    refund_status: Option<String>,
    created_at: chrono::DateTime<Utc>,
}

fn status_str(status: BookingStatus) -> &'static str {
    match status {
        BookingStatus::Pending => "PENDING",
        BookingStatus::Held => "HELD",
        BookingStatus::PaymentInitiated => "PAYMENT_INITIATED",
        BookingStatus::Paid => "PAID",
        BookingStatus::Confirmed => "CONFIRMED",
        BookingStatus::CheckedIn => "CHECKED_IN",
        BookingStatus::Completed => "COMPLETED",
        BookingStatus::Cancelled => "CANCELLED",
        BookingStatus::Expired => "EXPIRED",
        BookingStatus::Failed => "FAILED",
    }
}

fn parse_status(s: &str) -> BookingStatus {
    match s {
        "HELD" => BookingStatus::Held,
        "PAYMENT_INITIATED" => BookingStatus::PaymentInitiated,
        "PAID" => BookingStatus::Paid,
        "CONFIRMED" => BookingStatus::Confirmed,
        "CHECKED_IN" => BookingStatus::CheckedIn,
        "COMPLETED" => BookingStatus::Completed,
        "CANCELLED" => BookingStatus::Cancelled,
        "EXPIRED" => BookingStatus::Expired,
        "FAILED" => BookingStatus::Failed,
        _ => BookingStatus::Pending,
    }
}

fn row_to_booking(row: BookingRow) -> Booking {
    Booking {
        id: BookingId::from(row.id),
        reference: row.reference,
        rider_id: RiderId::from(row.rider_id),
        route_id: row.route_id.into(),
        driver_id: row.driver_id.map(Into::into),
        origin_stop_id: row.origin_stop_id.into(),
        destination_stop_id: row.destination_stop_id.into(),
        travel_date: row.travel_date,
        departure_at: row.departure_at,
        seats_booked: row.seats_booked as u32,
        seat_numbers: row.seat_numbers.into_iter().filter_map(|s| u32::try_from(s).ok()).collect(),
        price_per_seat: row.price_per_seat,
        total_price: row.total_price,
        platform_fee: row.platform_fee,
        status: parse_status(&row.status),
        payment_id: row.payment_id.map(Into::into),
        payment_status: row.payment_status,
        idempotency_key: row.idempotency_key,
        expires_at: row.expires_at,
        confirmed_at: row.confirmed_at,
        cancelled_at: row.cancelled_at,
        completed_at: row.completed_at,
        cancellation_reason: row.cancellation_reason,
        refund_amount: row.refund_amount,
        refund_status: row.refund_status,
        created_at: row.created_at,
    }
}
