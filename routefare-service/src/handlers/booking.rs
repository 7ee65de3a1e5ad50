//! Booking HTTP handlers (spec §4.G / §6): `createBooking`,
//! `confirmBooking`, `cancelBooking`, and rider-facing reads.
//!
//! Every mutating handler follows the shape the teacher's
//! `api/reservations.rs` uses — send, wait, then re-read state — except
//! there is exactly one long-lived booking [`crate::state::BookingStore`]
//! for the whole process rather than one per request.

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::Json;
use routefare_booking::types::Booking;
use routefare_booking::{BookingAction, BookingProjectionQuery, BookingStatus};
use routefare_domain::{BookingId, RiderId};
use routefare_web::auth_extractor::AuthContext;
use routefare_web::AppError;
use serde::Deserialize;
use uuid::Uuid;

use crate::state::AppState;

const DISPATCH_TIMEOUT: Duration = Duration::from_secs(10);

fn booking_not_found(booking_id: BookingId) -> AppError {
    AppError::not_found("booking", booking_id)
}

/// Request body for `POST /v1/bookings`. `rider_id` is always taken
/// from the bearer token, never the body.
#[derive(Debug, Deserialize)]
pub struct CreateBookingBody {
    /// Route to book.
    pub route_id: routefare_domain::RouteId,
    /// Boarding stop.
    pub origin_stop_id: routefare_domain::StopId,
    /// Alighting stop.
    pub destination_stop_id: routefare_domain::StopId,
    /// Calendar date of travel.
    pub travel_date: chrono::NaiveDate,
    /// Seats requested.
    pub seats_requested: u32,
    /// Client-supplied idempotency key.
    pub idempotency_key: Option<String>,
}

/// `POST /v1/bookings`
pub async fn create_booking(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(body): Json<CreateBookingBody>,
) -> Result<Json<Booking>, AppError> {
    auth.require_role(routefare_auth::Role::Rider)?;

    let idempotency_key = body.idempotency_key.unwrap_or_else(|| Uuid::new_v4().to_string());
    let request = routefare_booking::types::CreateBookingRequest {
        rider_id: RiderId::from(auth.0.sub),
        route_id: body.route_id,
        origin_stop_id: body.origin_stop_id,
        destination_stop_id: body.destination_stop_id,
        travel_date: body.travel_date,
        seats_requested: body.seats_requested,
        idempotency_key: Some(idempotency_key.clone()),
    };

    let mut handle = state.booking_store.send(BookingAction::CreateBooking { request }).await;
    handle
        .wait_with_timeout(DISPATCH_TIMEOUT)
        .await
        .map_err(|()| AppError::timeout("createBooking timed out waiting for effects"))?;

    let (booking, error) = state
        .booking_store
        .state(|s| (s.find_by_idempotency_key(&idempotency_key).cloned(), s.last_error.clone()))
        .await;

    booking.map(Json).ok_or_else(|| error.map_or_else(|| AppError::internal("booking was not recorded"), AppError::validation))
}

/// `GET /v1/bookings/reference/{ref}`
pub async fn get_booking_by_reference(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(reference): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let booking = state
        .booking_projection
        .find_by_reference(&reference)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::not_found("booking", &reference))?;

    if *booking.rider_id.as_uuid() != auth.0.sub {
        auth.require_role(routefare_auth::Role::Admin)?;
    }

    Ok(Json(booking))
}

/// `GET /v1/bookings/{id}`
pub async fn get_booking(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(booking_id): Path<BookingId>,
) -> Result<Json<Booking>, AppError> {
    let booking = state
        .booking_projection
        .load_booking(booking_id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| booking_not_found(booking_id))?;

    if *booking.rider_id.as_uuid() != auth.0.sub {
        auth.require_role(routefare_auth::Role::Admin)?;
    }

    Ok(Json(booking))
}

/// Query params for `GET /v1/bookings`.
#[derive(Debug, Deserialize)]
pub struct ListBookingsQuery {
    /// Page number, zero-based. Defaults to 0.
    #[serde(default)]
    pub page: i64,
    /// Page size. Defaults to 20.
    #[serde(default = "default_page_size")]
    pub size: i64,
    /// When true, only return upcoming (non-terminal, future-dated) bookings.
    #[serde(default)]
    pub upcoming: bool,
}

const fn default_page_size() -> i64 {
    20
}

/// `GET /v1/bookings[?page&size]`, or `GET /v1/bookings/upcoming` via
/// `?upcoming=true`.
pub async fn list_bookings(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<ListBookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let rider_id = RiderId::from(auth.0.sub);
    let bookings = if query.upcoming {
        state.booking_projection.list_upcoming(rider_id).await.map_err(AppError::internal)?
    } else {
        state.booking_projection.list_for_rider(rider_id, query.page, query.size).await.map_err(AppError::internal)?
    };
    Ok(Json(bookings))
}

/// `GET /v1/bookings/upcoming`
pub async fn list_upcoming_bookings(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<Booking>>, AppError> {
    let rider_id = RiderId::from(auth.0.sub);
    let bookings = state.booking_projection.list_upcoming(rider_id).await.map_err(AppError::internal)?;
    Ok(Json(bookings))
}

/// Request body for `POST /v1/bookings/{id}/confirm` (internal).
#[derive(Debug, Deserialize)]
pub struct ConfirmBookingRequest {
    /// The payment that confirmed this booking.
    pub payment_id: routefare_domain::PaymentId,
}

/// `POST /v1/bookings/{id}/confirm` — internal; normally driven by
/// [`crate::adapters::booking_client::InProcessBookingClient`] from inside
/// the payment core's effects, exposed here too for operator/replay use.
pub async fn confirm_booking(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(booking_id): Path<BookingId>,
    Json(body): Json<ConfirmBookingRequest>,
) -> Result<Json<Booking>, AppError> {
    auth.require_role(routefare_auth::Role::Admin)?;

    let mut handle = state
        .booking_store
        .send(BookingAction::ConfirmBooking { booking_id, payment_id: body.payment_id })
        .await;
    handle
        .wait_with_timeout(DISPATCH_TIMEOUT)
        .await
        .map_err(|()| AppError::timeout("confirmBooking timed out waiting for effects"))?;

    let (booking, error) = state.booking_store.state(|s| (s.get(&booking_id).cloned(), s.last_error.clone())).await;

    if let Some(booking) = &booking {
        if booking.status == BookingStatus::Confirmed {
            return Ok(Json(booking.clone()));
        }
    }
    Err(error.map_or_else(|| booking_not_found(booking_id), AppError::validation))
}

/// Request body for `POST /v1/bookings/{id}/cancel`.
#[derive(Debug, Deserialize)]
pub struct CancelBookingRequest {
    /// Why the booking is being cancelled.
    pub reason: String,
}

/// `POST /v1/bookings/{id}/cancel`
pub async fn cancel_booking(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(booking_id): Path<BookingId>,
    Json(body): Json<CancelBookingRequest>,
) -> Result<Json<Booking>, AppError> {
    let actor = RiderId::from(auth.0.sub);

    let mut handle = state
        .booking_store
        .send(BookingAction::CancelBooking { booking_id, reason: body.reason, actor })
        .await;
    handle
        .wait_with_timeout(DISPATCH_TIMEOUT)
        .await
        .map_err(|()| AppError::timeout("cancelBooking timed out waiting for effects"))?;

    let (booking, error) = state.booking_store.state(|s| (s.get(&booking_id).cloned(), s.last_error.clone())).await;

    if let Some(booking) = &booking {
        if booking.status == BookingStatus::Cancelled {
            return Ok(Json(booking.clone()));
        }
    }
    Err(error.map_or_else(|| booking_not_found(booking_id), AppError::validation))
}
