//! Seat Availability Engine (spec §4.F) and Booking Core (spec §4.G).
//!
//! This crate owns the booking aggregate end to end: seat holds against
//! Redis, the ten-state booking lifecycle, and the event-sourced reducer
//! that drives `createBooking`/`confirmBooking`/`cancelBooking`/
//! `completeBooking`. It depends on `routefare-matchmaking` pricing only
//! through the injected [`booking::RouteValidation`] trait, and on the
//! booking read model only through [`inventory::ConfirmedSeatsQuery`] /
//! [`booking::BookingProjectionQuery`] — neither crate is a hard
//! dependency.

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod booking;
pub mod inventory;
pub mod metrics;
pub mod types;

pub use booking::{
    BookingAction, BookingEnvironment, BookingProjectionQuery, BookingReducer, BookingState,
    RouteValidation,
};
pub use inventory::{ConfirmedSeatsQuery, InventoryError, SeatAvailability};
pub use types::{
    Booking, BookingStatus, CreateBookingRequest, RouteDate, RoutePricing, HOLD_TTL,
    MAX_SEATS_PER_BOOKING, PLATFORM_FEE_PCT,
};
