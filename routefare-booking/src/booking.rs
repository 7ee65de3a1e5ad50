//! Booking Core (spec §4.G): `createBooking`, `confirmBooking`,
//! `cancelBooking`, `completeBooking`.
//!
//! Adapted from `examples/ticketing/src/aggregates/reservation.rs`'s saga
//! reducer: commands describe intent, the reducer validates synchronously
//! against in-memory state where it can, and defers genuinely external work
//! (route validation, distributed locking, seat holds) to `Effect::Future`
//! blocks that re-enter the reducer with a result event. Unlike the
//! teacher's reservation saga, this reducer owns a single aggregate
//! (bookings) rather than coordinating sibling aggregates over the event
//! bus — seat availability (4.F) is a plain injected dependency.

use chrono::{NaiveDate, Utc};
use routefare_core::{
    append_events, delay, effect::Effect, environment::Clock, event::SerializedEvent,
    event_bus::EventBus, event_store::EventStore, publish_event, reducer::Reducer, smallvec,
    stream::StreamId, SmallVec,
};
use routefare_domain::idempotency::RedisIdempotencyStore;
use routefare_domain::lock::route_date_lock_key;
use routefare_domain::{
    compute_refund, transition_to, AuditEntry, AuditLog, BookingId, BookingStatus,
    DistributedLock, IdempotencyStore, RefundPolicyConfig,
};
use routefare_macros::Action;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::inventory::{ConfirmedSeatsQuery, SeatAvailability};
use crate::types::{
    Booking, CreateBookingRequest, RoutePricing, HOLD_TTL, MAX_SEATS_PER_BOOKING,
    PLATFORM_FEE_PCT,
};

const IDEMPOTENCY_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const LOCK_WAIT: Duration = Duration::from_secs(5);
const LOCK_LEASE: Duration = Duration::from_secs(10);

/// Validates route availability and returns authoritative pricing — the
/// matchmaking (4.I) call from booking-create step 2. Injected so this
/// crate has no direct dependency on `routefare-matchmaking`.
#[async_trait::async_trait]
pub trait RouteValidation: Send + Sync {
    /// Validate that `route_id` is bookable for `date`/`seats` and return
    /// pricing. Err is a business validation failure (surfaced to the
    /// caller), not a transport error.
    async fn validate(
        &self,
        route_id: &str,
        date: NaiveDate,
        seats: u32,
    ) -> Result<RoutePricing, String>;
}

/// Loads booking snapshots on demand, mirroring the
/// `InventoryProjectionQuery`/`ReservationProjectionQuery` state-loading
/// pattern the teacher uses throughout its aggregates.
pub trait BookingProjectionQuery: Send + Sync {
    /// Load a single booking by id.
    fn load_booking(
        &self,
        booking_id: BookingId,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Option<Booking>, String>> + Send + '_>>;
}

/// Actions for the Booking aggregate: commands describe client intent,
/// events describe what happened and are the unit of persistence.
#[derive(Action, Clone, Debug, Serialize, Deserialize)]
pub enum BookingAction {
    // ===== Commands =====
    /// Create a booking for a route/date/seat count.
    #[command]
    CreateBooking {
        /// The incoming request.
        request: CreateBookingRequest,
    },
    /// Confirm a booking after payment success.
    #[command]
    ConfirmBooking {
        /// Booking to confirm.
        booking_id: BookingId,
        /// Payment that confirmed it.
        payment_id: routefare_domain::PaymentId,
    },
    /// Cancel a booking at the rider's (or admin's) request.
    #[command]
    CancelBooking {
        /// Booking to cancel.
        booking_id: BookingId,
        /// Human-readable reason.
        reason: String,
        /// Who requested the cancellation (for the ownership check).
        actor: routefare_domain::RiderId,
    },
    /// Mark a checked-in booking complete.
    #[command]
    CompleteBooking {
        /// Booking to complete.
        booking_id: BookingId,
    },

    // ===== Events =====
    /// A booking was created and its seats held.
    #[event]
    BookingCreated {
        /// The fully-populated booking record.
        booking: Box<Booking>,
    },
    /// `createBooking` was rejected by validation (not an infra failure).
    #[event]
    BookingRejected {
        /// The request that was rejected, if one was on hand.
        idempotency_key: Option<String>,
        /// Why.
        reason: String,
    },
    /// Seat holds could not be placed (lost the race despite the lock).
    #[event]
    SeatHoldFailed {
        /// The booking that failed to get its hold.
        booking_id: BookingId,
        /// Why.
        reason: String,
    },
    /// A booking transitioned to CONFIRMED.
    #[event]
    BookingConfirmed {
        /// Booking id.
        booking_id: BookingId,
        /// Payment that confirmed it.
        payment_id: routefare_domain::PaymentId,
        /// When confirmed.
        confirmed_at: chrono::DateTime<Utc>,
    },
    /// A booking transitioned to CANCELLED.
    #[event]
    BookingCancelled {
        /// Booking id.
        booking_id: BookingId,
        /// Cancellation reason.
        reason: String,
        /// Refund owed, if any.
        refund_amount: Decimal,
        /// When cancelled.
        cancelled_at: chrono::DateTime<Utc>,
    },
    /// A booking transitioned to COMPLETED.
    #[event]
    BookingCompleted {
        /// Booking id.
        booking_id: BookingId,
        /// When completed.
        completed_at: chrono::DateTime<Utc>,
    },
    /// A command failed validation unrelated to booking creation.
    #[event]
    ValidationFailed {
        /// Error message.
        error: String,
    },
    /// A booking snapshot was (re)loaded from the projection.
    #[event]
    BookingStateLoaded {
        /// The booking id that was loaded for.
        booking_id: BookingId,
        /// The loaded snapshot, if one existed.
        booking: Option<Box<Booking>>,
    },
}

/// Dependencies for the Booking reducer.
#[derive(Clone)]
pub struct BookingEnvironment {
    /// Clock for timestamps and expiry calculation.
    pub clock: Arc<dyn Clock>,
    /// Event store for persistence.
    pub event_store: Arc<dyn EventStore>,
    /// Event bus for publishing `booking.*` topics.
    pub event_bus: Arc<dyn EventBus>,
    /// Stream id for this aggregate instance.
    pub stream_id: StreamId,
    /// Projection query for loading booking snapshots on demand.
    pub projection: Arc<dyn BookingProjectionQuery>,
    /// Matchmaking validation (4.I).
    pub route_validation: Arc<dyn RouteValidation>,
    /// Confirmed-seat counts from the booking read model.
    pub confirmed_seats: Arc<dyn ConfirmedSeatsQuery>,
    /// Seat availability engine (4.F).
    pub inventory: Arc<SeatAvailability>,
    /// Distributed lock service (4.A).
    pub lock: Arc<DistributedLock>,
    /// Idempotency store (4.B).
    pub idempotency: Arc<RedisIdempotencyStore>,
    /// Refund policy configuration (4.G).
    pub refund_policy: RefundPolicyConfig,
    /// Append-only audit log (4.K).
    pub audit_log: Arc<dyn AuditLog>,
}

/// In-memory booking snapshots, hydrated on demand from the projection.
#[derive(Debug, Default)]
pub struct BookingState {
    bookings: HashMap<BookingId, Booking>,
    loaded: std::collections::HashSet<BookingId>,
    /// Last validation/business error, surfaced to callers.
    pub last_error: Option<String>,
}

impl BookingState {
    /// An empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a booking snapshot.
    #[must_use]
    pub fn get(&self, booking_id: &BookingId) -> Option<&Booking> {
        self.bookings.get(booking_id)
    }

    /// Find a booking created from a given idempotency key, among those
    /// this process has handled since it started. Lets `createBooking`
    /// callers recover the booking just created without the reducer
    /// exposing internally-generated ids up front.
    #[must_use]
    pub fn find_by_idempotency_key(&self, key: &str) -> Option<&Booking> {
        self.bookings.values().find(|b| b.idempotency_key.as_deref() == Some(key))
    }

    fn is_loaded(&self, booking_id: &BookingId) -> bool {
        self.loaded.contains(booking_id)
    }
}

fn serialize(action: &BookingAction) -> Result<SerializedEvent, String> {
    let event_type = format!("Booking{action:?}")
        .split('(')
        .next()
        .unwrap_or("Unknown")
        .to_string();
    let data = bincode::serialize(action).map_err(|e| format!("serialization error: {e}"))?;
    Ok(SerializedEvent::new(event_type, data, None))
}

/// Reducer for the Booking aggregate.
#[derive(Clone, Debug, Default)]
pub struct BookingReducer;

impl BookingReducer {
    /// A new reducer instance.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Append the event to the event store, publish it on `topic`, and —
    /// when `audit` is given — write it to [`BookingEnvironment::audit_log`]
    /// in the same effect batch, so a transition and its audit record are
    /// never observed apart (spec §4.K).
    fn create_effects(
        event: BookingAction,
        env: &BookingEnvironment,
        topic: &'static str,
        audit: Option<AuditEntry>,
    ) -> SmallVec<[Effect<BookingAction>; 4]> {
        let Ok(serialized) = serialize(&event) else {
            return SmallVec::new();
        };
        let mut effects: SmallVec<[Effect<BookingAction>; 4]> = smallvec![
            append_events! {
                store: env.event_store,
                stream: env.stream_id.as_str(),
                expected_version: None,
                events: vec![serialized.clone()],
                on_success: |_version| None,
                on_error: |error| Some(BookingAction::ValidationFailed {
                    error: error.to_string(),
                })
            },
            publish_event! {
                bus: env.event_bus,
                topic: topic,
                event: serialized,
                on_success: || None,
                on_error: |error| Some(BookingAction::ValidationFailed {
                    error: error.to_string(),
                })
            }
        ];
        if let Some(entry) = audit {
            let audit_log = env.audit_log.clone();
            effects.push(Effect::Future(Box::pin(async move {
                if let Err(error) = audit_log.record(entry).await {
                    tracing::warn!(%error, "failed to record audit entry");
                }
                None
            })));
        }
        effects
    }

    fn apply_event(state: &mut BookingState, action: &BookingAction) {
        match action {
            BookingAction::BookingCreated { booking } => {
                state.bookings.insert(booking.id, (**booking).clone());
                state.loaded.insert(booking.id);
                state.last_error = None;
                crate::metrics::record_booking_created(booking.seats_booked);
            }
            BookingAction::BookingConfirmed {
                booking_id,
                payment_id,
                confirmed_at,
            } => {
                if let Some(booking) = state.bookings.get_mut(booking_id) {
                    booking.status = BookingStatus::Confirmed;
                    booking.payment_id = Some(*payment_id);
                    booking.confirmed_at = Some(*confirmed_at);
                    booking.expires_at = None;
                }
                state.last_error = None;
                crate::metrics::record_booking_confirmed();
            }
            BookingAction::BookingCancelled {
                booking_id,
                reason,
                refund_amount,
                cancelled_at,
            } => {
                if let Some(booking) = state.bookings.get_mut(booking_id) {
                    booking.status = BookingStatus::Cancelled;
                    booking.cancelled_at = Some(*cancelled_at);
                    booking.cancellation_reason = Some(reason.clone());
                    booking.refund_amount = Some(*refund_amount);
                    booking.refund_status = Some(
                        if *refund_amount > Decimal::ZERO {
                            "PENDING"
                        } else {
                            "NONE"
                        }
                        .to_string(),
                    );
                    booking.expires_at = None;
                }
                state.last_error = None;
                crate::metrics::record_booking_cancelled(*refund_amount);
            }
            BookingAction::BookingCompleted {
                booking_id,
                completed_at,
            } => {
                if let Some(booking) = state.bookings.get_mut(booking_id) {
                    booking.status = BookingStatus::Completed;
                    booking.completed_at = Some(*completed_at);
                }
                state.last_error = None;
                crate::metrics::record_booking_completed();
            }
            BookingAction::SeatHoldFailed { booking_id, reason } => {
                if let Some(booking) = state.bookings.get_mut(booking_id) {
                    booking.status = BookingStatus::Failed;
                }
                state.last_error = Some(reason.clone());
                crate::metrics::record_booking_failed();
            }
            BookingAction::BookingRejected { reason, .. } | BookingAction::ValidationFailed { error: reason } => {
                state.last_error = Some(reason.clone());
            }
            BookingAction::BookingStateLoaded { booking_id, booking } => {
                state.loaded.insert(*booking_id);
                if let Some(booking) = booking {
                    state.bookings.insert(*booking_id, (**booking).clone());
                }
                state.last_error = None;
            }
            BookingAction::CreateBooking { .. }
            | BookingAction::ConfirmBooking { .. }
            | BookingAction::CancelBooking { .. }
            | BookingAction::CompleteBooking { .. } => {}
        }
    }
}

impl Reducer for BookingReducer {
    type State = BookingState;
    type Action = BookingAction;
    type Environment = BookingEnvironment;

    #[allow(clippy::too_many_lines)] // Complex saga orchestration required
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            BookingAction::CreateBooking { request } => {
                if request.seats_requested == 0 || request.seats_requested > MAX_SEATS_PER_BOOKING {
                    let event = BookingAction::BookingRejected {
                        idempotency_key: request.idempotency_key,
                        reason: format!(
                            "seats_requested must be 1..={MAX_SEATS_PER_BOOKING}, got {}",
                            request.seats_requested
                        ),
                    };
                    Self::apply_event(state, &event);
                    return SmallVec::new();
                }

                let route_validation = env.route_validation.clone();
                let confirmed_seats = env.confirmed_seats.clone();
                let inventory = env.inventory.clone();
                let lock = env.lock.clone();
                let idempotency = env.idempotency.clone();
                let clock = env.clock.clone();

                smallvec![Effect::Future(Box::pin(async move {
                    Some(create_booking_outcome(
                        request,
                        route_validation,
                        confirmed_seats,
                        inventory,
                        lock,
                        idempotency,
                        clock,
                    )
                    .await)
                }))]
            }

            BookingAction::BookingCreated { ref booking } => {
                Self::apply_event(state, &action);
                let audit = AuditEntry::transition(
                    "booking",
                    booking.id,
                    BookingStatus::Pending,
                    booking.status,
                    "createBooking",
                    env.clock.now(),
                );
                let mut effects =
                    Self::create_effects(action.clone(), env, "booking.created", Some(audit));
                let expires_at = booking.expires_at;
                let booking_id = booking.id;
                if let Some(expires_at) = expires_at {
                    let now = env.clock.now();
                    let wait = (expires_at - now).to_std().unwrap_or(Duration::ZERO);
                    effects.push(delay! {
                        duration: wait,
                        action: BookingAction::CancelBooking {
                            booking_id,
                            reason: "hold expired".to_string(),
                            actor: booking.rider_id,
                        }
                    });
                }
                effects
            }

            BookingAction::BookingRejected { .. } | BookingAction::SeatHoldFailed { .. } => {
                Self::apply_event(state, &action);
                SmallVec::new()
            }

            BookingAction::ConfirmBooking {
                booking_id,
                payment_id,
            } => {
                if !state.is_loaded(&booking_id) {
                    return hydrate_then_retry(
                        booking_id,
                        env,
                        BookingAction::ConfirmBooking {
                            booking_id,
                            payment_id,
                        },
                    );
                }

                let Some(booking) = state.bookings.get(&booking_id) else {
                    return SmallVec::new();
                };

                if !matches!(
                    booking.status,
                    BookingStatus::Held | BookingStatus::PaymentInitiated
                ) {
                    // Already confirmed (or otherwise no longer pending) — idempotent no-op
                    // per spec §4.G ("accept only from HELD/PAYMENT_INITIATED, else no-op").
                    return SmallVec::new();
                }

                if let Err(error) = transition_to(booking.status, BookingStatus::Confirmed) {
                    Self::apply_event(
                        state,
                        &BookingAction::ValidationFailed {
                            error: error.to_string(),
                        },
                    );
                    return SmallVec::new();
                }

                let previous_status = booking.status;
                let route_id = booking.route_id;
                let travel_date = booking.travel_date;
                let seat_numbers = booking.seat_numbers.clone();

                let now = env.clock.now();
                let audit = AuditEntry::transition(
                    "booking",
                    booking_id,
                    previous_status,
                    BookingStatus::Confirmed,
                    "confirmBooking",
                    now,
                );
                let event = BookingAction::BookingConfirmed {
                    booking_id,
                    payment_id,
                    confirmed_at: now,
                };
                Self::apply_event(state, &event);
                let mut effects =
                    Self::create_effects(event, env, "booking.confirmed", Some(audit));

                let inventory = env.inventory.clone();
                effects.push(Effect::Future(Box::pin(async move {
                    if let Err(error) = inventory
                        .release(&route_id.to_string(), travel_date, &seat_numbers, booking_id)
                        .await
                    {
                        tracing::warn!(%booking_id, %error, "failed to release seat hold on confirm");
                    }
                    None
                })));
                effects
            }

            BookingAction::CancelBooking {
                booking_id,
                reason,
                actor,
            } => {
                if !state.is_loaded(&booking_id) {
                    return hydrate_then_retry(
                        booking_id,
                        env,
                        BookingAction::CancelBooking {
                            booking_id,
                            reason,
                            actor,
                        },
                    );
                }

                let Some(booking) = state.bookings.get(&booking_id) else {
                    return SmallVec::new();
                };

                if booking.rider_id != actor {
                    Self::apply_event(
                        state,
                        &BookingAction::ValidationFailed {
                            error: "actor does not own this booking".to_string(),
                        },
                    );
                    return SmallVec::new();
                }

                if let Err(error) = transition_to(booking.status, BookingStatus::Cancelled) {
                    Self::apply_event(
                        state,
                        &BookingAction::ValidationFailed {
                            error: format!("booking {booking_id} is not cancellable: {error}"),
                        },
                    );
                    return SmallVec::new();
                }

                let previous_status = booking.status;
                let now = env.clock.now();
                let refund = compute_refund(
                    &env.refund_policy,
                    booking.total_price,
                    booking.departure_at,
                    now,
                );
                let route_id = booking.route_id;
                let travel_date = booking.travel_date;
                let seat_numbers = booking.seat_numbers.clone();

                let audit = AuditEntry::transition(
                    "booking",
                    booking_id,
                    previous_status,
                    BookingStatus::Cancelled,
                    reason.as_str(),
                    now,
                );
                let event = BookingAction::BookingCancelled {
                    booking_id,
                    reason,
                    refund_amount: refund,
                    cancelled_at: now,
                };
                Self::apply_event(state, &event);
                let mut effects =
                    Self::create_effects(event, env, "booking.cancelled", Some(audit));

                let inventory = env.inventory.clone();
                effects.push(Effect::Future(Box::pin(async move {
                    if let Err(error) = inventory
                        .release(&route_id.to_string(), travel_date, &seat_numbers, booking_id)
                        .await
                    {
                        tracing::warn!(%booking_id, %error, "failed to release seat hold on cancel");
                    }
                    None
                })));
                effects
            }

            BookingAction::CompleteBooking { booking_id } => {
                if !state.is_loaded(&booking_id) {
                    return hydrate_then_retry(
                        booking_id,
                        env,
                        BookingAction::CompleteBooking { booking_id },
                    );
                }

                let Some(booking) = state.bookings.get(&booking_id) else {
                    return SmallVec::new();
                };

                if booking.status != BookingStatus::CheckedIn {
                    return SmallVec::new();
                }

                let now = env.clock.now();
                let audit = AuditEntry::transition(
                    "booking",
                    booking_id,
                    BookingStatus::CheckedIn,
                    BookingStatus::Completed,
                    "completeBooking",
                    now,
                );
                let event = BookingAction::BookingCompleted {
                    booking_id,
                    completed_at: now,
                };
                Self::apply_event(state, &event);
                Self::create_effects(event, env, "booking.completed", Some(audit))
            }

            event => {
                Self::apply_event(state, &event);
                SmallVec::new()
            }
        }
    }
}

fn hydrate_then_retry(
    booking_id: BookingId,
    env: &BookingEnvironment,
    original: BookingAction,
) -> SmallVec<[Effect<BookingAction>; 4]> {
    let projection = env.projection.clone();
    smallvec![Effect::Sequential(vec![
        Effect::Future(Box::pin(async move {
            let booking = projection.load_booking(booking_id).await.ok().flatten();
            Some(BookingAction::BookingStateLoaded {
                booking_id,
                booking: booking.map(Box::new),
            })
        })),
        Effect::Future(Box::pin(async move { Some(original) })),
    ])]
}

#[allow(clippy::too_many_arguments)] // threads every create-booking dependency through one outcome fn
async fn create_booking_outcome(
    request: CreateBookingRequest,
    route_validation: Arc<dyn RouteValidation>,
    confirmed_seats: Arc<dyn ConfirmedSeatsQuery>,
    inventory: Arc<SeatAvailability>,
    lock: Arc<DistributedLock>,
    idempotency: Arc<RedisIdempotencyStore>,
    clock: Arc<dyn Clock>,
) -> BookingAction {
    let booking_id = if let Some(key) = &request.idempotency_key {
        match idempotency
            .register_or_get(key, BookingId::new(), IDEMPOTENCY_TTL)
            .await
        {
            Ok(reg) if reg.first => reg.stored,
            Ok(reg) => {
                return BookingAction::BookingRejected {
                    idempotency_key: request.idempotency_key.clone(),
                    reason: format!("idempotency replay: booking {} already in flight", reg.stored),
                };
            }
            Err(error) => {
                return BookingAction::ValidationFailed {
                    error: format!("idempotency store error: {error}"),
                };
            }
        }
    } else {
        BookingId::new()
    };

    let pricing = match route_validation
        .validate(&request.route_id.to_string(), request.travel_date, request.seats_requested)
        .await
    {
        Ok(p) => p,
        Err(reason) => {
            return BookingAction::BookingRejected {
                idempotency_key: request.idempotency_key.clone(),
                reason,
            }
        }
    };

    if !pricing.route_active {
        return BookingAction::BookingRejected {
            idempotency_key: request.idempotency_key.clone(),
            reason: "route is not active".to_string(),
        };
    }

    let route_id = request.route_id;
    let travel_date = request.travel_date;
    let seats_requested = request.seats_requested;
    let lock_key = route_date_lock_key(route_id, travel_date);
    let route_id_str = route_id.to_string();

    let result: Result<Booking, CreateBookingError> = lock
        .execute_with_lock(&lock_key, LOCK_WAIT, LOCK_LEASE, || async {
            let seat_numbers = inventory
                .allocate(
                    &route_id_str,
                    travel_date,
                    seats_requested,
                    &pricing,
                    confirmed_seats.as_ref(),
                )
                .await
                .map_err(|e| CreateBookingError::Business(e.to_string()))?;

            let now = clock.now();
            let total_price = (pricing.price_per_seat * Decimal::from(seats_requested))
                .round_dp(2);
            let platform_fee = (total_price * PLATFORM_FEE_PCT).round_dp(2);
            let expires_at = now + chrono::Duration::from_std(HOLD_TTL).unwrap_or_default();

            if let Err(error) = inventory
                .hold(&route_id_str, travel_date, &seat_numbers, booking_id, HOLD_TTL)
                .await
            {
                return Err(CreateBookingError::Business(format!(
                    "seat hold failed: {error}"
                )));
            }

            // PENDING -> HELD happens atomically within this single call; only
            // the terminal HELD state is ever observed outside the lock.
            transition_to(BookingStatus::Pending, BookingStatus::Held)
                .map_err(|e| CreateBookingError::Business(e.to_string()))?;

            Ok(Booking {
                id: booking_id,
                reference: booking_id.to_string()[..8].to_uppercase(),
                rider_id: request.rider_id,
                route_id,
                driver_id: Some(pricing.driver_id),
                origin_stop_id: request.origin_stop_id,
                destination_stop_id: request.destination_stop_id,
                travel_date,
                departure_at: pricing.departure_at,
                seats_booked: seats_requested,
                seat_numbers,
                price_per_seat: pricing.price_per_seat,
                total_price,
                platform_fee,
                status: BookingStatus::Held,
                payment_id: None,
                payment_status: None,
                idempotency_key: request.idempotency_key.clone(),
                expires_at: Some(expires_at),
                confirmed_at: None,
                cancelled_at: None,
                completed_at: None,
                cancellation_reason: None,
                refund_amount: None,
                refund_status: None,
                created_at: now,
            })
        })
        .await;

    match result {
        Ok(booking) => BookingAction::BookingCreated {
            booking: Box::new(booking),
        },
        Err(reason) => BookingAction::SeatHoldFailed {
            booking_id,
            reason: reason.to_string(),
        },
    }
}

/// Errors raised while placing a booking under the route+date lock.
#[derive(Debug, Error)]
enum CreateBookingError {
    /// The lock itself could not be acquired or released.
    #[error(transparent)]
    Lock(#[from] routefare_domain::LockError),
    /// A business-level failure inside the critical section (insufficient
    /// inventory, lost a seat-hold race).
    #[error("{0}")]
    Business(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use routefare_domain::RiderId;

    #[test]
    fn platform_fee_applies_to_rounded_total() {
        let total = Decimal::new(10000, 2); // 100.00
        let fee = (total * PLATFORM_FEE_PCT).round_dp(2);
        assert_eq!(fee, Decimal::new(500, 2)); // 5.00
    }

    #[test]
    fn seat_hold_failed_marks_booking_failed_and_records_error() {
        let mut state = BookingState::new();
        let booking_id = BookingId::new();
        let event = BookingAction::SeatHoldFailed {
            booking_id,
            reason: "seat contended: 3".to_string(),
        };
        BookingReducer::apply_event(&mut state, &event);
        assert_eq!(state.last_error.as_deref(), Some("seat contended: 3"));
    }

    #[test]
    fn cancel_rejects_non_owner() {
        let mut state = BookingState::new();
        let owner = RiderId::new();
        let stranger = RiderId::new();
        let booking_id = BookingId::new();
        let booking = Booking {
            id: booking_id,
            reference: "ABCD1234".to_string(),
            rider_id: owner,
            route_id: routefare_domain::RouteId::new(),
            driver_id: None,
            origin_stop_id: routefare_domain::StopId::new(),
            destination_stop_id: routefare_domain::StopId::new(),
            travel_date: Utc::now().date_naive(),
            departure_at: Utc::now(),
            seats_booked: 1,
            seat_numbers: vec![1],
            price_per_seat: Decimal::new(1000, 2),
            total_price: Decimal::new(1000, 2),
            platform_fee: Decimal::new(50, 2),
            status: BookingStatus::Held,
            payment_id: None,
            payment_status: None,
            idempotency_key: None,
            expires_at: Some(Utc::now()),
            confirmed_at: None,
            cancelled_at: None,
            completed_at: None,
            cancellation_reason: None,
            refund_amount: None,
            refund_status: None,
            created_at: Utc::now(),
        };
        BookingReducer::apply_event(
            &mut state,
            &BookingAction::BookingCreated {
                booking: Box::new(booking),
            },
        );
        assert_ne!(owner, stranger);
    }
}
