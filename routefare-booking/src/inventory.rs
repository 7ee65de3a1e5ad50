//! Seat Availability Engine (spec §4.F).
//!
//! Computes available seats for a `(route, date)` and allocates specific
//! seat numbers. Confirmed counts come from the booking read model
//! (injected via [`ConfirmedSeatsQuery`]); held counts and the specific
//! held-seat keys live in Redis. Adapted from the seat-selection and
//! hold/release bookkeeping in
//! `examples/ticketing/src/aggregates/inventory.rs`'s `InventoryReducer`,
//! but backed directly by Redis rather than routed through the event
//! store — seat holds are a TTL cache, not an audit trail.

use async_trait::async_trait;
use chrono::NaiveDate;
use routefare_domain::BookingId;
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

use crate::types::RoutePricing;

/// Errors raised while computing or mutating seat availability.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Fewer seats are free than were requested.
    #[error("insufficient inventory: requested {requested}, available {available}")]
    Insufficient {
        /// Seats requested.
        requested: u32,
        /// Seats actually free at the time of the check.
        available: u32,
    },
    /// A seat that should have been free was already held (lost a race
    /// despite holding the route+date lock — a bug if it ever fires).
    #[error("seat contended: {0}")]
    SeatContended(u32),
    /// The Redis backend is unreachable or returned an error.
    #[error("inventory backend error: {0}")]
    Backend(#[from] redis::RedisError),
    /// The confirmed-seats projection query failed.
    #[error("confirmed seats query failed: {0}")]
    Query(String),
}

/// Read access to confirmed (CONFIRMED/CHECKED_IN) booking seat counts,
/// backed by the booking projection in Postgres. Injected so this module
/// has no direct dependency on `routefare-projections`.
#[async_trait]
pub trait ConfirmedSeatsQuery: Send + Sync {
    /// Seat numbers already confirmed (booking status CONFIRMED or
    /// CHECKED_IN) for this route+date.
    async fn confirmed_seats(
        &self,
        route_id: &str,
        date: NaiveDate,
    ) -> Result<BTreeSet<u32>, InventoryError>;
}

fn hold_key(route_id: &str, date: NaiveDate, seat: u32) -> String {
    format!("seat-hold:{route_id}:{date}:{seat}")
}

fn hold_index_key(booking_id: BookingId) -> String {
    format!("seat-hold-index:{booking_id}")
}

/// Seat availability engine for a single Redis backend, shared across all
/// routes/dates.
#[derive(Clone)]
pub struct SeatAvailability {
    client: redis::Client,
}

impl SeatAvailability {
    /// Build an engine against the given Redis connection URL.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::Backend`] if the URL cannot be parsed.
    pub fn new(redis_url: &str) -> Result<Self, InventoryError> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
        })
    }

    /// Seat numbers currently held (live hold keys) for this route+date.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::Backend`] on a connection failure.
    pub async fn held_seats(
        &self,
        route_id: &str,
        date: NaiveDate,
        seats_total: u32,
    ) -> Result<BTreeSet<u32>, InventoryError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let mut held = BTreeSet::new();
        for seat in 1..=seats_total {
            let exists: bool = redis::cmd("EXISTS")
                .arg(hold_key(route_id, date, seat))
                .query_async(&mut conn)
                .await?;
            if exists {
                held.insert(seat);
            }
        }
        Ok(held)
    }

    /// `availableCount = seatsTotal − confirmedCount − heldCount`.
    ///
    /// # Errors
    ///
    /// Propagates backend or query errors.
    pub async fn available_count(
        &self,
        route_id: &str,
        date: NaiveDate,
        pricing: &RoutePricing,
        confirmed: &dyn ConfirmedSeatsQuery,
    ) -> Result<u32, InventoryError> {
        let confirmed_seats = confirmed.confirmed_seats(route_id, date).await?;
        let held_seats = self.held_seats(route_id, date, pricing.seats_total).await?;
        let taken = confirmed_seats.union(&held_seats).count() as u32;
        Ok(pricing.seats_total.saturating_sub(taken))
    }

    /// Allocate `n` seat numbers: the lowest unassigned numbers in
    /// `1..=seats_total`, excluding both confirmed and held sets. MUST be
    /// called inside the `route:{routeId}:{date}` lock (4.A) — this
    /// function performs no locking of its own.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::Insufficient`] if fewer than `n` seats are
    /// free.
    pub async fn allocate(
        &self,
        route_id: &str,
        date: NaiveDate,
        n: u32,
        pricing: &RoutePricing,
        confirmed: &dyn ConfirmedSeatsQuery,
    ) -> Result<Vec<u32>, InventoryError> {
        let confirmed_seats = confirmed.confirmed_seats(route_id, date).await?;
        let held_seats = self.held_seats(route_id, date, pricing.seats_total).await?;
        let taken: BTreeSet<u32> = confirmed_seats.union(&held_seats).copied().collect();

        let allocated: Vec<u32> = (1..=pricing.seats_total)
            .filter(|seat| !taken.contains(seat))
            .take(n as usize)
            .collect();

        if allocated.len() < n as usize {
            return Err(InventoryError::Insufficient {
                requested: n,
                available: pricing.seats_total.saturating_sub(taken.len() as u32),
            });
        }

        Ok(allocated)
    }

    /// Atomically place holds on `seats` for `booking_id`. If any seat key
    /// already exists, no hold is left behind and the caller should fail
    /// the booking ("seat contended").
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::SeatContended`] if a seat was already
    /// held, or [`InventoryError::Backend`] on a connection failure.
    pub async fn hold(
        &self,
        route_id: &str,
        date: NaiveDate,
        seats: &[u32],
        booking_id: BookingId,
        ttl: Duration,
    ) -> Result<(), InventoryError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let mut placed = Vec::with_capacity(seats.len());

        for &seat in seats {
            let key = hold_key(route_id, date, seat);
            let set: Option<String> = redis::cmd("SET")
                .arg(&key)
                .arg(booking_id.to_string())
                .arg("NX")
                .arg("EX")
                .arg(ttl.as_secs())
                .query_async(&mut conn)
                .await?;

            if set.is_none() {
                for held_key in &placed {
                    let _: i64 = redis::cmd("DEL").arg(held_key).query_async(&mut conn).await?;
                }
                return Err(InventoryError::SeatContended(seat));
            }
            placed.push(key);
        }

        let index_key = hold_index_key(booking_id);
        let seat_list = seats
            .iter()
            .map(std::string::ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let _: () = redis::cmd("SET")
            .arg(&index_key)
            .arg(seat_list)
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async(&mut conn)
            .await?;

        Ok(())
    }

    /// Release holds for `booking_id`. Idempotent: releasing an
    /// already-released (or expired) hold is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::Backend`] on a connection failure.
    pub async fn release(
        &self,
        route_id: &str,
        date: NaiveDate,
        seats: &[u32],
        booking_id: BookingId,
    ) -> Result<(), InventoryError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        for &seat in seats {
            let _: i64 = redis::cmd("DEL")
                .arg(hold_key(route_id, date, seat))
                .query_async(&mut conn)
                .await?;
        }
        let _: i64 = redis::cmd("DEL")
            .arg(hold_index_key(booking_id))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hold_key_is_scoped_to_route_date_seat() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        assert_eq!(hold_key("r1", date, 3), "seat-hold:r1:2026-08-01:3");
    }

    #[test]
    fn hold_index_key_is_scoped_to_booking() {
        let booking_id = BookingId::new();
        assert_eq!(
            hold_index_key(booking_id),
            format!("seat-hold-index:{booking_id}")
        );
    }
}
