//! `RouteValidation` and `ConfirmedSeatsQuery` (spec §4.F/§4.G), backed by
//! the same `routes`/`schedules`/`drivers`/`bookings` tables
//! `routefare-matchmaking`'s `PostgresRouteCandidateQuery` (query.rs)
//! reads, but with a single-route-by-id lookup rather than a geospatial
//! prefilter.

use async_trait::async_trait;
use chrono::NaiveDate;
use routefare_booking::inventory::{ConfirmedSeatsQuery, InventoryError};
use routefare_booking::{RoutePricing, RouteValidation};
use routefare_domain::DriverId;
use sqlx::PgPool;
use std::collections::BTreeSet;

/// `PostgreSQL`-backed [`RouteValidation`] and [`ConfirmedSeatsQuery`].
pub struct PostgresRouteQuery {
    pool: PgPool,
}

impl PostgresRouteQuery {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct RouteRow {
    driver_id: uuid::Uuid,
    status: String,
    price_per_seat: rust_decimal::Decimal,
    departure_at: chrono::DateTime<chrono::Utc>,
    seats_total: i32,
    seats_confirmed: i32,
    seats_held: i32,
}

#[async_trait]
impl RouteValidation for PostgresRouteQuery {
    async fn validate(
        &self,
        route_id: &str,
        date: NaiveDate,
        seats: u32,
    ) -> Result<RoutePricing, String> {
        let route_uuid: uuid::Uuid = route_id.parse().map_err(|e| format!("invalid route id: {e}"))?;

        let row: Option<RouteRow> = sqlx::query_as(
            r"
            SELECT r.driver_id, r.status, r.price_per_seat, sch.departure_at,
                   sch.seats_total, sch.seats_confirmed, sch.seats_held
            FROM routes r
            JOIN schedules sch ON sch.route_id = r.id AND sch.travel_date = $2
            WHERE r.id = $1
            ",
        )
        .bind(route_uuid)
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| format!("route lookup failed: {e}"))?;

        let Some(row) = row else {
            return Err(format!("no schedule for route {route_id} on {date}"));
        };

        let available = row.seats_total - row.seats_confirmed - row.seats_held;
        if available < i32::try_from(seats).unwrap_or(i32::MAX) {
            return Err(format!(
                "only {available} seats available, {seats} requested"
            ));
        }

        Ok(RoutePricing {
            driver_id: DriverId::from(row.driver_id),
            departure_at: row.departure_at,
            seats_total: u32::try_from(row.seats_total).unwrap_or_default(),
            price_per_seat: row.price_per_seat,
            route_active: row.status == "ACTIVE",
        })
    }
}

#[async_trait]
impl ConfirmedSeatsQuery for PostgresRouteQuery {
    async fn confirmed_seats(
        &self,
        route_id: &str,
        date: NaiveDate,
    ) -> Result<BTreeSet<u32>, InventoryError> {
        let route_uuid: uuid::Uuid = route_id
            .parse()
            .map_err(|e| InventoryError::Query(format!("invalid route id: {e}")))?;

        let rows: Vec<(Vec<i32>,)> = sqlx::query_as(
            r"
            SELECT seat_numbers FROM bookings
            WHERE route_id = $1 AND travel_date = $2
              AND status IN ('CONFIRMED', 'CHECKED_IN')
            ",
        )
        .bind(route_uuid)
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| InventoryError::Query(e.to_string()))?;

        Ok(rows
            .into_iter()
            .flat_map(|(seats,)| seats.into_iter().filter_map(|s| u32::try_from(s).ok()))
            .collect())
    }
}
