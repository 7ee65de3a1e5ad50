//! Stage 1 (candidate selection), spec §4.I: "retrieve routes where
//! status=ACTIVE, seats available >= min seats, and some stop is within
//! `radius` of origin and some (later in stop order) is within `radius` of
//! destination." A geospatial prefilter using indexed points.
//!
//! `routefare-matchmaking` has no direct teacher analogue for this query —
//! grounded instead in the pack's PostGIS convention (`ST_DWithin` against
//! a `geography` column, so the radius is measured in meters regardless of
//! latitude) layered over `sqlx`, the same driver `routefare-postgres`
//! already wraps for the event store.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use geo::{HaversineDistance, Point};
use sqlx::PgPool;
use thiserror::Error;

use crate::types::{GeoPoint, RouteCandidate};

fn haversine_distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let a = Point::new(a.lon, a.lat);
    let b = Point::new(b.lon, b.lat);
    a.haversine_distance(&b) / 1000.0
}

/// Errors raised while running the Stage-1 prefilter.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The query could not be executed against the store.
    #[error("route candidate query failed: {0}")]
    Store(String),
}

/// The Stage-1 geospatial prefilter, as consumed by the matcher.
#[async_trait]
pub trait RouteCandidateQuery: Send + Sync {
    /// Retrieve active routes whose stops cover `origin`/`destination`
    /// within `radius_km`, with at least `min_seats` available on
    /// `travel_date`. Callers are responsible for the `MAX_CANDIDATES` cap
    /// and any further ranking — this stage only prefilters.
    async fn prefilter(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
        radius_km: f64,
        min_seats: u32,
        travel_date: NaiveDate,
    ) -> Result<Vec<RouteCandidate>, QueryError>;
}

/// PostGIS-backed [`RouteCandidateQuery`].
pub struct PostgresRouteCandidateQuery {
    pool: PgPool,
}

impl PostgresRouteCandidateQuery {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CandidateRow {
    route_id: uuid::Uuid,
    driver_id: uuid::Uuid,
    origin_stop_id: Option<uuid::Uuid>,
    origin_stop_order: Option<i32>,
    destination_stop_id: Option<uuid::Uuid>,
    destination_stop_order: Option<i32>,
    departure_at: DateTime<Utc>,
    price_per_seat: rust_decimal::Decimal,
    driver_rating: Option<f64>,
    seats_available: i32,
}

#[async_trait]
impl RouteCandidateQuery for PostgresRouteCandidateQuery {
    async fn prefilter(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
        radius_km: f64,
        min_seats: u32,
        travel_date: NaiveDate,
    ) -> Result<Vec<RouteCandidate>, QueryError> {
        let radius_m = radius_km * 1000.0;

        let rows: Vec<CandidateRow> = sqlx::query_as(
            r"
            SELECT
                r.id AS route_id,
                r.driver_id AS driver_id,
                os.id AS origin_stop_id,
                os.stop_order AS origin_stop_order,
                ds.id AS destination_stop_id,
                ds.stop_order AS destination_stop_order,
                sch.departure_at AS departure_at,
                r.price_per_seat AS price_per_seat,
                d.rating AS driver_rating,
                sch.seats_total - sch.seats_confirmed - sch.seats_held AS seats_available
            FROM routes r
            JOIN schedules sch ON sch.route_id = r.id AND sch.travel_date = $6
            JOIN drivers d ON d.id = r.driver_id
            LEFT JOIN LATERAL (
                SELECT id, stop_order FROM stops
                WHERE route_id = r.id
                  AND ST_DWithin(location::geography, ST_MakePoint($2, $1)::geography, $5)
                ORDER BY stop_order ASC
                LIMIT 1
            ) os ON true
            LEFT JOIN LATERAL (
                SELECT id, stop_order FROM stops
                WHERE route_id = r.id
                  AND ST_DWithin(location::geography, ST_MakePoint($4, $3)::geography, $5)
                ORDER BY stop_order DESC
                LIMIT 1
            ) ds ON true
            WHERE r.status = 'ACTIVE'
              AND (sch.seats_total - sch.seats_confirmed - sch.seats_held) >= $7
            ",
        )
        .bind(origin.lat)
        .bind(origin.lon)
        .bind(destination.lat)
        .bind(destination.lon)
        .bind(radius_m)
        .bind(travel_date)
        .bind(i64::from(min_seats))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| QueryError::Store(e.to_string()))?;

        Ok(rows.into_iter().map(row_to_candidate).collect())
    }
}

fn row_to_candidate(row: CandidateRow) -> RouteCandidate {
    RouteCandidate {
        route_id: row.route_id.into(),
        driver_id: row.driver_id.into(),
        origin_stop: row
            .origin_stop_id
            .zip(row.origin_stop_order)
            .map(|(id, order)| (id.into(), order.max(0) as usize)),
        destination_stop: row
            .destination_stop_id
            .zip(row.destination_stop_order)
            .map(|(id, order)| (id.into(), order.max(0) as usize)),
        departure_at: row.departure_at,
        price_per_seat: row.price_per_seat,
        driver_rating: row.driver_rating,
        seats_available: row.seats_available.max(0) as u32,
    }
}

/// Static route/stop fixture data backing [`InMemoryRouteCandidateQuery`] —
/// the shape a non-Postgres deployment (or a test) supplies in place of a
/// live `ST_DWithin` query.
#[derive(Debug, Clone)]
pub struct RouteStopData {
    /// Route id.
    pub route_id: routefare_domain::RouteId,
    /// Assigned driver.
    pub driver_id: routefare_domain::DriverId,
    /// Whether the route is currently `ACTIVE`.
    pub status_active: bool,
    /// Scheduled departure.
    pub departure_at: DateTime<Utc>,
    /// Price per seat.
    pub price_per_seat: rust_decimal::Decimal,
    /// Driver rating, `None` if unrated.
    pub driver_rating: Option<f64>,
    /// Seats currently available.
    pub seats_available: u32,
    /// Stops in route order, each with its geographic position.
    pub stops: Vec<(routefare_domain::StopId, usize, GeoPoint)>,
}

/// Pure in-memory [`RouteCandidateQuery`], computing the same
/// within-radius/in-order prefilter as [`PostgresRouteCandidateQuery`] but
/// over a fixed fixture set via `geo`'s haversine distance, rather than
/// `ST_DWithin`. Used for tests and for deployments with no PostGIS store.
pub struct InMemoryRouteCandidateQuery {
    routes: Vec<RouteStopData>,
}

impl InMemoryRouteCandidateQuery {
    /// Build a query backed by `routes`.
    #[must_use]
    pub const fn new(routes: Vec<RouteStopData>) -> Self {
        Self { routes }
    }
}

#[async_trait]
impl RouteCandidateQuery for InMemoryRouteCandidateQuery {
    async fn prefilter(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
        radius_km: f64,
        min_seats: u32,
        travel_date: NaiveDate,
    ) -> Result<Vec<RouteCandidate>, QueryError> {
        let mut candidates = Vec::new();

        for route in &self.routes {
            if !route.status_active
                || route.departure_at.date_naive() != travel_date
                || route.seats_available < min_seats
            {
                continue;
            }

            let origin_stop = route
                .stops
                .iter()
                .filter(|(_, _, point)| haversine_distance_km(*point, origin) <= radius_km)
                .min_by_key(|(_, order, _)| *order)
                .map(|(id, order, _)| (*id, *order));

            let destination_stop = route
                .stops
                .iter()
                .filter(|(_, _, point)| haversine_distance_km(*point, destination) <= radius_km)
                .max_by_key(|(_, order, _)| *order)
                .map(|(id, order, _)| (*id, *order));

            if origin_stop.is_none() && destination_stop.is_none() {
                continue;
            }

            candidates.push(RouteCandidate {
                route_id: route.route_id,
                driver_id: route.driver_id,
                origin_stop,
                destination_stop,
                departure_at: route.departure_at,
                price_per_seat: route.price_per_seat,
                driver_rating: route.driver_rating,
                seats_available: route.seats_available,
            });
        }

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use routefare_domain::{DriverId, RouteId, StopId};
    use rust_decimal_macros::dec;

    fn stop(order: usize, lat: f64, lon: f64) -> (StopId, usize, GeoPoint) {
        (StopId::new(), order, GeoPoint { lat, lon })
    }

    fn sample_route(travel_date: NaiveDate) -> RouteStopData {
        RouteStopData {
            route_id: RouteId::new(),
            driver_id: DriverId::new(),
            status_active: true,
            departure_at: travel_date.and_hms_opt(8, 0, 0).unwrap().and_utc(),
            price_per_seat: dec!(12.50),
            driver_rating: Some(4.7),
            seats_available: 3,
            stops: vec![
                stop(0, 40.0, -73.0),
                stop(1, 40.1, -73.1),
                stop(2, 40.5, -73.5),
            ],
        }
    }

    #[tokio::test]
    async fn finds_route_covering_both_endpoints_in_order() {
        let date = Utc::now().date_naive();
        let query = InMemoryRouteCandidateQuery::new(vec![sample_route(date)]);
        let results = query
            .prefilter(GeoPoint { lat: 40.0, lon: -73.0 }, GeoPoint { lat: 40.5, lon: -73.5 }, 5.0, 1, date)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].origin_stop.is_some());
        assert!(results[0].destination_stop.is_some());
    }

    #[tokio::test]
    async fn excludes_routes_below_min_seats() {
        let date = Utc::now().date_naive();
        let query = InMemoryRouteCandidateQuery::new(vec![sample_route(date)]);
        let results = query
            .prefilter(GeoPoint { lat: 40.0, lon: -73.0 }, GeoPoint { lat: 40.5, lon: -73.5 }, 5.0, 10, date)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn excludes_stops_outside_radius() {
        let date = Utc::now().date_naive();
        let query = InMemoryRouteCandidateQuery::new(vec![sample_route(date)]);
        let results = query
            .prefilter(GeoPoint { lat: 10.0, lon: 10.0 }, GeoPoint { lat: 11.0, lon: 11.0 }, 5.0, 1, date)
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
