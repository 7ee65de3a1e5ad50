//! Value types the matchmaking pipeline passes between its three stages.

use chrono::{DateTime, Utc};
use routefare_domain::{DriverId, RouteId, StopId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Default search radius, kilometers, when the caller doesn't specify one.
pub const DEFAULT_RADIUS_KM: f64 = 5.0;
/// Default minimum seats requested.
pub const DEFAULT_MIN_SEATS: u32 = 1;
/// Half-width of the full-score time window (spec §4.I `time_match`).
pub const TIME_WINDOW: chrono::Duration = chrono::Duration::minutes(15);
/// Driver rating substituted when a driver has no ratings yet.
pub const DEFAULT_RATING: f64 = 4.0;
/// Candidates are capped at this many after the Stage-1 prefilter.
pub const MAX_CANDIDATES: usize = 50;
/// Result cache entry lifetime.
pub const CACHE_TTL: std::time::Duration = std::time::Duration::from_secs(3 * 60);
/// `final_score` at or above this is flagged `recommended`.
pub const RECOMMENDED_THRESHOLD: f64 = 0.8;

/// The four sub-score weights, which must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightSet {
    /// Weight for `route_match`.
    pub route_match: f64,
    /// Weight for `time_match`.
    pub time_match: f64,
    /// Weight for `rating`.
    pub rating: f64,
    /// Weight for `price`.
    pub price: f64,
}

impl WeightSet {
    /// Spec §4.I default weights: 0.4 / 0.3 / 0.2 / 0.1.
    pub const DEFAULT: Self = Self {
        route_match: 0.4,
        time_match: 0.3,
        rating: 0.2,
        price: 0.1,
    };

    /// True if the four weights sum to 1.0 within floating-point tolerance.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        (self.route_match + self.time_match + self.rating + self.price - 1.0).abs() < 1e-9
    }
}

impl Default for WeightSet {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A point on the WGS84 ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude, degrees.
    pub lat: f64,
    /// Longitude, degrees.
    pub lon: f64,
}

/// A `findMatches` request (spec §4.I input).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchQuery {
    /// Rider making the request.
    pub rider_id: routefare_domain::RiderId,
    /// Pickup point.
    pub origin: GeoPoint,
    /// Drop-off point.
    pub destination: GeoPoint,
    /// Desired departure time.
    pub desired_time: DateTime<Utc>,
    /// Optional ceiling on price per seat.
    pub max_price: Option<Decimal>,
    /// Minimum seats that must be available.
    pub min_seats: u32,
    /// Prefilter search radius, kilometers.
    pub radius_km: f64,
}

impl MatchQuery {
    /// A key identifying this query for caching purposes, normalized to
    /// avoid near-duplicate cache entries (spec §4.I "normalized tuple").
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!(
            "{}:{:.4}:{:.4}:{:.4}:{:.4}:{}:{}:{:.2}:{}",
            self.rider_id,
            self.origin.lat,
            self.origin.lon,
            self.destination.lat,
            self.destination.lon,
            self.desired_time.timestamp() / 60,
            self.min_seats,
            self.radius_km,
            self.max_price.map(|p| p.to_string()).unwrap_or_default(),
        )
    }
}

/// One route surviving the Stage-1 geospatial prefilter (spec §4.I).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteCandidate {
    /// Route id.
    pub route_id: RouteId,
    /// Driver currently assigned.
    pub driver_id: DriverId,
    /// Stop index (order along the route) nearest the requested origin,
    /// `None` if no stop is within the radius.
    pub origin_stop: Option<(StopId, usize)>,
    /// Stop index nearest the requested destination.
    pub destination_stop: Option<(StopId, usize)>,
    /// Scheduled departure for the requested date.
    pub departure_at: DateTime<Utc>,
    /// Price per seat.
    pub price_per_seat: Decimal,
    /// Driver's average rating, `None` if they have no ratings yet.
    pub driver_rating: Option<f64>,
    /// Seats currently available.
    pub seats_available: u32,
}

/// The four sub-scores and the weighted final score for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Coverage of the requested origin/destination pair, in order.
    pub route_match: f64,
    /// Closeness of departure to the desired time.
    pub time_match: f64,
    /// Driver rating, normalized to [0, 1].
    pub rating: f64,
    /// Relative cheapness within the candidate set.
    pub price: f64,
    /// Weighted sum of the four sub-scores.
    pub final_score: f64,
}

/// A scored, explained match, ready to return to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    /// The underlying candidate.
    pub candidate: RouteCandidate,
    /// Sub-scores and final weighted score.
    pub score: ScoreBreakdown,
    /// Human-readable explanation (spec §4.I Stage 3).
    pub explanation: String,
    /// True when `score.final_score >= RECOMMENDED_THRESHOLD`.
    pub recommended: bool,
}
