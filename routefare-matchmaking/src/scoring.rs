//! Stage 2 (scoring) and Stage 3 (explanation) of `findMatches` (spec
//! §4.I). Pure functions, no I/O — unit-tested directly against the
//! specification's worked examples.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;

use crate::types::{MatchQuery, RouteCandidate, ScoreBreakdown, WeightSet, TIME_WINDOW};

/// Score one candidate against `query`, given the min/max price across the
/// whole candidate set (`price` is relative, spec §4.I Stage 2).
#[must_use]
pub fn score_candidate(
    candidate: &RouteCandidate,
    query: &MatchQuery,
    weights: WeightSet,
    price_min: rust_decimal::Decimal,
    price_max: rust_decimal::Decimal,
) -> ScoreBreakdown {
    let route_match = route_match_score(candidate);
    let time_match = time_match_score(candidate.departure_at, query.desired_time);
    let rating = rating_score(candidate.driver_rating);
    let price = price_score(candidate.price_per_seat, price_min, price_max);

    let final_score = weights.route_match * route_match
        + weights.time_match * time_match
        + weights.rating * rating
        + weights.price * price;

    ScoreBreakdown {
        route_match,
        time_match,
        rating,
        price,
        final_score,
    }
}

fn route_match_score(candidate: &RouteCandidate) -> f64 {
    match (&candidate.origin_stop, &candidate.destination_stop) {
        (Some((_, origin_index)), Some((_, destination_index))) if origin_index < destination_index => 1.0,
        (Some(_), None) | (None, Some(_)) => 0.5,
        _ => 0.0,
    }
}

fn time_match_score(departure_at: DateTime<Utc>, desired_time: DateTime<Utc>) -> f64 {
    let diff = (departure_at - desired_time).abs();
    let window = TIME_WINDOW;

    if diff <= window {
        1.0
    } else if diff <= window * 2 {
        let window_secs = window.num_seconds() as f64;
        let over_secs = (diff - window).num_seconds() as f64;
        (1.0 - over_secs / window_secs).max(0.0)
    } else {
        0.0
    }
}

fn rating_score(driver_rating: Option<f64>) -> f64 {
    (driver_rating.unwrap_or(crate::types::DEFAULT_RATING) / 5.0).clamp(0.0, 1.0)
}

fn price_score(
    candidate_price: rust_decimal::Decimal,
    price_min: rust_decimal::Decimal,
    price_max: rust_decimal::Decimal,
) -> f64 {
    if price_max == price_min {
        return 1.0;
    }
    let (max, min, candidate) = (
        price_max.to_f64().unwrap_or(0.0),
        price_min.to_f64().unwrap_or(0.0),
        candidate_price.to_f64().unwrap_or(0.0),
    );
    ((max - candidate) / (max - min)).clamp(0.0, 1.0)
}

/// Compose the Stage-3 human-readable explanation from a sub-score
/// breakdown (spec §4.I: "Exact match; departs in 5 min; rated 4.8/5").
#[must_use]
pub fn explain(
    candidate: &RouteCandidate,
    score: &ScoreBreakdown,
    desired_time: DateTime<Utc>,
) -> String {
    let route_phrase = if score.route_match >= 1.0 {
        "Exact match"
    } else if score.route_match > 0.0 {
        "Partial route match"
    } else {
        "No direct route match"
    };

    let minutes_off = (candidate.departure_at - desired_time).num_minutes();
    let time_phrase = if minutes_off == 0 {
        "departs on time".to_string()
    } else if minutes_off > 0 {
        format!("departs in {minutes_off} min")
    } else {
        format!("departed {} min ago", -minutes_off)
    };

    let rating = candidate.driver_rating.unwrap_or(crate::types::DEFAULT_RATING);

    format!("{route_phrase}; {time_phrase}; rated {rating:.1}/5")
}

#[cfg(test)]
mod tests {
    use super::*;
    use routefare_domain::{DriverId, RiderId, RouteId, StopId};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn base_query() -> MatchQuery {
        MatchQuery {
            rider_id: RiderId::new(),
            origin: crate::types::GeoPoint { lat: 0.0, lon: 0.0 },
            destination: crate::types::GeoPoint { lat: 1.0, lon: 1.0 },
            desired_time: Utc::now(),
            max_price: None,
            min_seats: 1,
            radius_km: 5.0,
        }
    }

    fn base_candidate(departure_at: DateTime<Utc>, price: Decimal) -> RouteCandidate {
        RouteCandidate {
            route_id: RouteId::new(),
            driver_id: DriverId::new(),
            origin_stop: Some((StopId::new(), 0)),
            destination_stop: Some((StopId::new(), 3)),
            departure_at,
            price_per_seat: price,
            driver_rating: Some(4.8),
            seats_available: 4,
        }
    }

    #[test]
    fn exact_route_coverage_in_order_scores_one() {
        let candidate = base_candidate(Utc::now(), dec!(10.00));
        assert_eq!(route_match_score(&candidate), 1.0);
    }

    #[test]
    fn out_of_order_stops_score_zero() {
        let mut candidate = base_candidate(Utc::now(), dec!(10.00));
        candidate.origin_stop = Some((StopId::new(), 5));
        candidate.destination_stop = Some((StopId::new(), 2));
        assert_eq!(route_match_score(&candidate), 0.0);
    }

    #[test]
    fn only_one_endpoint_covered_scores_partial() {
        let mut candidate = base_candidate(Utc::now(), dec!(10.00));
        candidate.destination_stop = None;
        assert_eq!(route_match_score(&candidate), 0.5);
    }

    #[test]
    fn time_match_is_full_within_window() {
        let desired = Utc::now();
        let departure = desired + chrono::Duration::minutes(10);
        assert_eq!(time_match_score(departure, desired), 1.0);
    }

    #[test]
    fn time_match_decays_linearly_between_one_and_two_windows() {
        let desired = Utc::now();
        let departure = desired + chrono::Duration::minutes(22);
        let score = time_match_score(departure, desired);
        assert!(score > 0.0 && score < 1.0);
    }

    #[test]
    fn time_match_is_zero_beyond_two_windows() {
        let desired = Utc::now();
        let departure = desired + chrono::Duration::minutes(45);
        assert_eq!(time_match_score(departure, desired), 0.0);
    }

    #[test]
    fn rating_score_defaults_when_driver_has_no_ratings() {
        assert_eq!(rating_score(None), crate::types::DEFAULT_RATING / 5.0);
    }

    #[test]
    fn price_score_is_one_when_all_candidates_equal() {
        assert_eq!(price_score(dec!(10.00), dec!(10.00), dec!(10.00)), 1.0);
    }

    #[test]
    fn price_score_favors_cheaper_candidates() {
        let cheap = price_score(dec!(5.00), dec!(5.00), dec!(15.00));
        let expensive = price_score(dec!(15.00), dec!(5.00), dec!(15.00));
        assert_eq!(cheap, 1.0);
        assert_eq!(expensive, 0.0);
    }

    #[test]
    fn final_score_is_weighted_sum_of_subscores() {
        let query = base_query();
        let candidate = base_candidate(query.desired_time, dec!(10.00));
        let score = score_candidate(&candidate, &query, WeightSet::DEFAULT, dec!(10.00), dec!(10.00));
        assert!((score.final_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn default_weights_sum_to_one() {
        assert!(WeightSet::DEFAULT.is_valid());
    }
}
