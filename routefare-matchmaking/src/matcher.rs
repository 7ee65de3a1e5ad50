//! `findMatches` (spec §4.I): orchestrates the Stage-1 prefilter, Stage-2
//! scoring, and Stage-3 explanation, through the cache.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::cache::MatchCache;
use crate::query::{QueryError, RouteCandidateQuery};
use crate::scoring::{explain, score_candidate};
use crate::types::{MatchQuery, MatchResult, RouteCandidate, WeightSet, MAX_CANDIDATES, RECOMMENDED_THRESHOLD};

/// Errors raised by `find_matches`.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// The weight set passed in doesn't sum to 1.0.
    #[error("weights must sum to 1.0")]
    InvalidWeights,
    /// The Stage-1 prefilter failed.
    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Run the full three-stage matching pipeline for `query`.
///
/// # Errors
///
/// Returns [`MatchError::InvalidWeights`] if `weights` doesn't sum to 1.0,
/// or [`MatchError::Query`] if the Stage-1 prefilter fails.
pub async fn find_matches(
    query: MatchQuery,
    weights: WeightSet,
    candidate_query: Arc<dyn RouteCandidateQuery>,
    cache: Arc<dyn MatchCache>,
) -> Result<Arc<Vec<MatchResult>>, MatchError> {
    if !weights.is_valid() {
        return Err(MatchError::InvalidWeights);
    }

    let cache_key = query.cache_key();
    if let Some(cached) = cache.get(&cache_key).await {
        metrics::counter!("matchmaking_cache_hits_total").increment(1);
        return Ok(cached);
    }
    metrics::counter!("matchmaking_cache_misses_total").increment(1);

    let travel_date = query.desired_time.date_naive();
    let mut candidates = candidate_query
        .prefilter(query.origin, query.destination, query.radius_km, query.min_seats, travel_date)
        .await?;

    if let Some(max_price) = query.max_price {
        candidates.retain(|c| c.price_per_seat <= max_price);
    }

    if candidates.len() > MAX_CANDIDATES {
        tracing::info!(
            total = candidates.len(),
            cap = MAX_CANDIDATES,
            "prefilter returned more candidates than the cap, truncating"
        );
        candidates.truncate(MAX_CANDIDATES);
    }

    let results = Arc::new(rank_candidates(candidates, &query, weights));
    cache.put(cache_key, results.clone()).await;
    Ok(results)
}

fn rank_candidates(candidates: Vec<RouteCandidate>, query: &MatchQuery, weights: WeightSet) -> Vec<MatchResult> {
    let Some(price_min) = candidates.iter().map(|c| c.price_per_seat).min() else {
        return Vec::new();
    };
    let price_max = candidates
        .iter()
        .map(|c| c.price_per_seat)
        .max()
        .unwrap_or(price_min);

    let mut results: Vec<MatchResult> = candidates
        .into_iter()
        .map(|candidate| {
            let score = score_candidate(&candidate, query, weights, price_min, price_max);
            let explanation = explain(&candidate, &score, query.desired_time);
            let recommended = score.final_score >= RECOMMENDED_THRESHOLD;
            MatchResult {
                candidate,
                score,
                explanation,
                recommended,
            }
        })
        .collect();

    results.sort_by(|a, b| tie_break(a, b));
    results
}

fn tie_break(a: &MatchResult, b: &MatchResult) -> Ordering {
    b.score
        .final_score
        .partial_cmp(&a.score.final_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.candidate.price_per_seat.cmp(&b.candidate.price_per_seat))
        .then_with(|| a.candidate.departure_at.cmp(&b.candidate.departure_at))
        .then_with(|| a.candidate.route_id.0.cmp(&b.candidate.route_id.0))
}
