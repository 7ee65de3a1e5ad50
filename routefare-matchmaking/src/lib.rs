//! Matchmaking Core (spec §4.I): geospatial prefilter, weighted scoring,
//! and a short-lived result cache for `findMatches`.
//!
//! There is no teacher analogue for geospatial search — this crate is
//! grounded in the broader example pack's conventions for the job: `geo`
//! for point/distance math, `sqlx`'s Postgres/PostGIS support for the
//! Stage-1 prefilter (`ST_DWithin`), and `moka` for the per-query result
//! cache. Scoring and explanation (Stages 2-3) are pure functions with no
//! I/O, independently unit-testable.

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod matcher;
pub mod metrics;
pub mod query;
pub mod scoring;
pub mod types;

pub use cache::{MatchCache, MokaMatchCache};
pub use matcher::{find_matches, MatchError};
pub use query::{
    InMemoryRouteCandidateQuery, PostgresRouteCandidateQuery, QueryError, RouteCandidateQuery,
    RouteStopData,
};
pub use scoring::{explain, score_candidate};
pub use types::{
    GeoPoint, MatchQuery, MatchResult, RouteCandidate, ScoreBreakdown, WeightSet,
    DEFAULT_MIN_SEATS, DEFAULT_RADIUS_KM, DEFAULT_RATING, MAX_CANDIDATES, RECOMMENDED_THRESHOLD,
};
