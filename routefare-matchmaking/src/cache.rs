//! The per-query result cache (spec §4.I: "results cache keyed by a
//! normalized tuple with short TTL (<= 3 min)"). `moka` is the only TTL
//! cache anywhere in the workspace, added for this core specifically.

use std::sync::Arc;

use async_trait::async_trait;
use moka::future::Cache;

use crate::types::{MatchResult, CACHE_TTL};

/// The matching result cache, as consumed by the matcher.
#[async_trait]
pub trait MatchCache: Send + Sync {
    /// Look up a cached result set for `cache_key`.
    async fn get(&self, cache_key: &str) -> Option<Arc<Vec<MatchResult>>>;

    /// Store a result set under `cache_key`, expiring after the cache's TTL.
    async fn put(&self, cache_key: String, results: Arc<Vec<MatchResult>>);
}

/// `moka`-backed [`MatchCache`], with a fixed TTL and capacity bound.
pub struct MokaMatchCache {
    inner: Cache<String, Arc<Vec<MatchResult>>>,
}

impl MokaMatchCache {
    /// Build a cache holding up to `max_capacity` entries, each expiring
    /// `CACHE_TTL` after insertion.
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }
}

impl Default for MokaMatchCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl MatchCache for MokaMatchCache {
    async fn get(&self, cache_key: &str) -> Option<Arc<Vec<MatchResult>>> {
        self.inner.get(cache_key).await
    }

    async fn put(&self, cache_key: String, results: Arc<Vec<MatchResult>>) {
        self.inner.insert(cache_key, results).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GeoPoint, RouteCandidate, ScoreBreakdown};
    use routefare_domain::{DriverId, RouteId};

    fn sample_result() -> MatchResult {
        MatchResult {
            candidate: RouteCandidate {
                route_id: RouteId::new(),
                driver_id: DriverId::new(),
                origin_stop: None,
                destination_stop: None,
                departure_at: chrono::Utc::now(),
                price_per_seat: rust_decimal::Decimal::new(1000, 2),
                driver_rating: Some(4.5),
                seats_available: 3,
            },
            score: ScoreBreakdown {
                route_match: 1.0,
                time_match: 1.0,
                rating: 0.9,
                price: 1.0,
                final_score: 0.97,
            },
            explanation: "Exact match; departs on time; rated 4.5/5".to_string(),
            recommended: true,
        }
    }

    #[tokio::test]
    async fn stores_and_retrieves_by_key() {
        let cache = MokaMatchCache::new(100);
        let results = Arc::new(vec![sample_result()]);
        cache.put("key-1".to_string(), results.clone()).await;
        assert!(cache.get("key-1").await.is_some());
    }

    #[tokio::test]
    async fn misses_on_unknown_key() {
        let cache = MokaMatchCache::new(100);
        assert!(cache.get("nonexistent").await.is_none());
    }

    #[test]
    fn geo_point_is_plain_data() {
        let p = GeoPoint { lat: 1.0, lon: 2.0 };
        assert_eq!(p.lat, 1.0);
    }
}
