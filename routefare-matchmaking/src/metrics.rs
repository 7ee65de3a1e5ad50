//! Business metrics for the matchmaking core.

use metrics::describe_counter;

/// Register metric descriptions. Call once at application startup.
pub fn register_business_metrics() {
    describe_counter!("matchmaking_cache_hits_total", "Total findMatches calls served from the result cache");
    describe_counter!("matchmaking_cache_misses_total", "Total findMatches calls that missed the result cache");
}
