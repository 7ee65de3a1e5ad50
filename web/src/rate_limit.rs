//! Per-user request rate limiting.
//!
//! Enforces the platform-wide limit of 100 requests/minute per authenticated
//! user with a burst allowance of 20, using a token bucket refilled at a
//! steady rate. Requests without a recognizable bearer token are limited by
//! client IP instead, so anonymous/public endpoints stay protected too.

use crate::error::AppError;
use axum::{extract::Request, response::{IntoResponse, Response}};
use routefare_auth::JwtVerifier;
use std::{
    collections::HashMap,
    net::IpAddr,
    sync::{Arc, Mutex},
    task::{Context, Poll},
    time::{Duration, Instant},
};
use tower::{Layer, Service};

/// Sustained requests allowed per user per minute.
pub const REQUESTS_PER_MINUTE: u32 = 100;
/// Extra requests allowed above the steady rate in a short burst.
pub const BURST_CAPACITY: u32 = 20;

#[derive(Clone, Copy, Eq, Hash, PartialEq)]
enum BucketKey {
    User(uuid::Uuid),
    Ip(IpAddr),
}

/// Mirrors the `X-Forwarded-For`/`X-Real-IP` priority used by
/// [`crate::extractors::ClientIp`], falling back to a fixed address since no
/// `ConnectInfo` is available this early in the middleware stack.
fn client_ip_from_headers(req: &Request) -> IpAddr {
    let headers = req.headers();

    if let Some(forwarded) = headers.get("X-Forwarded-For").and_then(|v| v.to_str().ok()) {
        if let Some(ip) = forwarded.split(',').next().and_then(|s| s.trim().parse().ok()) {
            return ip;
        }
    }

    if let Some(ip) = headers
        .get("X-Real-IP")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
    {
        return ip;
    }

    IpAddr::from([127, 0, 0, 1])
}

struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u32) -> Self {
        Self {
            tokens: f64::from(capacity),
            last_refill: Instant::now(),
        }
    }

    /// Refill at `REQUESTS_PER_MINUTE` tokens/minute, capped at burst capacity,
    /// then try to spend one token.
    fn try_consume(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        let refill_rate = f64::from(REQUESTS_PER_MINUTE) / 60.0;
        let max_tokens = f64::from(REQUESTS_PER_MINUTE + BURST_CAPACITY);
        self.tokens = (self.tokens + elapsed * refill_rate).min(max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Shared token-bucket state for the rate limiter, cheap to clone and share
/// across the `Router`.
#[derive(Clone)]
pub struct RateLimiterState {
    verifier: Option<Arc<JwtVerifier>>,
    buckets: Arc<Mutex<HashMap<BucketKey, TokenBucket>>>,
}

impl RateLimiterState {
    /// Build limiter state that identifies callers by bearer-token subject
    /// when present, falling back to client IP for unauthenticated requests.
    #[must_use]
    pub fn new(verifier: Arc<JwtVerifier>) -> Self {
        Self {
            verifier: Some(verifier),
            buckets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Build limiter state that always keys on client IP, for surfaces with
    /// no bearer-token identity (e.g. public health checks behind a gateway).
    #[must_use]
    pub fn ip_only() -> Self {
        Self {
            verifier: None,
            buckets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn key_for(&self, req: &Request) -> BucketKey {
        let token = req
            .headers()
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|h| JwtVerifier::extract_bearer(Some(h)).ok());

        if let (Some(verifier), Some(token)) = (&self.verifier, token) {
            if let Ok(claims) = verifier.verify(token) {
                return BucketKey::User(claims.sub);
            }
        }

        BucketKey::Ip(client_ip_from_headers(req))
    }

    fn check(&self, key: BucketKey) -> bool {
        let mut buckets = self.buckets.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        buckets
            .entry(key)
            .or_insert_with(|| TokenBucket::new(REQUESTS_PER_MINUTE + BURST_CAPACITY))
            .try_consume()
    }

    /// Drop buckets that haven't been touched recently, to bound memory use.
    pub fn sweep_idle(&self, idle_for: Duration) {
        let mut buckets = self.buckets.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();
        buckets.retain(|_, bucket| now.duration_since(bucket.last_refill) < idle_for);
    }
}

/// Tower layer enforcing [`RateLimiterState`]'s per-key token buckets.
#[derive(Clone)]
pub struct RateLimitLayer {
    state: RateLimiterState,
}

impl RateLimitLayer {
    /// Wrap `state` in a layer installable on an Axum `Router`.
    #[must_use]
    pub fn new(state: RateLimiterState) -> Self {
        Self { state }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitMiddleware {
            inner,
            state: self.state.clone(),
        }
    }
}

/// Middleware service enforcing rate limits ahead of the wrapped service.
#[derive(Clone)]
pub struct RateLimitMiddleware<S> {
    inner: S,
    state: RateLimiterState,
}

impl<S> Service<Request> for RateLimitMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let key = self.state.key_for(&req);
        let allowed = self.state.check(key);

        if allowed {
            let fut = self.inner.call(req);
            Box::pin(fut)
        } else {
            tracing::warn!("rate limit exceeded");
            Box::pin(async move {
                Ok(AppError::rate_limited("rate limit exceeded: 100 requests/minute per user")
                    .into_response())
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn steady_rate_allows_requests_per_minute() {
        let mut bucket = TokenBucket::new(REQUESTS_PER_MINUTE + BURST_CAPACITY);
        let mut allowed = 0;
        for _ in 0..(REQUESTS_PER_MINUTE + BURST_CAPACITY) {
            if bucket.try_consume() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, REQUESTS_PER_MINUTE + BURST_CAPACITY);
        assert!(!bucket.try_consume());
    }

    #[test]
    fn bucket_refills_over_time() {
        let mut bucket = TokenBucket::new(1);
        assert!(bucket.try_consume());
        assert!(!bucket.try_consume());
        bucket.last_refill = Instant::now() - Duration::from_secs(60);
        assert!(bucket.try_consume());
    }

    #[test]
    fn distinct_keys_have_independent_budgets() {
        let state = RateLimiterState::ip_only();
        let a = BucketKey::Ip(IpAddr::from([127, 0, 0, 1]));
        let b = BucketKey::Ip(IpAddr::from([127, 0, 0, 2]));
        for _ in 0..(REQUESTS_PER_MINUTE + BURST_CAPACITY) {
            assert!(state.check(a));
        }
        assert!(!state.check(a));
        assert!(state.check(b));
    }
}
