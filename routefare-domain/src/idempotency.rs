//! Idempotency store (spec §4.B).
//!
//! `register_or_get` is an atomic first-writer-wins key registration: the
//! first caller to register a key stores its value and gets `first = true`;
//! every subsequent caller with the same key gets the first caller's stored
//! value back, `first = false`.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use thiserror::Error;

/// TTL for a payment-initiation idempotency key.
pub const PAYMENT_REQUEST_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// TTL for a gateway webhook idempotency key.
pub const WEBHOOK_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Errors raised by an idempotency store backend.
#[derive(Debug, Error)]
pub enum IdempotencyError {
    /// The stored value could not be deserialized back into `T`.
    #[error("stored idempotency value is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
    /// The backend is unreachable or returned an error.
    #[error("idempotency backend error: {0}")]
    Backend(String),
}

/// Outcome of [`IdempotencyStore::register_or_get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration<T> {
    /// The value now associated with the key — either the caller's `value`
    /// (if `first`) or whatever the original caller stored.
    pub stored: T,
    /// True if this call was the one that created the entry.
    pub first: bool,
}

/// First-writer-wins key registration with TTL.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Atomically register `value` under `key` if absent, or return the
    /// existing value if `key` was already registered.
    ///
    /// # Errors
    ///
    /// Returns [`IdempotencyError`] on backend failure or if an existing
    /// value can't be deserialized as `T`.
    async fn register_or_get<T>(
        &self,
        key: &str,
        value: T,
        ttl: Duration,
    ) -> Result<Registration<T>, IdempotencyError>
    where
        T: Serialize + DeserializeOwned + Send + Sync;

    /// Remove a key. Test-only per spec §4.B ("clearing is for tests
    /// only").
    ///
    /// # Errors
    ///
    /// Returns [`IdempotencyError`] on backend failure.
    async fn clear(&self, key: &str) -> Result<(), IdempotencyError>;
}

/// Redis-backed [`IdempotencyStore`] using `SET NX EX` plus a `GET` on
/// conflict.
#[derive(Clone)]
pub struct RedisIdempotencyStore {
    client: redis::Client,
}

impl RedisIdempotencyStore {
    /// Build a store against the given Redis connection URL.
    ///
    /// # Errors
    ///
    /// Returns [`IdempotencyError::Backend`] if the URL cannot be parsed.
    pub fn new(redis_url: &str) -> Result<Self, IdempotencyError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| IdempotencyError::Backend(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl IdempotencyStore for RedisIdempotencyStore {
    async fn register_or_get<T>(
        &self,
        key: &str,
        value: T,
        ttl: Duration,
    ) -> Result<Registration<T>, IdempotencyError>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
    {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| IdempotencyError::Backend(e.to_string()))?;

        let payload = serde_json::to_string(&value)?;

        let set: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(&payload)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async(&mut conn)
            .await
            .map_err(|e| IdempotencyError::Backend(e.to_string()))?;

        if set.is_some() {
            return Ok(Registration {
                stored: value,
                first: true,
            });
        }

        let existing: String = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| IdempotencyError::Backend(e.to_string()))?;

        Ok(Registration {
            stored: serde_json::from_str(&existing)?,
            first: false,
        })
    }

    async fn clear(&self, key: &str) -> Result<(), IdempotencyError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| IdempotencyError::Backend(e.to_string()))?;
        let _: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| IdempotencyError::Backend(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_regimes_match_spec() {
        assert_eq!(PAYMENT_REQUEST_TTL, Duration::from_secs(86_400));
        assert_eq!(WEBHOOK_TTL, Duration::from_secs(604_800));
    }
}
