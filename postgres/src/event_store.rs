//! `PostgreSQL` implementation of `routefare_core::event_store::EventStore`.
//!
//! Two tables: `events` (append-only, unique on `(stream_id, version)` to
//! enforce optimistic concurrency at the database level) and `snapshots`
//! (one row per stream, replaced on every save).

use routefare_core::event::SerializedEvent;
use routefare_core::event_store::{EventStore, EventStoreError};
use routefare_core::stream::{StreamId, Version};
use sqlx::{PgPool, Row};
use std::future::Future;
use std::pin::Pin;

/// `PostgreSQL`-backed event store.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Build a store against an already-connected pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` and build a store.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::DatabaseError`] if the connection fails.
    pub async fn connect(database_url: &str) -> Result<Self, EventStoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;
        Ok(Self { pool })
    }

    /// The underlying connection pool, shareable across store handles.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl EventStore for PostgresEventStore {
    fn append_events(
        &self,
        stream_id: StreamId,
        expected_version: Option<Version>,
        events: Vec<SerializedEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<Version, EventStoreError>> + Send + '_>> {
        Box::pin(async move {
            if events.is_empty() {
                return Err(EventStoreError::DatabaseError(
                    "cannot append an empty event list".to_string(),
                ));
            }

            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;

            // -1 stands for "no events yet" — version numbers are 0-based, so an
            // empty stream's last-written version cannot itself be 0.
            let last_written: i64 =
                sqlx::query("SELECT COALESCE(MAX(version), -1) AS v FROM events WHERE stream_id = $1 FOR UPDATE")
                    .bind(stream_id.as_str())
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?
                    .try_get("v")
                    .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;

            if let Some(expected) = expected_version {
                if i64::try_from(expected.value()).unwrap_or(i64::MAX) != last_written {
                    let actual = Version::new(u64::try_from(last_written.max(0)).unwrap_or(0));
                    return Err(EventStoreError::ConcurrencyConflict { stream_id, expected, actual });
                }
            }

            let mut next = last_written;
            for event in events {
                next += 1;
                sqlx::query(
                    "INSERT INTO events (stream_id, version, event_type, event_data, metadata) \
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(stream_id.as_str())
                .bind(next)
                .bind(&event.event_type)
                .bind(&event.data)
                .bind(event.metadata)
                .execute(&mut *tx)
                .await
                .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;
            }

            tx.commit().await.map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;
            Ok(Version::new(u64::try_from(next).unwrap_or(0)))
        })
    }

    fn load_events(
        &self,
        stream_id: StreamId,
        from_version: Option<Version>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SerializedEvent>, EventStoreError>> + Send + '_>> {
        Box::pin(async move {
            let from = from_version.map_or(0, Version::value);
            let rows = sqlx::query(
                "SELECT event_type, event_data, metadata FROM events \
                 WHERE stream_id = $1 AND version >= $2 ORDER BY version ASC",
            )
            .bind(stream_id.as_str())
            .bind(i64::try_from(from).unwrap_or(0))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;

            rows.into_iter()
                .map(|row| {
                    let event_type: String =
                        row.try_get("event_type").map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;
                    let data: Vec<u8> =
                        row.try_get("event_data").map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;
                    let metadata: Option<serde_json::Value> =
                        row.try_get("metadata").map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;
                    Ok(SerializedEvent::new(event_type, data, metadata))
                })
                .collect()
        })
    }

    fn save_snapshot(
        &self,
        stream_id: StreamId,
        version: Version,
        state: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventStoreError>> + Send + '_>> {
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO snapshots (stream_id, version, state_data) VALUES ($1, $2, $3) \
                 ON CONFLICT (stream_id) DO UPDATE SET version = EXCLUDED.version, state_data = EXCLUDED.state_data",
            )
            .bind(stream_id.as_str())
            .bind(i64::try_from(version.value()).unwrap_or(i64::MAX))
            .bind(state)
            .execute(&self.pool)
            .await
            .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;
            Ok(())
        })
    }

    fn load_snapshot(
        &self,
        stream_id: StreamId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<(Version, Vec<u8>)>, EventStoreError>> + Send + '_>> {
        Box::pin(async move {
            let row = sqlx::query("SELECT version, state_data FROM snapshots WHERE stream_id = $1")
                .bind(stream_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;

            let Some(row) = row else { return Ok(None) };
            let version: i64 = row.try_get("version").map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;
            let state: Vec<u8> =
                row.try_get("state_data").map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;
            Ok(Some((Version::new(u64::try_from(version).unwrap_or(0)), state)))
        })
    }
}

// PostgresEventStore has no in-memory mode by design — it is exercised
// against a real database in `tests/integration_tests.rs` via `testcontainers`.
