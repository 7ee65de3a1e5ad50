//! In-memory [`EventStore`] for fast, deterministic tests.
//!
//! Mirrors `routefare-postgres`'s `PostgresEventStore` version semantics
//! exactly (0-based per-stream version numbering, empty stream treated as
//! "one before the first event") so reducer tests behave identically
//! whether run against this store or a real database.

use routefare_core::event::SerializedEvent;
use routefare_core::event_store::{EventStore, EventStoreError};
use routefare_core::stream::{StreamId, Version};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

#[derive(Default)]
struct Streams {
    events: HashMap<String, Vec<SerializedEvent>>,
    snapshots: HashMap<String, (Version, Vec<u8>)>,
}

/// `HashMap`-backed [`EventStore`] for unit and reducer tests.
#[derive(Default)]
pub struct InMemoryEventStore {
    streams: Mutex<Streams>,
}

impl InMemoryEventStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for InMemoryEventStore {
    fn append_events(
        &self,
        stream_id: StreamId,
        expected_version: Option<Version>,
        events: Vec<SerializedEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<Version, EventStoreError>> + Send + '_>> {
        Box::pin(async move {
            if events.is_empty() {
                return Err(EventStoreError::DatabaseError("cannot append an empty event list".to_string()));
            }

            let mut streams = self.streams.lock().map_err(|_| EventStoreError::DatabaseError("lock poisoned".to_string()))?;
            let stored = streams.events.entry(stream_id.as_str().to_string()).or_default();
            let last_written: i64 = stored.len() as i64 - 1;

            if let Some(expected) = expected_version {
                if i64::try_from(expected.value()).unwrap_or(i64::MAX) != last_written {
                    let actual = Version::new(u64::try_from(last_written.max(0)).unwrap_or(0));
                    return Err(EventStoreError::ConcurrencyConflict { stream_id, expected, actual });
                }
            }

            let next = last_written + events.len() as i64;
            stored.extend(events);
            Ok(Version::new(u64::try_from(next).unwrap_or(0)))
        })
    }

    fn load_events(
        &self,
        stream_id: StreamId,
        from_version: Option<Version>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SerializedEvent>, EventStoreError>> + Send + '_>> {
        Box::pin(async move {
            let streams = self.streams.lock().map_err(|_| EventStoreError::DatabaseError("lock poisoned".to_string()))?;
            let from = from_version.map_or(0, Version::value) as usize;
            let events = streams
                .events
                .get(stream_id.as_str())
                .map(|events| events.iter().skip(from).cloned().collect())
                .unwrap_or_default();
            Ok(events)
        })
    }

    fn save_snapshot(
        &self,
        stream_id: StreamId,
        version: Version,
        state: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventStoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut streams = self.streams.lock().map_err(|_| EventStoreError::DatabaseError("lock poisoned".to_string()))?;
            streams.snapshots.insert(stream_id.as_str().to_string(), (version, state));
            Ok(())
        })
    }

    fn load_snapshot(
        &self,
        stream_id: StreamId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<(Version, Vec<u8>)>, EventStoreError>> + Send + '_>> {
        Box::pin(async move {
            let streams = self.streams.lock().map_err(|_| EventStoreError::DatabaseError("lock poisoned".to_string()))?;
            Ok(streams.snapshots.get(stream_id.as_str()).cloned())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(event_type: &str, data: &[u8]) -> SerializedEvent {
        SerializedEvent::new(event_type.to_string(), data.to_vec(), None)
    }

    #[tokio::test]
    async fn append_then_load_round_trips() {
        let store = InMemoryEventStore::new();
        let stream_id = StreamId::new("order-1");
        let version = store
            .append_events(stream_id.clone(), None, vec![event("Placed", b"a"), event("Shipped", b"b")])
            .await
            .unwrap();
        assert_eq!(version, Version::new(1));

        let events = store.load_events(stream_id, None).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "Placed");
        assert_eq!(events[1].event_type, "Shipped");
    }

    #[tokio::test]
    async fn wrong_expected_version_is_a_conflict() {
        let store = InMemoryEventStore::new();
        let stream_id = StreamId::new("order-2");
        store.append_events(stream_id.clone(), None, vec![event("Placed", b"a")]).await.unwrap();

        let result = store.append_events(stream_id, Some(Version::new(9)), vec![event("Shipped", b"b")]).await;
        assert!(matches!(result, Err(EventStoreError::ConcurrencyConflict { .. })));
    }

    #[tokio::test]
    async fn empty_events_list_is_rejected() {
        let store = InMemoryEventStore::new();
        let result = store.append_events(StreamId::new("order-3"), None, vec![]).await;
        assert!(matches!(result, Err(EventStoreError::DatabaseError(_))));
    }

    #[tokio::test]
    async fn load_from_version_skips_earlier_events() {
        let store = InMemoryEventStore::new();
        let stream_id = StreamId::new("order-4");
        store
            .append_events(stream_id.clone(), None, vec![event("A", b"1"), event("B", b"2"), event("C", b"3")])
            .await
            .unwrap();

        let tail = store.load_events(stream_id, Some(Version::new(1))).await.unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].event_type, "B");
    }

    #[tokio::test]
    async fn snapshot_round_trips() {
        let store = InMemoryEventStore::new();
        let stream_id = StreamId::new("order-5");
        store.save_snapshot(stream_id.clone(), Version::new(3), b"state".to_vec()).await.unwrap();

        let loaded = store.load_snapshot(stream_id).await.unwrap().unwrap();
        assert_eq!(loaded.0, Version::new(3));
        assert_eq!(loaded.1, b"state");
    }
}
