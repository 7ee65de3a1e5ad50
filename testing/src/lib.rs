//! # Routefare Testing
//!
//! Testing utilities and helpers for `routefare-booking` and
//! `routefare-payment`'s reducers and projections.
//!
//! This crate provides:
//! - Mock implementations of Environment traits
//! - Test helpers and builders
//! - Property-based testing utilities
//! - Assertion helpers for reducers and stores
//!
//! ## Example
//!
//! ```ignore
//! use routefare_testing::test_clock;
//! use routefare_runtime::Store;
//!
//! #[tokio::test]
//! async fn test_booking_confirmation_flow() {
//!     let env = test_environment();
//!     let store = Store::new(Booking::default(), BookingReducer, env);
//!
//!     store.send(BookingAction::ConfirmBooking {
//!         booking_id: BookingId::new(),
//!     }).await;
//!
//!     let state = store.state(|s| s.clone()).await;
//!     assert_eq!(state.status, BookingStatus::Confirmed);
//! }
//! ```

use chrono::{DateTime, Utc};
use routefare_core::environment::Clock;

/// In-memory `EventStore` for reducer and aggregate tests.
pub mod event_store;

/// In-memory `ProjectionStore`/`ProjectionCheckpoint` mocks and test harness.
pub mod projection_mocks;

/// Mock implementations of Environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use routefare_testing::mocks::FixedClock;
    /// use routefare_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

// Re-export commonly used items
pub use event_store::InMemoryEventStore;
pub use mocks::{FixedClock, test_clock};
pub use projection_mocks::{InMemoryProjectionCheckpoint, InMemoryProjectionStore, ProjectionTestHarness};
