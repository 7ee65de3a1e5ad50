//! Strongly-typed identifiers shared across the booking, payment,
//! matchmaking and ticketing cores.
//!
//! Each id wraps a [`Uuid`] so that, for example, a `BookingId` can never be
//! passed where a `PaymentId` is expected, while still round-tripping
//! through JSON and Postgres `uuid` columns unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// The underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_id!(RiderId, "A rider's account id.");
uuid_id!(DriverId, "A driver's account id.");
uuid_id!(RouteId, "A route id, as known to matchmaking and booking.");
uuid_id!(StopId, "A stop id along a route.");
uuid_id!(HubId, "A hub (terminal/station) id.");
uuid_id!(BookingId, "A booking id.");
uuid_id!(PaymentId, "A payment id.");
uuid_id!(TicketId, "A ticket id.");
uuid_id!(MerkleBatchId, "A Merkle batch id.");

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_from_str() {
        let id = BookingId::new();
        let parsed: BookingId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn distinct_id_types_do_not_compare_structurally_equal_by_accident() {
        let uuid = Uuid::new_v4();
        let booking_id = BookingId::from(uuid);
        let payment_id = PaymentId::from(uuid);
        assert_eq!(booking_id.as_uuid(), payment_id.as_uuid());
    }
}
