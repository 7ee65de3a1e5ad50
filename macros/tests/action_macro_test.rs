//! Tests for #[derive(Action)] macro

use routefare_macros::Action;
use chrono::{DateTime, Utc};

#[derive(Action, Clone, Debug, PartialEq)]
enum BookingAction {
    #[command]
    CreateBooking {
        flight_id: String,
    },

    #[command]
    CancelBooking,

    #[command]
    UpdatePassengerName {
        new_name: String,
    },

    #[event]
    BookingCreated {
        booking_id: String,
        flight_id: String,
        timestamp: DateTime<Utc>,
    },

    #[event]
    BookingCancelled {
        refunded: bool,
        timestamp: DateTime<Utc>,
    },

    #[event]
    PassengerNameUpdated {
        new_name: String,
        timestamp: DateTime<Utc>,
    },
}

#[test]
fn test_is_command() {
    let action = BookingAction::CreateBooking {
        flight_id: "FL-100".to_string(),
    };
    assert!(action.is_command());
    assert!(!action.is_event());
}

#[test]
fn test_is_event() {
    let action = BookingAction::BookingCreated {
        booking_id: "booking-1".to_string(),
        flight_id: "FL-100".to_string(),
        timestamp: Utc::now(),
    };
    assert!(!action.is_command());
    assert!(action.is_event());
}

#[test]
fn test_event_type() {
    let action = BookingAction::BookingCreated {
        booking_id: "booking-1".to_string(),
        flight_id: "FL-100".to_string(),
        timestamp: Utc::now(),
    };
    assert_eq!(action.event_type(), "BookingCreated.v1");
}

#[test]
fn test_command_event_type() {
    let action = BookingAction::CreateBooking {
        flight_id: "FL-100".to_string(),
    };
    // Commands don't have event types
    assert_eq!(action.event_type(), "unknown");
}

#[test]
fn test_cancel_command() {
    let action = BookingAction::CancelBooking;
    assert!(action.is_command());
    assert!(!action.is_event());
}

#[test]
fn test_all_commands_identified() {
    let commands = vec![
        BookingAction::CreateBooking {
            flight_id: "FL-100".to_string(),
        },
        BookingAction::CancelBooking,
        BookingAction::UpdatePassengerName {
            new_name: "Jane Doe".to_string(),
        },
    ];

    for cmd in commands {
        assert!(cmd.is_command(), "Expected command: {cmd:?}");
        assert!(!cmd.is_event(), "Should not be event: {cmd:?}");
    }
}

#[test]
fn test_all_events_identified() {
    let events = vec![
        BookingAction::BookingCreated {
            booking_id: "1".to_string(),
            flight_id: "FL-100".to_string(),
            timestamp: Utc::now(),
        },
        BookingAction::BookingCancelled {
            refunded: true,
            timestamp: Utc::now(),
        },
        BookingAction::PassengerNameUpdated {
            new_name: "Jane Doe".to_string(),
            timestamp: Utc::now(),
        },
    ];

    for event in events {
        assert!(!event.is_command(), "Should not be command: {event:?}");
        assert!(event.is_event(), "Expected event: {event:?}");
    }
}

#[test]
fn test_event_types_unique() {
    let events = vec![
        (
            BookingAction::BookingCreated {
                booking_id: "1".to_string(),
                flight_id: "FL-100".to_string(),
                timestamp: Utc::now(),
            },
            "BookingCreated.v1",
        ),
        (
            BookingAction::BookingCancelled {
                refunded: true,
                timestamp: Utc::now(),
            },
            "BookingCancelled.v1",
        ),
        (
            BookingAction::PassengerNameUpdated {
                new_name: "Jane Doe".to_string(),
                timestamp: Utc::now(),
            },
            "PassengerNameUpdated.v1",
        ),
    ];

    for (event, expected_type) in events {
        assert_eq!(event.event_type(), expected_type);
    }
}
