//! Declarative state-machine harness shared by the booking and payment
//! cores.
//!
//! This is a pure decision function, not an I/O-performing service: callers
//! (reducers) decide whether a transition is legal and, on success, are
//! responsible for emitting both the domain event and an
//! [`AuditEntry`](crate::audit::AuditEntry) in the same effect batch.
//! Matches the "Functional Core, Imperative Shell" split used throughout
//! `routefare-core`/`routefare-runtime`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An entity whose states and legal transitions are known statically.
pub trait StateMachine: Copy + Eq + std::fmt::Debug {
    /// Returns true if `self -> next` is a legal transition.
    fn can_transition_to(self, next: Self) -> bool;

    /// Returns true if no further transition is possible from this state.
    fn is_terminal(self) -> bool;
}

/// Raised when a caller attempts a transition not present in the entity's
/// transition table.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[error("illegal transition from {from:?} to {to:?}")]
pub struct InvalidTransition<S: std::fmt::Debug> {
    /// The state the entity was in.
    pub from: S,
    /// The state the caller attempted to move to.
    pub to: S,
}

/// Assert that `from -> to` is legal for `S`, per
/// [`StateMachine::can_transition_to`].
///
/// # Errors
///
/// Returns [`InvalidTransition`] if the move is not present in `S`'s
/// transition table.
pub fn transition_to<S: StateMachine>(from: S, to: S) -> Result<(), InvalidTransition<S>> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(InvalidTransition { from, to })
    }
}

/// The ten booking lifecycle states (spec §4.C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    /// Created but seats not yet held.
    Pending,
    /// Seats held, awaiting payment.
    Held,
    /// Checkout initiated with the payment gateway.
    PaymentInitiated,
    /// Gateway confirmed payment.
    Paid,
    /// Booking fully confirmed; holds released.
    Confirmed,
    /// Rider checked in for travel.
    CheckedIn,
    /// Trip completed.
    Completed,
    /// Cancelled by rider or admin.
    Cancelled,
    /// Hold expired before payment.
    Expired,
    /// Terminal failure (e.g. seat hold failed).
    Failed,
}

impl StateMachine for BookingStatus {
    /// `Held`/`PaymentInitiated` may jump straight to `Confirmed`: in
    /// practice `confirmBooking` collapses the `PAID` step into the same
    /// call that reaches `CONFIRMED`, so `PAID` is never independently
    /// observed from either of those two states (see SPEC_FULL §9.1).
    /// `Pending`/`Paid` gained a direct `Cancelled` arm so `cancelBooking`'s
    /// "reject if not cancellable" check can be this table, not a separate
    /// hand-maintained list of states.
    fn can_transition_to(self, next: Self) -> bool {
        use BookingStatus::{
            Cancelled, CheckedIn, Completed, Confirmed, Expired, Failed, Held, Paid,
            PaymentInitiated, Pending,
        };
        matches!(
            (self, next),
            (Pending, Held | Expired | Failed | Cancelled)
                | (Held, PaymentInitiated | Expired | Cancelled | Confirmed)
                | (PaymentInitiated, Paid | Failed | Cancelled | Confirmed)
                | (Paid, Confirmed | Failed | Cancelled)
                | (Confirmed, CheckedIn | Cancelled)
                | (CheckedIn, Completed | Cancelled)
        )
    }

    fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Cancelled | Self::Expired | Self::Failed
        )
    }
}

impl BookingStatus {
    /// Whether `cancelBooking` may still run from this state — just the
    /// transition table's own `Cancelled` arm, not a separately maintained
    /// list (spec §4.G `cancelBooking`: "reject if not cancellable").
    #[must_use]
    pub fn is_cancellable(self) -> bool {
        self.can_transition_to(Self::Cancelled)
    }

    /// `expires-at` is non-null iff the booking is in one of these states.
    #[must_use]
    pub const fn has_expiry(self) -> bool {
        matches!(self, Self::Pending | Self::Held | Self::PaymentInitiated)
    }
}

/// The six payment lifecycle states (spec §4.C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Payment record created, gateway charge not yet confirmed.
    Initiated,
    /// Gateway checkout in progress.
    Pending,
    /// Gateway confirmed success.
    Success,
    /// Gateway reported failure, or local expiry.
    Failed,
    /// Refunded in full or in part.
    Refunded,
    /// Settlement fully closed out.
    Completed,
}

impl StateMachine for PaymentStatus {
    fn can_transition_to(self, next: Self) -> bool {
        use PaymentStatus::{Completed, Failed, Initiated, Pending, Refunded, Success};
        matches!(
            (self, next),
            (Initiated, Pending | Failed)
                | (Pending, Success | Failed)
                | (Success, Refunded | Completed)
        )
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Refunded | Self::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_pending_can_become_held() {
        assert!(transition_to(BookingStatus::Pending, BookingStatus::Held).is_ok());
    }

    #[test]
    fn booking_cannot_skip_held() {
        assert!(transition_to(BookingStatus::Pending, BookingStatus::Paid).is_err());
    }

    #[test]
    fn booking_direct_paid_to_confirmed_allowed() {
        assert!(transition_to(BookingStatus::Paid, BookingStatus::Confirmed).is_ok());
    }

    #[test]
    fn booking_terminal_states_have_no_outgoing_transitions() {
        for state in [
            BookingStatus::Completed,
            BookingStatus::Cancelled,
            BookingStatus::Expired,
            BookingStatus::Failed,
        ] {
            assert!(state.is_terminal());
            assert!(!state.can_transition_to(BookingStatus::Held));
        }
    }

    #[test]
    fn payment_illegal_transitions_rejected() {
        assert!(transition_to(PaymentStatus::Failed, PaymentStatus::Success).is_err());
        assert!(transition_to(PaymentStatus::Refunded, PaymentStatus::Success).is_err());
    }

    #[test]
    fn booking_cancellable_up_to_checked_in() {
        assert!(BookingStatus::CheckedIn.is_cancellable());
        assert!(!BookingStatus::Completed.is_cancellable());
        assert!(BookingStatus::Pending.is_cancellable());
        assert!(BookingStatus::Paid.is_cancellable());
    }

    #[test]
    fn booking_confirm_may_skip_the_paid_step() {
        assert!(transition_to(BookingStatus::Held, BookingStatus::Confirmed).is_ok());
        assert!(transition_to(BookingStatus::PaymentInitiated, BookingStatus::Confirmed).is_ok());
    }

    #[test]
    fn booking_expiry_only_while_pending_held_or_payment_initiated() {
        assert!(BookingStatus::Held.has_expiry());
        assert!(!BookingStatus::Confirmed.has_expiry());
    }
}
