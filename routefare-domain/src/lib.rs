//! Shared value types and cross-core substrate for the Routefare backend.
//!
//! This crate has no opinions about event sourcing or HTTP — it is the
//! layer every core (`routefare-booking`, `routefare-payment`,
//! `routefare-matchmaking`, `routefare-ticketing`) depends on for:
//!
//! - Strongly-typed ids and monetary amounts ([`ids`], [`money`]).
//! - The distributed lock service, §4.A ([`lock`]).
//! - The idempotency store, §4.B ([`idempotency`]).
//! - The state-machine harness, §4.C ([`state_machine`]).
//! - The append-only audit log, §4.K ([`audit`]).
//! - The cancellation refund policy, §4.G ([`refund`]).

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod audit;
pub mod idempotency;
pub mod ids;
pub mod lock;
pub mod money;
pub mod refund;
pub mod state_machine;

pub use audit::{AuditEntry, AuditLog, AuditQuery};
pub use idempotency::{IdempotencyError, IdempotencyStore, Registration};
pub use ids::{BookingId, DriverId, HubId, MerkleBatchId, PaymentId, RiderId, RouteId, StopId, TicketId};
pub use lock::{DistributedLock, LockError, LockHandle};
pub use refund::{compute_refund, RefundPolicyConfig};
pub use state_machine::{transition_to, BookingStatus, InvalidTransition, PaymentStatus, StateMachine};
