//! Ticketing Core (spec §4.J): ECDSA-signed tickets, Merkle batching,
//! blockchain anchoring, and proof-based verification.
//!
//! No direct teacher analogue in `examples/ticketing` — ticket issuance
//! and batch/anchor bookkeeping are one-shot worker operations, not a
//! replayable saga, so this crate follows `routefare-booking`'s
//! `SeatAvailability` precedent (plain async structs and functions over
//! injected traits) rather than the `Reducer` pattern used by the booking
//! and payment cores.

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod anchor;
pub mod batcher;
pub mod canonical;
pub mod merkle;
pub mod metrics;
pub mod signing;
pub mod ticketing;
pub mod types;

pub use anchor::{AnchorError, AnchorSubmitter, FakeAnchorSubmitter, HttpAnchorSubmitter};
pub use batcher::{anchor_batch, poll_confirmations, BatcherError, MerkleBatcher};
pub use canonical::{canonicalize, hash_canonical_body};
pub use merkle::{verify_proof, MerkleTree};
pub use signing::{verify_signature, SigningError, TicketSigner};
pub use ticketing::{issue_ticket, verify_ticket, IssueTicketError, TicketStore, VerificationLogSink};
pub use types::{
    BatchStatus, MerkleBatch, MerkleProof, Ticket, TicketBody, TicketStatus, VerificationContext,
    VerificationLogEntry, VerificationMethod, VerificationResult, BATCH_MAX_SIZE, REQUIRED_CONFIRMATIONS,
};
