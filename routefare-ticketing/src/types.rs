//! Ticket, verification, and Merkle-batch value types (spec §4.J).

use chrono::{DateTime, Utc};
use routefare_domain::{BookingId, DriverId, MerkleBatchId, PaymentId, RiderId, TicketId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A batch accumulates up to this many tickets before it's sealed `READY`.
pub const BATCH_MAX_SIZE: usize = 100;
/// Confirmations required before an anchored batch is `CONFIRMED`.
pub const REQUIRED_CONFIRMATIONS: u32 = 12;

/// The fields that go into a ticket's canonical signed body (spec §4.J
/// step 1). Deliberately narrower than [`Ticket`] — status, signature, and
/// batch placement are never part of what gets signed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TicketBody {
    /// Ticket id.
    pub ticket_id: TicketId,
    /// Booking this ticket covers.
    pub booking_id: BookingId,
    /// Riding passenger.
    pub rider_id: RiderId,
    /// Assigned driver.
    pub driver_id: DriverId,
    /// Assigned vehicle.
    pub vehicle_id: String,
    /// Ride type (e.g. `"shared"`, `"private"`).
    pub ride_type: String,
    /// Scheduled departure.
    pub scheduled_time: DateTime<Utc>,
    /// Pickup location description.
    pub pickup: String,
    /// Drop-off location description.
    pub dropoff: String,
    /// Fare charged.
    pub fare: Decimal,
    /// Settling payment.
    pub payment_id: PaymentId,
}

/// A ticket's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    /// Issued and valid.
    Issued,
    /// Revoked by an operator; never valid again.
    Revoked,
}

/// A persisted ticket: its signed body plus issuance/batch bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    /// The signed body.
    pub body: TicketBody,
    /// Lifecycle state.
    pub status: TicketStatus,
    /// Lowercase-hex SHA-256 of the canonical body.
    pub hash: String,
    /// Lowercase-hex ECDSA signature over `hash`.
    pub signature: String,
    /// Batch this ticket was enqueued into.
    pub merkle_batch_id: MerkleBatchId,
    /// This ticket's leaf index within its batch, once the batch is built.
    pub leaf_index: Option<usize>,
    /// When issued.
    pub issued_at: DateTime<Utc>,
    /// When revoked, if it was.
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// True if `scheduled_time` plus a generous grace window has passed.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, grace: chrono::Duration) -> bool {
        now > self.body.scheduled_time + grace
    }
}

/// A Merkle batch's lifecycle state (spec §4.J "Merkle batcher").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    /// Still accumulating tickets.
    Pending,
    /// Full (or flushed); tree built, awaiting anchoring.
    Ready,
    /// Root submitted to the chain; awaiting confirmations.
    Anchored,
    /// `confirmations >= REQUIRED_CONFIRMATIONS`.
    Confirmed,
}

/// A Merkle batch of ticket hashes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MerkleBatch {
    /// Batch id.
    pub id: MerkleBatchId,
    /// Lifecycle state.
    pub status: BatchStatus,
    /// Tickets in this batch, in leaf order.
    pub ticket_ids: Vec<TicketId>,
    /// Merkle root, once built (`READY` or later).
    pub root: Option<String>,
    /// Blockchain transaction hash, once anchored.
    pub anchor_tx_hash: Option<String>,
    /// Confirmations observed so far.
    pub confirmations: u32,
    /// When the batch was opened.
    pub created_at: DateTime<Utc>,
    /// When the batch was anchored.
    pub anchored_at: Option<DateTime<Utc>>,
}

/// The per-leaf Merkle proof path, persisted alongside its ticket (spec
/// §4.J "persist the proof path").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MerkleProof {
    /// The batch this proof is for.
    pub batch_id: MerkleBatchId,
    /// The leaf's index within the batch.
    pub leaf_index: usize,
    /// Sibling hashes from leaf to root, lowercase-hex.
    pub siblings: Vec<String>,
}

/// The outcome of `verifyTicket` (spec §4.J result set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationResult {
    /// Every check passed.
    Valid,
    /// Signature, hash, or Merkle proof check failed.
    Invalid,
    /// The ticket's ride has passed its expiry grace window.
    Expired,
    /// The ticket was revoked.
    Revoked,
    /// No ticket exists for the given id.
    NotFound,
}

/// Which stage of `verifyTicket` produced a result, for the verification
/// log (spec §4.J "method (DATABASE, SIGNATURE, MERKLE_PROOF)").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationMethod {
    /// Existence/status/expiry checks against the stored record.
    Database,
    /// ECDSA signature check.
    Signature,
    /// Merkle inclusion proof check.
    MerkleProof,
}

/// The caller-supplied context a `verifyTicket` call is checked against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationContext {
    /// Who is presenting the ticket to be checked.
    pub verifier_id: String,
    /// The driver the verifier expects this ticket to belong to.
    pub expected_driver_id: Option<DriverId>,
    /// Caller's IP address, for the audit log.
    pub ip_address: String,
    /// Caller's user agent, for the audit log.
    pub user_agent: String,
}

/// One row of the append-only verification log (spec §4.J).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationLogEntry {
    /// The ticket checked, if one was found.
    pub ticket_id: Option<TicketId>,
    /// Which check produced `result`.
    pub method: VerificationMethod,
    /// Who performed the check.
    pub verifier_id: String,
    /// The outcome.
    pub result: VerificationResult,
    /// Caller's IP address.
    pub ip_address: String,
    /// Caller's user agent.
    pub user_agent: String,
    /// Free-text detail (e.g. which check failed and why).
    pub notes: String,
    /// When logged.
    pub logged_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_max_size_matches_spec_default() {
        assert_eq!(BATCH_MAX_SIZE, 100);
    }

    #[test]
    fn required_confirmations_matches_spec_default() {
        assert_eq!(REQUIRED_CONFIRMATIONS, 12);
    }
}
