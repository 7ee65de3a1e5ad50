//! Ticket issuance and verification orchestration (spec §4.J
//! `issueTicket`/`verifyTicket`).

use crate::batcher::{BatcherError, MerkleBatcher};
use crate::canonical::{canonicalize, hash_canonical_body};
use crate::merkle::verify_proof;
use crate::signing::{verify_signature, SigningError, TicketSigner};
use crate::types::{
    MerkleBatch, MerkleProof, Ticket, TicketBody, TicketStatus, VerificationContext, VerificationLogEntry,
    VerificationMethod, VerificationResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use k256::ecdsa::VerifyingKey;
use routefare_domain::{MerkleBatchId, TicketId};
use thiserror::Error;

/// Errors raised issuing a ticket.
#[derive(Debug, Error)]
pub enum IssueTicketError {
    /// The ticket body couldn't be canonicalized.
    #[error("canonicalization failed: {0}")]
    Canonicalize(#[from] serde_json::Error),
    /// Signing the canonical hash failed.
    #[error(transparent)]
    Signing(#[from] SigningError),
    /// The ticket store rejected a write.
    #[error("ticket store error: {0}")]
    Store(String),
    /// Sealing a full batch failed.
    #[error(transparent)]
    Batcher(#[from] BatcherError),
}

/// Persistence for tickets, batches, and proof paths. `routefare-ticketing`
/// is injected with this so it has no direct dependency on
/// `routefare-postgres`.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Persist a newly-issued (or batch-placed) ticket.
    async fn save_ticket(&self, ticket: &Ticket) -> Result<(), String>;
    /// Look up a ticket by id.
    async fn find_ticket(&self, ticket_id: TicketId) -> Result<Option<Ticket>, String>;
    /// Persist a sealed batch (status `READY` or later).
    async fn save_batch(&self, batch: &MerkleBatch) -> Result<(), String>;
    /// Persist updated batch state (after anchoring or confirmation polling).
    async fn update_batch(&self, batch: &MerkleBatch) -> Result<(), String>;
    /// Look up a batch by id.
    async fn find_batch(&self, batch_id: MerkleBatchId) -> Result<Option<MerkleBatch>, String>;
    /// Persist a leaf's proof path.
    async fn save_proof(&self, proof: &MerkleProof) -> Result<(), String>;
    /// Look up a leaf's proof path.
    async fn find_proof(&self, batch_id: MerkleBatchId, leaf_index: usize) -> Result<Option<MerkleProof>, String>;
}

/// Sink for the append-only verification log (spec §4.J verification
/// logging).
#[async_trait]
pub trait VerificationLogSink: Send + Sync {
    /// Append one verification attempt.
    async fn log(&self, entry: VerificationLogEntry) -> Result<(), String>;
}

/// `issueTicket(booking)` on `booking.confirmed`: canonicalize, hash, sign,
/// persist, and enqueue into the current pending batch. If enqueuing seals
/// the batch, builds and persists it (and every leaf's proof) immediately.
///
/// # Errors
///
/// Returns [`IssueTicketError`] if canonicalization, signing, storage, or
/// batch sealing fails.
pub async fn issue_ticket(
    body: TicketBody,
    signer: &TicketSigner,
    batcher: &MerkleBatcher,
    store: &dyn TicketStore,
) -> Result<Ticket, IssueTicketError> {
    let canonical_body = canonicalize(&body)?;
    let hash = hash_canonical_body(&canonical_body);
    let signature = signer.sign(&hash)?;
    let batch_id = batcher.current_batch_id()?;

    let mut ticket = Ticket {
        body,
        status: TicketStatus::Issued,
        hash: hex::encode(hash),
        signature,
        merkle_batch_id: batch_id,
        leaf_index: None,
        issued_at: Utc::now(),
        revoked_at: None,
    };
    store.save_ticket(&ticket).await.map_err(IssueTicketError::Store)?;

    if let Some(sealed_batch_id) = batcher.enqueue(ticket.body.ticket_id, hash)? {
        let (batch, proofs) = batcher.seal_current_batch()?;
        debug_assert_eq!(batch.id, sealed_batch_id);
        store.save_batch(&batch).await.map_err(IssueTicketError::Store)?;
        for proof in &proofs {
            store.save_proof(proof).await.map_err(IssueTicketError::Store)?;
        }
        if let Some(index) = batch.ticket_ids.iter().position(|id| *id == ticket.body.ticket_id) {
            ticket.merkle_batch_id = batch.id;
            ticket.leaf_index = Some(index);
            store.save_ticket(&ticket).await.map_err(IssueTicketError::Store)?;
        }
        crate::metrics::record_batch_sealed();
    }

    crate::metrics::record_ticket_issued();
    Ok(ticket)
}

/// `verifyTicket`: existence/status/expiry, signature, Merkle proof (if
/// placed), and context checks, each logged with its producing method.
pub async fn verify_ticket(
    ticket_id: TicketId,
    context: &VerificationContext,
    verifying_key: &VerifyingKey,
    grace: Duration,
    store: &dyn TicketStore,
    log: &dyn VerificationLogSink,
) -> VerificationResult {
    let now = Utc::now();
    let Ok(Some(ticket)) = store.find_ticket(ticket_id).await else {
        log_result(log, None, VerificationMethod::Database, context, VerificationResult::NotFound, "no ticket found")
            .await;
        return VerificationResult::NotFound;
    };

    if ticket.status == TicketStatus::Revoked {
        log_result(
            log,
            Some(ticket_id),
            VerificationMethod::Database,
            context,
            VerificationResult::Revoked,
            "ticket revoked",
        )
        .await;
        return VerificationResult::Revoked;
    }

    if ticket.is_expired(now, grace) {
        log_result(
            log,
            Some(ticket_id),
            VerificationMethod::Database,
            context,
            VerificationResult::Expired,
            "ticket past expiry grace window",
        )
        .await;
        return VerificationResult::Expired;
    }

    if let Some(result) = check_hash_and_signature(&ticket, verifying_key) {
        log_result(log, Some(ticket_id), VerificationMethod::Signature, context, result, "hash or signature mismatch")
            .await;
        return result;
    }

    if let Some(result) = check_merkle_proof(&ticket, store).await {
        log_result(
            log,
            Some(ticket_id),
            VerificationMethod::MerkleProof,
            context,
            result,
            "Merkle proof did not recompute anchored root",
        )
        .await;
        return result;
    }

    if let Some(expected) = context.expected_driver_id {
        if expected != ticket.body.driver_id {
            log_result(
                log,
                Some(ticket_id),
                VerificationMethod::Database,
                context,
                VerificationResult::Invalid,
                "driver id mismatch",
            )
            .await;
            return VerificationResult::Invalid;
        }
    }

    log_result(log, Some(ticket_id), VerificationMethod::Database, context, VerificationResult::Valid, "").await;
    VerificationResult::Valid
}

fn check_hash_and_signature(ticket: &Ticket, verifying_key: &VerifyingKey) -> Option<VerificationResult> {
    let canonical_body = canonicalize(&ticket.body).ok()?;
    let recomputed_hash = hash_canonical_body(&canonical_body);
    if hex::encode(recomputed_hash) != ticket.hash {
        return Some(VerificationResult::Invalid);
    }
    if !verify_signature(verifying_key, &recomputed_hash, &ticket.signature) {
        return Some(VerificationResult::Invalid);
    }
    None
}

async fn check_merkle_proof(ticket: &Ticket, store: &dyn TicketStore) -> Option<VerificationResult> {
    let leaf_index = ticket.leaf_index?;
    let Ok(Some(batch)) = store.find_batch(ticket.merkle_batch_id).await else {
        return None;
    };
    let root_hex = batch.root.as_ref()?;
    let Ok(Some(proof)) = store.find_proof(ticket.merkle_batch_id, leaf_index).await else {
        return Some(VerificationResult::Invalid);
    };
    let Ok(leaf_hash) = hex::decode(&ticket.hash) else {
        return Some(VerificationResult::Invalid);
    };
    let Ok(leaf) = <[u8; 32]>::try_from(leaf_hash.as_slice()) else {
        return Some(VerificationResult::Invalid);
    };
    let Ok(root_bytes) = hex::decode(root_hex) else {
        return Some(VerificationResult::Invalid);
    };
    let Ok(root) = <[u8; 32]>::try_from(root_bytes.as_slice()) else {
        return Some(VerificationResult::Invalid);
    };
    let siblings: Option<Vec<[u8; 32]>> = proof
        .siblings
        .iter()
        .map(|s| hex::decode(s).ok().and_then(|b| <[u8; 32]>::try_from(b.as_slice()).ok()))
        .collect();
    let Some(siblings) = siblings else {
        return Some(VerificationResult::Invalid);
    };
    if verify_proof(&leaf, leaf_index, &siblings, &root) {
        None
    } else {
        Some(VerificationResult::Invalid)
    }
}

async fn log_result(
    log: &dyn VerificationLogSink,
    ticket_id: Option<TicketId>,
    method: VerificationMethod,
    context: &VerificationContext,
    result: VerificationResult,
    notes: &str,
) {
    let entry = VerificationLogEntry {
        ticket_id,
        method,
        verifier_id: context.verifier_id.clone(),
        result,
        ip_address: context.ip_address.clone(),
        user_agent: context.user_agent.clone(),
        notes: notes.to_string(),
        logged_at: Utc::now(),
    };
    crate::metrics::record_verification(result_label(result));
    if let Err(error) = log.log(entry).await {
        tracing::error!(%error, "failed to append verification log entry");
    }
}

fn result_label(result: VerificationResult) -> &'static str {
    match result {
        VerificationResult::Valid => "valid",
        VerificationResult::Invalid => "invalid",
        VerificationResult::Expired => "expired",
        VerificationResult::Revoked => "revoked",
        VerificationResult::NotFound => "not_found",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BatchStatus;
    use rust_decimal_macros::dec;
    use routefare_domain::{BookingId, DriverId, PaymentId, RiderId};
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn sample_body(ticket_id: TicketId, driver_id: DriverId) -> TicketBody {
        TicketBody {
            ticket_id,
            booking_id: BookingId::new(),
            rider_id: RiderId::new(),
            driver_id,
            vehicle_id: "vehicle-1".to_string(),
            ride_type: "shared".to_string(),
            scheduled_time: Utc::now(),
            pickup: "Hub A".to_string(),
            dropoff: "Hub B".to_string(),
            fare: dec!(25.00),
            payment_id: PaymentId::new(),
        }
    }

    fn sample_context(expected_driver_id: Option<DriverId>) -> VerificationContext {
        VerificationContext {
            verifier_id: "driver-app".to_string(),
            expected_driver_id,
            ip_address: "127.0.0.1".to_string(),
            user_agent: "test".to_string(),
        }
    }

    #[derive(Default)]
    struct InMemoryStore {
        tickets: Mutex<HashMap<TicketId, Ticket>>,
        batches: Mutex<HashMap<MerkleBatchId, MerkleBatch>>,
        proofs: Mutex<HashMap<(MerkleBatchId, usize), MerkleProof>>,
    }

    #[async_trait]
    impl TicketStore for InMemoryStore {
        async fn save_ticket(&self, ticket: &Ticket) -> Result<(), String> {
            self.tickets.lock().unwrap().insert(ticket.body.ticket_id, ticket.clone());
            Ok(())
        }
        async fn find_ticket(&self, ticket_id: TicketId) -> Result<Option<Ticket>, String> {
            Ok(self.tickets.lock().unwrap().get(&ticket_id).cloned())
        }
        async fn save_batch(&self, batch: &MerkleBatch) -> Result<(), String> {
            self.batches.lock().unwrap().insert(batch.id, batch.clone());
            Ok(())
        }
        async fn update_batch(&self, batch: &MerkleBatch) -> Result<(), String> {
            self.batches.lock().unwrap().insert(batch.id, batch.clone());
            Ok(())
        }
        async fn find_batch(&self, batch_id: MerkleBatchId) -> Result<Option<MerkleBatch>, String> {
            Ok(self.batches.lock().unwrap().get(&batch_id).cloned())
        }
        async fn save_proof(&self, proof: &MerkleProof) -> Result<(), String> {
            self.proofs.lock().unwrap().insert((proof.batch_id, proof.leaf_index), proof.clone());
            Ok(())
        }
        async fn find_proof(&self, batch_id: MerkleBatchId, leaf_index: usize) -> Result<Option<MerkleProof>, String> {
            Ok(self.proofs.lock().unwrap().get(&(batch_id, leaf_index)).cloned())
        }
    }

    #[derive(Default)]
    struct InMemoryLog {
        entries: Mutex<Vec<VerificationLogEntry>>,
    }

    #[async_trait]
    impl VerificationLogSink for InMemoryLog {
        async fn log(&self, entry: VerificationLogEntry) -> Result<(), String> {
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }
    }

    fn test_signer() -> TicketSigner {
        TicketSigner::from_bytes(&[9u8; 32]).unwrap()
    }

    #[tokio::test]
    async fn issue_then_verify_round_trips_as_valid() {
        let signer = test_signer();
        let batcher = MerkleBatcher::new();
        let store = InMemoryStore::default();
        let log = InMemoryLog::default();
        let driver_id = DriverId::new();

        let ticket = issue_ticket(sample_body(TicketId::new(), driver_id), &signer, &batcher, &store)
            .await
            .unwrap();

        let result = verify_ticket(
            ticket.body.ticket_id,
            &sample_context(Some(driver_id)),
            &signer.verifying_key(),
            Duration::hours(1),
            &store,
            &log,
        )
        .await;

        assert_eq!(result, VerificationResult::Valid);
        assert_eq!(log.entries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_ticket_is_not_found() {
        let signer = test_signer();
        let store = InMemoryStore::default();
        let log = InMemoryLog::default();

        let result = verify_ticket(
            TicketId::new(),
            &sample_context(None),
            &signer.verifying_key(),
            Duration::hours(1),
            &store,
            &log,
        )
        .await;

        assert_eq!(result, VerificationResult::NotFound);
    }

    #[tokio::test]
    async fn revoked_ticket_is_rejected() {
        let signer = test_signer();
        let batcher = MerkleBatcher::new();
        let store = InMemoryStore::default();
        let log = InMemoryLog::default();

        let mut ticket =
            issue_ticket(sample_body(TicketId::new(), DriverId::new()), &signer, &batcher, &store).await.unwrap();
        ticket.status = TicketStatus::Revoked;
        ticket.revoked_at = Some(Utc::now());
        store.save_ticket(&ticket).await.unwrap();

        let result = verify_ticket(
            ticket.body.ticket_id,
            &sample_context(None),
            &signer.verifying_key(),
            Duration::hours(1),
            &store,
            &log,
        )
        .await;

        assert_eq!(result, VerificationResult::Revoked);
    }

    #[tokio::test]
    async fn expired_ticket_is_rejected() {
        let signer = test_signer();
        let batcher = MerkleBatcher::new();
        let store = InMemoryStore::default();
        let log = InMemoryLog::default();

        let mut body = sample_body(TicketId::new(), DriverId::new());
        body.scheduled_time = Utc::now() - Duration::days(2);
        let ticket = issue_ticket(body, &signer, &batcher, &store).await.unwrap();

        let result = verify_ticket(
            ticket.body.ticket_id,
            &sample_context(None),
            &signer.verifying_key(),
            Duration::hours(1),
            &store,
            &log,
        )
        .await;

        assert_eq!(result, VerificationResult::Expired);
    }

    #[tokio::test]
    async fn wrong_verifying_key_is_invalid() {
        let signer = test_signer();
        let other_signer = TicketSigner::from_bytes(&[2u8; 32]).unwrap();
        let batcher = MerkleBatcher::new();
        let store = InMemoryStore::default();
        let log = InMemoryLog::default();

        let ticket =
            issue_ticket(sample_body(TicketId::new(), DriverId::new()), &signer, &batcher, &store).await.unwrap();

        let result = verify_ticket(
            ticket.body.ticket_id,
            &sample_context(None),
            &other_signer.verifying_key(),
            Duration::hours(1),
            &store,
            &log,
        )
        .await;

        assert_eq!(result, VerificationResult::Invalid);
    }

    #[tokio::test]
    async fn mismatched_expected_driver_is_invalid() {
        let signer = test_signer();
        let batcher = MerkleBatcher::new();
        let store = InMemoryStore::default();
        let log = InMemoryLog::default();

        let ticket =
            issue_ticket(sample_body(TicketId::new(), DriverId::new()), &signer, &batcher, &store).await.unwrap();

        let result = verify_ticket(
            ticket.body.ticket_id,
            &sample_context(Some(DriverId::new())),
            &signer.verifying_key(),
            Duration::hours(1),
            &store,
            &log,
        )
        .await;

        assert_eq!(result, VerificationResult::Invalid);
    }

    #[tokio::test]
    async fn batch_placement_and_proof_survive_a_full_batch() {
        let signer = test_signer();
        let batcher = MerkleBatcher::new();
        let store = InMemoryStore::default();

        let mut last_ticket = None;
        for _ in 0..crate::types::BATCH_MAX_SIZE {
            last_ticket =
                Some(issue_ticket(sample_body(TicketId::new(), DriverId::new()), &signer, &batcher, &store).await.unwrap());
        }
        let ticket_id = last_ticket.unwrap().body.ticket_id;
        let stored = store.find_ticket(ticket_id).await.unwrap().unwrap();
        assert!(stored.leaf_index.is_some());
        let batch = store.find_batch(stored.merkle_batch_id).await.unwrap().unwrap();
        assert_eq!(batch.status, BatchStatus::Ready);
        assert!(batch.root.is_some());
    }
}
