//! Merkle batcher (spec §4.J "Merkle batcher"): accumulates ticket hashes
//! into batches, builds the tree, anchors the root, and polls confirmation
//! depth. Modeled as a plain async struct rather than a replayable
//! `Reducer` — like `routefare-booking`'s `SeatAvailability`, this is
//! worker bookkeeping over an external system (the chain), not a sequence
//! of domain decisions worth sourcing as events.

use crate::anchor::{AnchorError, AnchorSubmitter};
use crate::merkle::MerkleTree;
use crate::types::{BatchStatus, MerkleBatch, MerkleProof, BATCH_MAX_SIZE, REQUIRED_CONFIRMATIONS};
use chrono::Utc;
use routefare_domain::{MerkleBatchId, TicketId};
use std::sync::Mutex;
use thiserror::Error;

/// Errors raised while batching, anchoring, or polling.
#[derive(Debug, Error)]
pub enum BatcherError {
    /// The anchor submitter failed.
    #[error(transparent)]
    Anchor(#[from] AnchorError),
    /// Asked to build a tree over an empty ticket set.
    #[error("cannot build a batch with zero tickets")]
    EmptyBatch,
    /// An internal lock was poisoned by a prior panic.
    #[error("batcher lock poisoned")]
    Poisoned,
}

/// One ticket hash queued for the currently-open batch.
#[derive(Debug, Clone, Copy)]
struct PendingLeaf {
    ticket_id: TicketId,
    hash: [u8; 32],
}

/// Tracks the single currently-accumulating batch in memory. Sealed
/// batches (built, anchored, persisted) are handed off to the caller and
/// no longer owned by this struct.
pub struct MerkleBatcher {
    current_batch_id: Mutex<MerkleBatchId>,
    pending: Mutex<Vec<PendingLeaf>>,
}

impl Default for MerkleBatcher {
    fn default() -> Self {
        Self { current_batch_id: Mutex::new(MerkleBatchId::new()), pending: Mutex::new(Vec::new()) }
    }
}

impl MerkleBatcher {
    /// Start a fresh batcher with an empty pending batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a ticket's hash into the current batch.
    ///
    /// Returns `Some(batch_id)` once the batch has reached
    /// [`BATCH_MAX_SIZE`] and should be sealed by the caller via
    /// [`Self::seal_current_batch`].
    ///
    /// # Errors
    ///
    /// Returns [`BatcherError::Poisoned`] if an internal lock was
    /// poisoned.
    pub fn enqueue(&self, ticket_id: TicketId, hash: [u8; 32]) -> Result<Option<MerkleBatchId>, BatcherError> {
        let mut pending = self.pending.lock().map_err(|_| BatcherError::Poisoned)?;
        pending.push(PendingLeaf { ticket_id, hash });
        if pending.len() >= BATCH_MAX_SIZE {
            let batch_id = *self.current_batch_id.lock().map_err(|_| BatcherError::Poisoned)?;
            Ok(Some(batch_id))
        } else {
            Ok(None)
        }
    }

    /// The id of the batch currently accumulating tickets.
    ///
    /// # Errors
    ///
    /// Returns [`BatcherError::Poisoned`] if an internal lock was
    /// poisoned.
    pub fn current_batch_id(&self) -> Result<MerkleBatchId, BatcherError> {
        self.current_batch_id.lock().map(|id| *id).map_err(|_| BatcherError::Poisoned)
    }

    /// Drain the current batch's pending tickets and open a new, empty
    /// one in its place. Used both when a batch fills naturally and when
    /// a scheduled flush seals a partial batch.
    ///
    /// # Errors
    ///
    /// Returns [`BatcherError::EmptyBatch`] if nothing is pending, or
    /// [`BatcherError::Poisoned`] if an internal lock was poisoned.
    pub fn seal_current_batch(&self) -> Result<(MerkleBatch, Vec<MerkleProof>), BatcherError> {
        let batch_id = {
            let mut current = self.current_batch_id.lock().map_err(|_| BatcherError::Poisoned)?;
            let sealed = *current;
            *current = MerkleBatchId::new();
            sealed
        };
        let leaves = {
            let mut pending = self.pending.lock().map_err(|_| BatcherError::Poisoned)?;
            std::mem::take(&mut *pending)
        };
        build_sealed_batch(batch_id, &leaves)
    }
}

fn build_sealed_batch(
    batch_id: MerkleBatchId,
    leaves: &[PendingLeaf],
) -> Result<(MerkleBatch, Vec<MerkleProof>), BatcherError> {
    if leaves.is_empty() {
        return Err(BatcherError::EmptyBatch);
    }
    let tree = MerkleTree::build(leaves.iter().map(|l| l.hash).collect()).ok_or(BatcherError::EmptyBatch)?;
    let root = hex::encode(tree.root());
    let proofs = leaves
        .iter()
        .enumerate()
        .map(|(index, _)| MerkleProof {
            batch_id,
            leaf_index: index,
            siblings: tree
                .proof_for(index)
                .unwrap_or_default()
                .iter()
                .map(hex::encode)
                .collect(),
        })
        .collect();
    let batch = MerkleBatch {
        id: batch_id,
        status: BatchStatus::Ready,
        ticket_ids: leaves.iter().map(|l| l.ticket_id).collect(),
        root: Some(root),
        anchor_tx_hash: None,
        confirmations: 0,
        created_at: Utc::now(),
        anchored_at: None,
    };
    Ok((batch, proofs))
}

/// Submit `batch`'s root to the chain, advancing it to `ANCHORED`.
///
/// # Errors
///
/// Returns [`BatcherError::Anchor`] if the submitter fails. Returns the
/// batch unmodified error-free if it isn't `READY` (a no-op, not an
/// error — callers may retry a scheduler tick against any batch state).
pub async fn anchor_batch(batch: &mut MerkleBatch, submitter: &dyn AnchorSubmitter) -> Result<(), BatcherError> {
    if batch.status != BatchStatus::Ready {
        return Ok(());
    }
    let Some(root) = &batch.root else { return Ok(()) };
    let tx_hash = submitter.submit_root(root).await?;
    batch.anchor_tx_hash = Some(tx_hash);
    batch.anchored_at = Some(Utc::now());
    batch.status = BatchStatus::Anchored;
    Ok(())
}

/// Poll the chain for `batch`'s confirmation depth, advancing it to
/// `CONFIRMED` once [`REQUIRED_CONFIRMATIONS`] is reached.
///
/// # Errors
///
/// Returns [`BatcherError::Anchor`] if the submitter fails.
pub async fn poll_confirmations(batch: &mut MerkleBatch, submitter: &dyn AnchorSubmitter) -> Result<(), BatcherError> {
    if batch.status != BatchStatus::Anchored {
        return Ok(());
    }
    let Some(tx_hash) = &batch.anchor_tx_hash else { return Ok(()) };
    let confirmations = submitter.get_confirmations(tx_hash).await?;
    batch.confirmations = confirmations;
    if confirmations >= REQUIRED_CONFIRMATIONS {
        batch.status = BatchStatus::Confirmed;
        crate::metrics::record_batch_confirmed();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::FakeAnchorSubmitter;

    #[test]
    fn enqueue_returns_none_until_batch_full() {
        let batcher = MerkleBatcher::new();
        for _ in 0..BATCH_MAX_SIZE - 1 {
            let result = batcher.enqueue(TicketId::new(), [1u8; 32]).unwrap();
            assert!(result.is_none());
        }
        let result = batcher.enqueue(TicketId::new(), [1u8; 32]).unwrap();
        assert!(result.is_some());
    }

    #[test]
    fn seal_current_batch_fails_on_empty_batch() {
        let batcher = MerkleBatcher::new();
        assert!(matches!(batcher.seal_current_batch(), Err(BatcherError::EmptyBatch)));
    }

    #[test]
    fn seal_current_batch_builds_proof_per_ticket() {
        let batcher = MerkleBatcher::new();
        let ids: Vec<TicketId> = (0..5).map(|_| TicketId::new()).collect();
        for (i, id) in ids.iter().enumerate() {
            batcher.enqueue(*id, [i as u8; 32]).unwrap();
        }
        let (batch, proofs) = batcher.seal_current_batch().unwrap();
        assert_eq!(batch.status, BatchStatus::Ready);
        assert_eq!(batch.ticket_ids, ids);
        assert_eq!(proofs.len(), 5);
        assert!(batch.root.is_some());
    }

    #[test]
    fn sealing_opens_a_fresh_batch() {
        let batcher = MerkleBatcher::new();
        batcher.enqueue(TicketId::new(), [1u8; 32]).unwrap();
        let first_id = batcher.current_batch_id().unwrap();
        batcher.seal_current_batch().unwrap();
        let second_id = batcher.current_batch_id().unwrap();
        assert_ne!(first_id, second_id);
    }

    #[tokio::test]
    async fn anchor_then_poll_confirms_batch() {
        let batcher = MerkleBatcher::new();
        batcher.enqueue(TicketId::new(), [1u8; 32]).unwrap();
        let (mut batch, _) = batcher.seal_current_batch().unwrap();
        let submitter = FakeAnchorSubmitter::with_confirmations(REQUIRED_CONFIRMATIONS);

        anchor_batch(&mut batch, &submitter).await.unwrap();
        assert_eq!(batch.status, BatchStatus::Anchored);

        poll_confirmations(&mut batch, &submitter).await.unwrap();
        assert_eq!(batch.status, BatchStatus::Confirmed);
        assert_eq!(batch.confirmations, REQUIRED_CONFIRMATIONS);
    }

    #[tokio::test]
    async fn poll_before_required_confirmations_stays_anchored() {
        let batcher = MerkleBatcher::new();
        batcher.enqueue(TicketId::new(), [1u8; 32]).unwrap();
        let (mut batch, _) = batcher.seal_current_batch().unwrap();
        let submitter = FakeAnchorSubmitter::with_confirmations(3);

        anchor_batch(&mut batch, &submitter).await.unwrap();
        poll_confirmations(&mut batch, &submitter).await.unwrap();
        assert_eq!(batch.status, BatchStatus::Anchored);
        assert_eq!(batch.confirmations, 3);
    }
}
