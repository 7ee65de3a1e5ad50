//! Merkle tree over ticket hashes (spec §4.J "Merkle batcher"): "compute a
//! Merkle tree over ticket hashes (pair-wise SHA-256 of concatenated
//! children; duplicate last on odd counts); record root; for each leaf
//! index i, generate and persist the proof path (siblings from leaf to
//! root)".

use sha2::{Digest, Sha256};

/// A built Merkle tree: every level from leaves to root, for proof
/// extraction. `levels[0]` is the leaf level, `levels.last()` is `[root]`.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    levels: Vec<Vec<[u8; 32]>>,
}

fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

impl MerkleTree {
    /// Build a tree over `leaves`, given in ticket-batch order. Odd levels
    /// duplicate their last node before pairing, per spec.
    ///
    /// Returns `None` if `leaves` is empty — a batch is never built with
    /// zero tickets.
    #[must_use]
    pub fn build(leaves: Vec<[u8; 32]>) -> Option<Self> {
        if leaves.is_empty() {
            return None;
        }
        let mut levels = vec![leaves];
        loop {
            let current = &levels[levels.len() - 1];
            if current.len() <= 1 {
                break;
            }
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            let mut i = 0;
            while i < current.len() {
                let left = &current[i];
                let right = current.get(i + 1).unwrap_or(left);
                next.push(hash_pair(left, right));
                i += 2;
            }
            levels.push(next);
        }
        Some(Self { levels })
    }

    /// The root hash.
    #[must_use]
    pub fn root(&self) -> [u8; 32] {
        self.levels.last().and_then(|level| level.first()).copied().unwrap_or([0u8; 32])
    }

    /// The number of leaves this tree was built from.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    /// The sibling path from leaf `index` up to (but excluding) the root.
    ///
    /// Returns `None` if `index` is out of range.
    #[must_use]
    pub fn proof_for(&self, index: usize) -> Option<Vec<[u8; 32]>> {
        if index >= self.leaf_count() {
            return None;
        }
        let mut siblings = Vec::new();
        let mut idx = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling_idx = if idx % 2 == 0 { idx + 1 } else { idx - 1 };
            let sibling = level.get(sibling_idx).unwrap_or(&level[idx]);
            siblings.push(*sibling);
            idx /= 2;
        }
        Some(siblings)
    }
}

/// Recompute the root implied by `leaf`, `index`, and `siblings`, and
/// compare it against `expected_root`.
#[must_use]
pub fn verify_proof(leaf: &[u8; 32], index: usize, siblings: &[[u8; 32]], expected_root: &[u8; 32]) -> bool {
    let mut hash = *leaf;
    let mut idx = index;
    for sibling in siblings {
        hash = if idx % 2 == 0 { hash_pair(&hash, sibling) } else { hash_pair(sibling, &hash) };
        idx /= 2;
    }
    &hash == expected_root
}
