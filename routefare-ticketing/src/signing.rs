//! ECDSA signing/verification over secp256k1 (spec §4.J step 3: "ECDSA is
//! non-deterministic; verification uses the corresponding public key").
//!
//! No direct teacher analogue — grounded in the pack's blockchain example
//! repo's use of `k256` for transaction signing
//! (`ioi-foundation-ioi-network`), adapted here to sign a ticket's
//! canonical-body hash instead of a transaction.

use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use thiserror::Error;

/// Errors raised while signing or verifying a ticket.
#[derive(Debug, Error)]
pub enum SigningError {
    /// The signature hex couldn't be decoded or doesn't parse as a valid
    /// ECDSA signature.
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
}

/// Holds the service's ECDSA keypair and signs ticket hashes.
pub struct TicketSigner {
    signing_key: SigningKey,
}

impl TicketSigner {
    /// Build a signer from a raw 32-byte secp256k1 private key.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError`] if `private_key_bytes` isn't a valid
    /// secp256k1 scalar.
    pub fn from_bytes(private_key_bytes: &[u8]) -> Result<Self, SigningError> {
        let signing_key = SigningKey::from_slice(private_key_bytes)
            .map_err(|e| SigningError::MalformedSignature(e.to_string()))?;
        Ok(Self { signing_key })
    }

    /// The corresponding public key, for distribution to verifiers.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        *self.signing_key.verifying_key()
    }

    /// Sign `hash` (the SHA-256 of a ticket's canonical body) directly —
    /// no further hashing, per spec §4.J step 3 — returning a lowercase-hex
    /// fixed-size signature.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError`] if the underlying ECDSA signing operation
    /// fails.
    pub fn sign(&self, hash: &[u8; 32]) -> Result<String, SigningError> {
        let signature: Signature = self
            .signing_key
            .sign_prehash(hash)
            .map_err(|e| SigningError::MalformedSignature(e.to_string()))?;
        Ok(hex::encode(signature.to_bytes()))
    }
}

/// Verify `signature_hex` against `hash` using `verifying_key`.
#[must_use]
pub fn verify_signature(verifying_key: &VerifyingKey, hash: &[u8; 32], signature_hex: &str) -> bool {
    let Ok(bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&bytes) else {
        return false;
    };
    verifying_key.verify_prehash(hash, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_signer() -> TicketSigner {
        TicketSigner::from_bytes(&[7u8; 32]).unwrap()
    }

    #[test]
    fn signs_and_verifies_roundtrip() {
        let signer = test_signer();
        let hash = [1u8; 32];
        let signature = signer.sign(&hash).unwrap();
        assert!(verify_signature(&signer.verifying_key(), &hash, &signature));
    }

    #[test]
    fn tampered_hash_fails_verification() {
        let signer = test_signer();
        let signature = signer.sign(&[1u8; 32]).unwrap();
        assert!(!verify_signature(&signer.verifying_key(), &[2u8; 32], &signature));
    }

    #[test]
    fn malformed_signature_hex_is_rejected() {
        let signer = test_signer();
        assert!(!verify_signature(&signer.verifying_key(), &[1u8; 32], "not-hex"));
    }
}
