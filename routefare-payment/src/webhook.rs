//! Webhook signature verification (spec §4.H `processWebhook` step 1, §6
//! "wire/crypto formats").
//!
//! Signature = lowercase-hex HMAC-SHA256 over the raw request body,
//! compared in constant time so response-timing can't leak which bytes of
//! the expected signature matched.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Verify `signature_hex` against HMAC-SHA256(`secret`, `raw_body`).
///
/// `signature_hex` is compared case-insensitively, as the spec requires,
/// by lowercasing it before the constant-time byte comparison.
#[must_use]
pub fn verify_signature(secret: &[u8], raw_body: &[u8], signature_hex: &str) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(raw_body);
    let expected = mac.finalize().into_bytes();
    let expected_hex = hex::encode(expected);

    let Ok(given) = hex::decode(signature_hex.trim().to_lowercase()) else {
        return false;
    };
    let Ok(expected_bytes) = hex::decode(&expected_hex) else {
        return false;
    };

    given.ct_eq(&expected_bytes).into()
}
