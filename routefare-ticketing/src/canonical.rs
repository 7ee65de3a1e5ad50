//! Canonical JSON + hashing (spec §4.J step 1-2, §6 GLOSSARY "Canonical
//! JSON"): "a normalization of a JSON value (sorted keys, fixed number and
//! timestamp formats) that yields a unique byte sequence for hashing/
//! signing." `serde_json`'s default `Map` doesn't guarantee key order
//! without the `preserve_order` feature, so this sorts explicitly rather
//! than relying on a feature flag.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Serialize `value` to canonical JSON: object keys sorted
/// lexicographically at every nesting level, numbers and timestamps in
/// `serde_json`'s own stable format (already deterministic for the scalar
/// types this crate signs).
///
/// # Errors
///
/// Returns an error if `value` cannot be serialized to JSON at all.
pub fn canonicalize<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let raw = serde_json::to_value(value)?;
    let sorted = sort_keys(raw);
    serde_json::to_string(&sorted)
}

fn sort_keys(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted = serde_json::Map::new();
            let mut keys: Vec<String> = map.keys().cloned().collect();
            keys.sort();
            for key in keys {
                if let Some(v) = map.get(&key) {
                    sorted.insert(key, sort_keys(v.clone()));
                }
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(sort_keys).collect())
        }
        other => other,
    }
}

/// SHA-256 of `canonical_body`'s UTF-8 bytes.
#[must_use]
pub fn hash_canonical_body(canonical_body: &str) -> [u8; 32] {
    let digest = Sha256::digest(canonical_body.as_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_object_keys_at_every_level() {
        let value = json!({"b": 1, "a": {"z": 1, "y": 2}});
        let canonical = canonicalize(&value).unwrap();
        assert_eq!(canonical, r#"{"a":{"y":2,"z":1},"b":1}"#);
    }

    #[test]
    fn same_value_always_hashes_identically() {
        let value = json!({"x": 1, "y": 2});
        let a = canonicalize(&value).unwrap();
        let b = canonicalize(&value).unwrap();
        assert_eq!(hash_canonical_body(&a), hash_canonical_body(&b));
    }

    #[test]
    fn different_values_hash_differently() {
        let a = hash_canonical_body(&canonicalize(&json!({"x": 1})).unwrap());
        let b = hash_canonical_body(&canonicalize(&json!({"x": 2})).unwrap());
        assert_ne!(a, b);
    }
}
