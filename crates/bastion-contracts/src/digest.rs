//! SHA-256 helpers shared by every record that has a content hash.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::BastionResult;

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Compact JSON encoding used as the canonical byte form of a record.
///
/// Records hashed through this function keep their maps in `BTreeMap`s so
/// key order is stable across runs.
pub fn canonical_json<T: Serialize>(value: &T) -> BastionResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// SHA-256 of the canonical JSON encoding of `value`.
pub fn hash_json<T: Serialize>(value: &T) -> BastionResult<String> {
    Ok(sha256_hex(&canonical_json(value)?))
}

/// True if `s` is exactly 64 lowercase hex characters.
pub fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
