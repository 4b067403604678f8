//! Unified content hash.
//!
//! A single cryptographic primitive — SHA-256 — backs every fingerprint in
//! the system: decision traces, snapshot integrity checks, replay envelopes,
//! and seed derivation. The choice is declared in
//! [`crate::version::CONTRACT_VERSION`]; mixing primitives silently
//! fragments replay integrity, so no other hash function may appear anywhere
//! a fingerprint is produced.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::canonical::{to_canonical_bytes, CanonicalError};

/// A deterministic fingerprint: lowercase hex SHA-256, 64 characters.
pub type Fingerprint = String;

/// Number of hex characters in a fingerprint.
pub const FINGERPRINT_LEN: usize = 64;

/// Hash raw bytes to a lowercase hex digest.
#[must_use]
pub fn stable_hash(bytes: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Hash raw bytes to the 32-byte digest, for callers that need key material
/// rather than hex (seed derivation).
#[must_use]
pub fn stable_digest(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Fingerprint any serializable value via its canonical byte form.
pub fn fingerprint<T: Serialize>(value: &T) -> Result<Fingerprint, CanonicalError> {
    let bytes = to_canonical_bytes(value)?;
    Ok(stable_hash(&bytes))
}

/// Combine two hex fingerprints into a parent node digest.
///
/// Used by the replay envelope to derive its `merkle_root` over the input
/// and output hashes.
#[must_use]
pub fn combine_hashes(left: &str, right: &str) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    hex::encode(hasher.finalize())
}
