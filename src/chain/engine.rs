//! Digest linking
//!
//! `link` is the single hash function shared by the write path and the
//! verifier. It is total: a missing predecessor is substituted with the
//! genesis sentinel inside the hash input rather than branching, so
//! replaying a chain from its first record uses the same code path as
//! appending to an established one.

use sha2::{Digest, Sha256};

/// Sentinel standing in for the predecessor of a tenant's first record.
pub const GENESIS_DIGEST: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Compute the digest chaining `canonical_payload` to its predecessor.
///
/// `previous` is the prior record's digest, or `None` for a genesis
/// record. Output is lowercase hex SHA-256, 64 characters.
pub fn link(previous: Option<&str>, canonical_payload: &[u8], tenant_id: &str) -> String {
    let previous = previous.unwrap_or(GENESIS_DIGEST);

    let mut hasher = Sha256::new();
    hasher.update(previous.as_bytes());
    hasher.update(canonical_payload);
    hasher.update(tenant_id.as_bytes());
    hex::encode(hasher.finalize())
}
