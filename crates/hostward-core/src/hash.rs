//! SHA-256 fingerprints via `ring::digest`.

use ring::digest::{digest, SHA256};

/// Compute SHA-256 of raw bytes.
///
/// Returns lowercase hex-encoded digest.
#[must_use]
pub fn sha256_bytes(data: &[u8]) -> String {
    hex::encode(digest(&SHA256, data).as_ref())
}

/// First `len` hex characters of a digest, for display.
#[must_use]
pub fn short(digest: &str, len: usize) -> &str {
    digest.get(..len).unwrap_or(digest)
}
