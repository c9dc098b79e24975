//! Content hashing for netlists and project sections.
//!
//! The hash covers the serialized JSON form of a value. Callers hash a
//! canonical view (see [`crate::netlist::canonical`]) when they need equal
//! designs to hash equally regardless of id assignment.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// A 32-byte SHA-256 content hash.
pub type ContentHash = [u8; 32];

/// Compute the SHA-256 content hash of any serializable value.
pub fn content_hash<T: Serialize>(value: &T) -> Result<ContentHash, serde_json::Error> {
    let json = serde_json::to_vec(value)?;
    Ok(bytes_hash(&json))
}

/// SHA-256 of raw bytes.
pub fn bytes_hash(bytes: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Format a content hash as a hex string.
pub fn hash_hex(hash: &ContentHash) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}
