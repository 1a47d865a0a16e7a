//! Content fingerprinting.
//!
//! BLAKE3 hex digests used as stable keys for the guard's result cache: the
//! same note content always maps to the same fingerprint, so a duplicate
//! trigger can be answered from cache without touching the enricher.

/// Hex BLAKE3 digest of note content.
pub fn content_fingerprint(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}
