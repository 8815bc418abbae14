//! Content fingerprinting of dump payloads.
//!
//! pg_dump stamps every dump with "Started on" / "Completed on" comment
//! lines. Those lines are stripped before hashing (and before storing) so
//! that two dumps of unchanged data fingerprint identically.

use sha2::{Digest, Sha256};
use std::fmt;

/// Line prefixes of volatile generation-timestamp comments.
pub const VOLATILE_LINE_PREFIXES: &[&[u8]] = &[b"-- Started on ", b"-- Completed on "];

/// Removes generation-timestamp comment lines. Comment-only, idempotent.
pub fn normalize(payload: &[u8]) -> Vec<u8> {
    let kept: Vec<&[u8]> = payload
        .split(|b| *b == b'\n')
        .filter(|line| !is_volatile(line))
        .collect();
    kept.join(&b'\n')
}

fn is_volatile(line: &[u8]) -> bool {
    VOLATILE_LINE_PREFIXES
        .iter()
        .any(|prefix| line.starts_with(prefix))
}

/// Hex-encoded SHA-256 digest of a normalized payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint of a payload that is already normalized.
    pub fn of_normalized(normalized: &[u8]) -> Self {
        Fingerprint(hex::encode(Sha256::digest(normalized)))
    }

    /// Normalizes `payload` and fingerprints the result.
    pub fn of(payload: &[u8]) -> Self {
        Self::of_normalized(&normalize(payload))
    }

    /// Wraps a fingerprint read back from object metadata.
    pub fn from_hex(hex: &str) -> Self {
        Fingerprint(hex.trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
