//! Content fingerprints for matrices, tensors and persisted tables.
//!
//! Fingerprints are SHA-256 over a canonical byte encoding with domain
//! separation and length prefixing, so two values fingerprint equally exactly
//! when their shapes and entries are bit-identical.
//!
//! # Citations
//! - SHA-256: NIST FIPS 180-4 (2015)
//! - Domain separation & length prefixing: Bernstein et al., "How to hash into elliptic curves" (2009)

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A 256-bit hash value.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashValue(pub [u8; 32]);

impl HashValue {
    /// Creates a zero hash (all zeros).
    #[inline]
    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Returns the raw byte array.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Computes SHA-256 of `data` with domain separation.
    ///
    /// Input is `b"RANKMAT:<domain>:v1" || le64(len(data)) || data`.
    pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"RANKMAT:");
        hasher.update(domain);
        hasher.update(b":v1");
        hasher.update((data.len() as u64).to_le_bytes());
        hasher.update(data);
        Self(hasher.finalize().into())
    }
}

impl std::fmt::Display for HashValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // First 4 bytes are enough to tell values apart in logs.
        write!(
            f,
            "HashValue({:02x}{:02x}{:02x}{:02x}…)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

/// Values with a deterministic canonical encoding.
pub trait Canonical {
    /// Domain tag mixed into the fingerprint.
    const DOMAIN: &'static [u8];

    /// Appends the canonical bytes of `self` to `out`.
    fn write_canonical(&self, out: &mut Vec<u8>);

    /// Fingerprint of the canonical bytes.
    fn fingerprint(&self) -> HashValue {
        let mut out = Vec::new();
        self.write_canonical(&mut out);
        HashValue::hash_with_domain(Self::DOMAIN, &out)
    }
}

/// Encodes a shape and an `i64` payload, the layout shared by matrices and tensors.
pub(crate) fn write_dense(out: &mut Vec<u8>, shape: &[usize], entries: &[i64]) {
    out.extend_from_slice(&(shape.len() as u64).to_le_bytes());
    for &d in shape {
        out.extend_from_slice(&(d as u64).to_le_bytes());
    }
    out.reserve(entries.len() * 8);
    for &v in entries {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_separates() {
        let a = HashValue::hash_with_domain(b"A", b"payload");
        let b = HashValue::hash_with_domain(b"B", b"payload");
        assert_ne!(a, b);
        assert_eq!(a, HashValue::hash_with_domain(b"A", b"payload"));
    }

    #[test]
    fn shape_is_part_of_encoding() {
        let mut flat = Vec::new();
        write_dense(&mut flat, &[1, 4], &[1, 2, 3, 4]);
        let mut square = Vec::new();
        write_dense(&mut square, &[2, 2], &[1, 2, 3, 4]);
        assert_ne!(flat, square);
    }
}
