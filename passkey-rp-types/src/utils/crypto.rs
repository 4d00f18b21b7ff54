//! Collection of common cryptography primitives used when checking relying party data.

use sha2::{Digest, Sha256, Sha384, Sha512};

/// Compute the SHA-256 of the given `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut out = [0; 32];
    out.copy_from_slice(&Sha256::digest(data));
    out
}

/// Compute the SHA-384 of the given `data`.
pub fn sha384(data: &[u8]) -> [u8; 48] {
    let mut out = [0; 48];
    out.copy_from_slice(&Sha384::digest(data));
    out
}

/// Compute the SHA-512 of the given `data`.
pub fn sha512(data: &[u8]) -> [u8; 64] {
    let mut out = [0; 64];
    out.copy_from_slice(&Sha512::digest(data));
    out
}

/// Compare two byte strings in a time independent of where they first differ.
///
/// The length comparison itself is not hidden.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_rp_id() {
        // SHA-256("vanbukin-pc.local")
        let expected = [
            0xc1, 0xb1, 0x91, 0xec, 0x92, 0x9b, 0xff, 0x79, 0xc2, 0x0d, 0x2f, 0xd9, 0x6f, 0xf4,
            0xf1, 0xc9, 0x47, 0xb8, 0x6b, 0x8a, 0xed, 0x15, 0x76, 0x80, 0xb0, 0x60, 0x14, 0x06,
            0x84, 0x10, 0x18, 0xf5,
        ];
        assert_eq!(sha256(b"vanbukin-pc.local"), expected);
    }

    #[test]
    fn constant_time_eq_matches_slice_eq() {
        assert!(constant_time_eq(b"challenge", b"challenge"));
        assert!(!constant_time_eq(b"challenge", b"challengf"));
        assert!(!constant_time_eq(b"challenge", b"challeng"));
        assert!(constant_time_eq(b"", b""));
    }
}
