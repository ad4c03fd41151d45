//! Deterministic proxy-path fingerprinting.
//!
//! Fingerprints are computed over a path's raw bytes, with no normalization:
//! two byte strings that name the same file on disk but differ textually
//! (`/tmp/a` vs `/tmp/./a`) fingerprint differently. This keeps the mapping
//! from path to fingerprint a pure function of the bytes handed to it.

use md5::{Digest, Md5};

/// Number of hex characters in a fingerprint (32 lowercase hex digits).
pub const FINGERPRINT_LEN: usize = 32;

/// Computes the 32-character lowercase hex MD5 fingerprint of `path`'s raw
/// bytes. Pure and deterministic: equal byte strings always produce equal
/// fingerprints, and no two distinct outputs are produced for the same input.
pub fn fingerprint(path: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(path);
    let digest = hasher.finalize();

    let mut out = String::with_capacity(FINGERPRINT_LEN);
    for byte in digest {
        out.push(hex_digit(byte >> 4));
        out.push(hex_digit(byte & 0xf));
    }
    out
}

fn hex_digit(nibble: u8) -> char {
    match nibble {
        0..=9 => (b'0' + nibble) as char,
        10..=15 => (b'a' + nibble - 10) as char,
        _ => unreachable!("nibble out of range"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_32_lowercase_hex_chars() {
        let fp = fingerprint(b"/tmp/x");
        assert_eq!(fp.len(), FINGERPRINT_LEN);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn is_deterministic() {
        assert_eq!(fingerprint(b"/tmp/x"), fingerprint(b"/tmp/x"));
    }

    #[test]
    fn distinguishes_different_paths() {
        assert_ne!(fingerprint(b"/tmp/x"), fingerprint(b"/tmp/y"));
    }

    #[test]
    fn does_not_normalize_paths() {
        assert_ne!(fingerprint(b"/tmp/a"), fingerprint(b"/tmp/./a"));
    }

    #[test]
    fn matches_known_md5_vector() {
        // MD5("") = d41d8cd98f00b204e9800998ecf8427e
        assert_eq!(fingerprint(b""), "d41d8cd98f00b204e9800998ecf8427e");
    }
}
