//! BLAKE3 content hasher.
//!
//! # Overview
//! The [`ContentHasher`] trait fingerprints file contents for identity and
//! duplicate detection. [`Blake3Hasher`] is the implementation used by the
//! scanner; tests may substitute their own.

use std::io::Read;

/// Length of a hex-encoded BLAKE3 digest.
pub const DIGEST_HEX_LEN: usize = 64;

/// Read buffer used when hashing streams (64 KiB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Deterministic content fingerprint.
pub trait ContentHasher: Send + Sync {
    /// Fingerprint of `bytes` as a lowercase hex string.
    fn hash(&self, bytes: &[u8]) -> String;
}

/// BLAKE3 hasher producing 256-bit hex digests.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Hasher;

impl Blake3Hasher {
    /// Create a new hasher.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Hash everything readable from `reader` without buffering it whole.
    pub fn hash_reader(&self, mut reader: impl Read) -> std::io::Result<String> {
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; BUFFER_SIZE];
        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
        Ok(hasher.finalize().to_hex().to_string())
    }
}

impl ContentHasher for Blake3Hasher {
    fn hash(&self, bytes: &[u8]) -> String {
        blake3::hash(bytes).to_hex().to_string()
    }
}
