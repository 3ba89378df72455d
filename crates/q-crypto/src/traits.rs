// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Capability traits
//!
//! Both traits are object safe: the update engine holds them as
//! `&mut dyn HashAlgo` / `&mut dyn CipherAlgo`, so a hardware accelerator
//! can replace a software backend without touching the engine.

use crate::error::CryptoResult;
use subtle::ConstantTimeEq;

/// Streaming digest
pub trait HashAlgo {
    /// Digest size in bytes
    fn digest_size(&self) -> usize;

    /// Start a new digest, discarding any previous state
    fn init(&mut self);

    /// Feed data
    fn update(&mut self, data: &[u8]);

    /// Write the digest to `out` and reset
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::BufferTooSmall` if `out` is shorter than
    /// [`HashAlgo::digest_size`].
    fn finalize(&mut self, out: &mut [u8]) -> CryptoResult<usize>;
}

/// CBC-mode block decryption
pub trait CipherAlgo {
    /// Block size in bytes
    fn block_size(&self) -> usize;

    /// IV size in bytes
    fn iv_size(&self) -> usize;

    /// Load a key and IV, resetting the chaining state
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKey` or `CryptoError::InvalidIv` on a
    /// length mismatch.
    fn init(&mut self, key: &[u8], iv: &[u8]) -> CryptoResult<()>;

    /// Decrypt whole blocks in place, continuing the chain
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidLength` if `data` is not block aligned
    /// and `CryptoError::NotInitialized` before `init`.
    fn decrypt(&mut self, data: &mut [u8]) -> CryptoResult<()>;

    /// Drop and wipe the key schedule
    fn deinit(&mut self);
}

/// Constant-time comparison of two byte slices
///
/// Slices of different lengths compare unequal.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(&[1, 2, 3], &[1, 2, 3]));
        assert!(!constant_time_eq(&[1, 2, 3], &[1, 2, 4]));
        assert!(!constant_time_eq(&[1, 2], &[1, 2, 3]));
        assert!(constant_time_eq(&[], &[]));
    }
}
