// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! SHA3-256 digest backend

use crate::error::{CryptoError, CryptoResult};
use crate::traits::HashAlgo;
use sha3::{Digest, Sha3_256 as Sha3_256Impl};

/// SHA3-256 output size in bytes
pub const SHA3_256_SIZE: usize = 32;

/// Streaming SHA3-256
#[derive(Default)]
pub struct Sha3_256 {
    inner: Sha3_256Impl,
}

impl Sha3_256 {
    /// Create a fresh hasher
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl HashAlgo for Sha3_256 {
    fn digest_size(&self) -> usize {
        SHA3_256_SIZE
    }

    fn init(&mut self) {
        Digest::reset(&mut self.inner);
    }

    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.inner, data);
    }

    fn finalize(&mut self, out: &mut [u8]) -> CryptoResult<usize> {
        if out.len() < SHA3_256_SIZE {
            return Err(CryptoError::BufferTooSmall);
        }
        let result = self.inner.finalize_reset();
        out[..SHA3_256_SIZE].copy_from_slice(&result);
        Ok(SHA3_256_SIZE)
    }
}
