// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Pre-shared key storage

use crate::error::{CryptoError, CryptoResult};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Largest supported key (AES-256)
pub const MAX_KEY_SIZE: usize = 32;

/// Pre-shared image key, wiped on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PresharedKey {
    bytes: [u8; MAX_KEY_SIZE],
    len: usize,
}

impl PresharedKey {
    /// No key configured
    pub const EMPTY: Self = Self {
        bytes: [0; MAX_KEY_SIZE],
        len: 0,
    };

    /// Copy key material
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKey` unless the key is empty or
    /// 16, 24 or 32 bytes long.
    pub fn new(key: &[u8]) -> CryptoResult<Self> {
        if !matches!(key.len(), 0 | 16 | 24 | 32) {
            return Err(CryptoError::InvalidKey);
        }
        let mut bytes = [0u8; MAX_KEY_SIZE];
        bytes[..key.len()].copy_from_slice(key);
        Ok(Self {
            bytes,
            len: key.len(),
        })
    }

    /// Key bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Key length in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if no key is configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl core::fmt::Debug for PresharedKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "PresharedKey({} bytes)", self.len)
    }
}
