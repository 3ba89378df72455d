// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! AES-CBC backend
//!
//! The AES variant is chosen from the key length at `init`. The chaining
//! state persists across `decrypt` calls, so a payload can be decrypted
//! chunk by chunk as it streams off flash.

use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::error::{CryptoError, CryptoResult};
use crate::traits::CipherAlgo;

/// AES block size in bytes
pub const AES_BLOCK_SIZE: usize = 16;

/// CBC IV size in bytes
pub const AES_IV_SIZE: usize = 16;

enum Decryptor {
    Aes128(cbc::Decryptor<Aes128>),
    Aes192(cbc::Decryptor<Aes192>),
    Aes256(cbc::Decryptor<Aes256>),
}

enum Encryptor {
    Aes128(cbc::Encryptor<Aes128>),
    Aes192(cbc::Encryptor<Aes192>),
    Aes256(cbc::Encryptor<Aes256>),
}

fn check_lengths(key: &[u8], iv: &[u8]) -> CryptoResult<()> {
    if !matches!(key.len(), 16 | 24 | 32) {
        return Err(CryptoError::InvalidKey);
    }
    if iv.len() != AES_IV_SIZE {
        return Err(CryptoError::InvalidIv);
    }
    Ok(())
}

fn check_blocks(data: &[u8]) -> CryptoResult<()> {
    if data.len() % AES_BLOCK_SIZE == 0 {
        Ok(())
    } else {
        Err(CryptoError::InvalidLength)
    }
}

/// Streaming AES-CBC decryptor
///
/// The key schedule is wiped when the cipher is dropped or `deinit` is
/// called.
#[derive(Default)]
pub struct AesCbc {
    state: Option<Decryptor>,
}

impl AesCbc {
    /// Create an uninitialized cipher
    #[must_use]
    pub const fn new() -> Self {
        Self { state: None }
    }

    /// Check if a key is loaded
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }
}

impl CipherAlgo for AesCbc {
    fn block_size(&self) -> usize {
        AES_BLOCK_SIZE
    }

    fn iv_size(&self) -> usize {
        AES_IV_SIZE
    }

    fn init(&mut self, key: &[u8], iv: &[u8]) -> CryptoResult<()> {
        check_lengths(key, iv)?;
        let state = match key.len() {
            16 => cbc::Decryptor::<Aes128>::new_from_slices(key, iv).map(Decryptor::Aes128),
            24 => cbc::Decryptor::<Aes192>::new_from_slices(key, iv).map(Decryptor::Aes192),
            _ => cbc::Decryptor::<Aes256>::new_from_slices(key, iv).map(Decryptor::Aes256),
        }
        .map_err(|_| CryptoError::InvalidKey)?;
        self.state = Some(state);
        Ok(())
    }

    fn decrypt(&mut self, data: &mut [u8]) -> CryptoResult<()> {
        check_blocks(data)?;
        let state = self.state.as_mut().ok_or(CryptoError::NotInitialized)?;
        for block in data.chunks_exact_mut(AES_BLOCK_SIZE) {
            let block = GenericArray::from_mut_slice(block);
            match state {
                Decryptor::Aes128(d) => d.decrypt_block_mut(block),
                Decryptor::Aes192(d) => d.decrypt_block_mut(block),
                Decryptor::Aes256(d) => d.decrypt_block_mut(block),
            }
        }
        Ok(())
    }

    fn deinit(&mut self) {
        self.state = None;
    }
}

/// Streaming AES-CBC encryptor
///
/// Only image producers need this; the boot path decrypts.
pub struct AesCbcEncryptor {
    state: Encryptor,
}

impl AesCbcEncryptor {
    /// Load a key and IV
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKey` or `CryptoError::InvalidIv` on a
    /// length mismatch.
    pub fn new(key: &[u8], iv: &[u8]) -> CryptoResult<Self> {
        check_lengths(key, iv)?;
        let state = match key.len() {
            16 => cbc::Encryptor::<Aes128>::new_from_slices(key, iv).map(Encryptor::Aes128),
            24 => cbc::Encryptor::<Aes192>::new_from_slices(key, iv).map(Encryptor::Aes192),
            _ => cbc::Encryptor::<Aes256>::new_from_slices(key, iv).map(Encryptor::Aes256),
        }
        .map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self { state })
    }

    /// Encrypt whole blocks in place, continuing the chain
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidLength` if `data` is not block aligned.
    pub fn encrypt(&mut self, data: &mut [u8]) -> CryptoResult<()> {
        check_blocks(data)?;
        for block in data.chunks_exact_mut(AES_BLOCK_SIZE) {
            let block = GenericArray::from_mut_slice(block);
            match &mut self.state {
                Encryptor::Aes128(e) => e.encrypt_block_mut(block),
                Encryptor::Aes192(e) => e.encrypt_block_mut(block),
                Encryptor::Aes256(e) => e.encrypt_block_mut(block),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decrypt_before_init() {
        let mut cipher = AesCbc::new();
        let mut data = [0u8; 16];
        assert_eq!(cipher.decrypt(&mut data), Err(CryptoError::NotInitialized));
    }

    #[test]
    fn test_unaligned_rejected() {
        let mut cipher = AesCbc::new();
        cipher.init(&[0; 16], &[0; 16]).unwrap();
        let mut data = [0u8; 15];
        assert_eq!(cipher.decrypt(&mut data), Err(CryptoError::InvalidLength));
    }

    #[test]
    fn test_bad_lengths() {
        let mut cipher = AesCbc::new();
        assert_eq!(cipher.init(&[0; 17], &[0; 16]), Err(CryptoError::InvalidKey));
        assert_eq!(cipher.init(&[0; 16], &[0; 8]), Err(CryptoError::InvalidIv));
        assert!(!cipher.is_initialized());
    }

    #[test]
    fn test_deinit_drops_key() {
        let mut cipher = AesCbc::new();
        cipher.init(&[0; 32], &[0; 16]).unwrap();
        cipher.deinit();
        assert!(!cipher.is_initialized());
    }
}
