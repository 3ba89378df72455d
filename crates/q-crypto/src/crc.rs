// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! CRC-32 digest
//!
//! CRC-32/ISO-HDLC (the zlib polynomial), used for image digests, the
//! header checksum and the magic-block key check. The digest is emitted
//! little-endian.

use crate::error::{CryptoError, CryptoResult};
use crate::traits::HashAlgo;
use crc::{Crc, Digest, CRC_32_ISO_HDLC};

static CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Digest size in bytes
pub const CRC32_SIZE: usize = 4;

/// One-shot CRC-32
#[must_use]
pub fn crc32(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}

/// Streaming CRC-32
pub struct Crc32 {
    state: Option<Digest<'static, u32>>,
}

impl Crc32 {
    /// Create an idle digest
    #[must_use]
    pub const fn new() -> Self {
        Self { state: None }
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

impl HashAlgo for Crc32 {
    fn digest_size(&self) -> usize {
        CRC32_SIZE
    }

    fn init(&mut self) {
        self.state = Some(CRC32.digest());
    }

    fn update(&mut self, data: &[u8]) {
        self.state.get_or_insert_with(|| CRC32.digest()).update(data);
    }

    fn finalize(&mut self, out: &mut [u8]) -> CryptoResult<usize> {
        if out.len() < CRC32_SIZE {
            return Err(CryptoError::BufferTooSmall);
        }
        let value = self.state.take().map_or_else(|| crc32(&[]), |digest| digest.finalize());
        out[..CRC32_SIZE].copy_from_slice(&value.to_le_bytes());
        Ok(CRC32_SIZE)
    }
}
