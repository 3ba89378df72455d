// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Host-side image builder
//!
//! Produces bit-exact on-media images, optionally encrypted, for tests and
//! provisioning tools:
//!
//! ```text
//! plain:     [header][payload][digest]
//! encrypted: [header][IV][E(magic) ‖ E(payload)][digest]
//! ```
//!
//! The magic block and the payload form one CBC chain starting at the IV.
//! The digest is seeded with the header CRC and covers the bytes exactly
//! as they are stored.

use std::vec::Vec;

use q_common::constants::{IV_SIZE, MAGIC_BLOCK, MAX_DIGEST_SIZE};
use q_common::{Result, Version};
use q_crypto::{AesCbcEncryptor, Crc32, HashAlgo};

use crate::header::ImageHeader;

struct Encryption {
    key: Vec<u8>,
    iv: [u8; IV_SIZE],
}

/// Builder for a single image
pub struct ImageBuilder {
    header: ImageHeader,
    payload: Vec<u8>,
    encryption: Option<Encryption>,
}

impl ImageBuilder {
    /// Plain image with a freshly computed header
    #[must_use]
    pub fn new(img_index: u32, version: Version, payload: &[u8]) -> Self {
        Self {
            header: ImageHeader::new(img_index, payload.len() as u32, version),
            payload: payload.to_vec(),
            encryption: None,
        }
    }

    /// Use a caller-supplied header as is
    #[must_use]
    pub fn with_header(mut self, header: ImageHeader) -> Self {
        self.header = header;
        self
    }

    /// Encrypt the payload with AES-CBC
    #[must_use]
    pub fn encrypted(mut self, key: &[u8], iv: [u8; IV_SIZE]) -> Self {
        self.encryption = Some(Encryption {
            key: key.to_vec(),
            iv,
        });
        self
    }

    /// Header the image will carry
    #[must_use]
    pub fn header(&self) -> ImageHeader {
        self.header
    }

    /// Build with the default CRC-32 digest
    ///
    /// # Errors
    ///
    /// See [`ImageBuilder::build_with`].
    pub fn build(&self) -> Result<Vec<u8>> {
        self.build_with(&mut Crc32::new())
    }

    /// Build with `hash` as the image digest
    ///
    /// # Errors
    ///
    /// Returns `InvalidLength` if an encrypted payload is not block aligned
    /// and `WrongKey` for an unusable key.
    pub fn build_with(&self, hash: &mut dyn HashAlgo) -> Result<Vec<u8>> {
        let mut image = self.header.to_bytes().to_vec();

        match &self.encryption {
            Some(enc) => {
                let mut body = MAGIC_BLOCK.to_vec();
                body.extend_from_slice(&self.payload);
                AesCbcEncryptor::new(&enc.key, &enc.iv)?.encrypt(&mut body)?;
                image.extend_from_slice(&enc.iv);
                image.extend_from_slice(&body);
            }
            None => image.extend_from_slice(&self.payload),
        }

        let header_len = self.header.to_bytes().len();
        let mut digest = [0u8; MAX_DIGEST_SIZE];
        hash.init();
        hash.update(&self.header.digest_seed());
        hash.update(&image[header_len..]);
        let size = hash.finalize(&mut digest)?;
        image.extend_from_slice(&digest[..size]);
        Ok(image)
    }
}
