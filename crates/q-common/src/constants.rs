// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! On-media layout constants
//!
//! These values are part of the interop contract with the host-side image
//! tool and must not change without bumping the header version:
//!
//! ```text
//! [ImageHeader][IV?: 16B][EncryptedMagicBlock?: 16B][Payload: dataSize][Digest]
//! ```

/// Initialization vector size for encrypted images
pub const IV_SIZE: usize = 16;

/// Cipher block size (AES)
pub const CIPHER_BLOCK_SIZE: usize = 16;

/// Plaintext of the encrypted magic-number block
pub const MAGIC_BLOCK: [u8; CIPHER_BLOCK_SIZE] = *b"QBOOT-MAGIC-BLK!";

/// CRC-32/ISO-HDLC of [`MAGIC_BLOCK`]
pub const MAGIC_BLOCK_CRC: u32 = 0xE0D0_ED89;

/// Largest digest any hash backend may produce
pub const MAX_DIGEST_SIZE: usize = 32;

/// Largest flash write granularity the buffered writer supports
pub const MAX_WRITE_SIZE: usize = 256;

/// Largest streaming chunk
pub const MAX_CHUNK_SIZE: usize = 1024;

/// Value of an erased flash word
pub const ERASED_WORD: u32 = 0xFFFF_FFFF;

/// Offset of the reset handler inside the vector table
pub const RESET_VECTOR_OFFSET: u32 = 4;
