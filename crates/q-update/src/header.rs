// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Image header
//!
//! The engine only needs four header fields: the install counter, the
//! firmware version, the payload size and the header checksum. Parsing is
//! behind [`ImageHeaderCodec`] so a deployment can plug in its own header
//! format; [`StandardHeader`] is the default 64-byte little-endian layout:
//!
//! | off  | size | field |
//! |------|------|-------|
//! | 0x00 | 4 | header version ([`HEADER_VERSION`]) |
//! | 0x04 | 4 | install index |
//! | 0x08 | 1 | image type ([`IMAGE_TYPE_APPLICATION`]) |
//! | 0x0C | 4 | payload size |
//! | 0x10 | 4 | packed firmware version |
//! | 0x3C | 4 | CRC-32 over bytes `0x00..0x3C` |
//!
//! All other bytes are reserved and zero.

use q_common::{Error, Result, Version};
use q_crypto::crc32;

/// Encoded size of the standard header
pub const HEADER_SIZE: usize = 64;

/// Largest header any codec may declare
pub const MAX_HEADER_SIZE: usize = 256;

/// Supported header layout version
pub const HEADER_VERSION: u32 = 0x0001_0000;

/// Image type of a bootable application
pub const IMAGE_TYPE_APPLICATION: u8 = 1;

const CRC_OFFSET: usize = 0x3C;

/// Parsed image header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    /// Header layout version
    pub head_vers: u32,
    /// Monotonically increasing install counter
    pub img_index: u32,
    /// Image type
    pub img_type: u8,
    /// Payload bytes (excludes header, IV, magic block and digest)
    pub data_size: u32,
    /// Firmware version, used for anti-rollback
    pub data_vers: Version,
    /// CRC-32 over the header fields
    pub head_crc: u32,
}

impl ImageHeader {
    /// Build an application header with a valid checksum
    #[must_use]
    pub fn new(img_index: u32, data_size: u32, data_vers: Version) -> Self {
        let mut header = Self {
            head_vers: HEADER_VERSION,
            img_index,
            img_type: IMAGE_TYPE_APPLICATION,
            data_size,
            data_vers,
            head_crc: 0,
        };
        header.head_crc = crc32(&header.to_bytes()[..CRC_OFFSET]);
        header
    }

    /// Encode in the standard layout, storing `head_crc` as is
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut raw = [0u8; HEADER_SIZE];
        raw[0x00..0x04].copy_from_slice(&self.head_vers.to_le_bytes());
        raw[0x04..0x08].copy_from_slice(&self.img_index.to_le_bytes());
        raw[0x08] = self.img_type;
        raw[0x0C..0x10].copy_from_slice(&self.data_size.to_le_bytes());
        raw[0x10..0x14].copy_from_slice(&self.data_vers.to_packed().to_le_bytes());
        raw[CRC_OFFSET..].copy_from_slice(&self.head_crc.to_le_bytes());
        raw
    }

    /// Seed bytes for the running image digest
    #[must_use]
    pub fn digest_seed(&self) -> [u8; 4] {
        self.head_crc.to_le_bytes()
    }
}

/// Header parser
pub trait ImageHeaderCodec {
    /// Bytes occupied by the header on media
    fn header_size(&self) -> usize;

    /// Parse and validate raw header bytes
    ///
    /// # Errors
    ///
    /// Returns `Error::HeaderInvalid` on any defect.
    fn parse(&self, raw: &[u8]) -> Result<ImageHeader>;
}

/// Default 64-byte header codec
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardHeader;

fn le_u32(raw: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([raw[offset], raw[offset + 1], raw[offset + 2], raw[offset + 3]])
}

impl ImageHeaderCodec for StandardHeader {
    fn header_size(&self) -> usize {
        HEADER_SIZE
    }

    fn parse(&self, raw: &[u8]) -> Result<ImageHeader> {
        if raw.len() < HEADER_SIZE {
            return Err(Error::HeaderInvalid);
        }

        let header = ImageHeader {
            head_vers: le_u32(raw, 0x00),
            img_index: le_u32(raw, 0x04),
            img_type: raw[0x08],
            data_size: le_u32(raw, 0x0C),
            data_vers: Version::from_packed(le_u32(raw, 0x10)),
            head_crc: le_u32(raw, CRC_OFFSET),
        };

        if header.head_vers != HEADER_VERSION
            || header.img_type != IMAGE_TYPE_APPLICATION
            || header.data_size == 0
            || crc32(&raw[..CRC_OFFSET]) != header.head_crc
        {
            return Err(Error::HeaderInvalid);
        }

        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ImageHeader {
        ImageHeader::new(7, 1024, Version::new(1, 2, 3))
    }

    #[test]
    fn test_parse_encoded() {
        let header = sample();
        assert_eq!(StandardHeader.parse(&header.to_bytes()), Ok(header));
    }

    #[test]
    fn test_crc_mismatch() {
        let mut raw = sample().to_bytes();
        raw[0x20] = 1;
        assert_eq!(StandardHeader.parse(&raw), Err(Error::HeaderInvalid));
    }

    #[test]
    fn test_short_buffer() {
        let raw = sample().to_bytes();
        assert_eq!(StandardHeader.parse(&raw[..63]), Err(Error::HeaderInvalid));
    }

    #[test]
    fn test_erased_header_rejected() {
        assert_eq!(StandardHeader.parse(&[0xFF; 64]), Err(Error::HeaderInvalid));
    }

    #[test]
    fn test_zero_size_rejected() {
        let raw = ImageHeader::new(1, 0, Version::ZERO).to_bytes();
        assert_eq!(StandardHeader.parse(&raw), Err(Error::HeaderInvalid));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let mut header = sample();
        header.img_type = 2;
        header.head_crc = crc32(&header.to_bytes()[..0x3C]);
        assert_eq!(StandardHeader.parse(&header.to_bytes()), Err(Error::HeaderInvalid));
    }
}
