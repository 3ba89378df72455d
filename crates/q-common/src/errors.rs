// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Error types for the update engine
//!
//! This module defines the unified error type used by every layer. Errors
//! are plain codes: nothing here allocates and nothing panics. Only the boot
//! state machine decides whether an error halts the device or merely rejects
//! a candidate image.

use core::fmt;

/// Result type alias for update engine operations
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // Topology Errors (0x01xx) - fatal at init
    // =========================================================================
    /// Argument or precondition violation
    InvalidParameters,
    /// Slot address not on a sector boundary or outside the memory
    InvalidAddress,
    /// Two slots of one memory share bytes
    SlotsOverlap,
    /// Memory kind does not match the supplied driver
    UnknownMemoryType,
    /// Slot kind does not match its memory kind
    UnknownSlotType,

    // =========================================================================
    // I/O Errors (0x02xx)
    // =========================================================================
    /// Underlying flash or filesystem driver reported an error
    DriverFailure,
    /// Caller buffer cannot hold the requested data
    BufferTooSmall,

    // =========================================================================
    // Content Errors (0x03xx) - recoverable, reject the image only
    // =========================================================================
    /// Image header failed parsing or self-consistency checks
    HeaderInvalid,
    /// Image length does not fit its slot or the cipher block size
    InvalidLength,
    /// Computed digest differs from the stored digest
    DigestMismatch,
    /// Encrypted magic block did not decrypt to the expected value
    WrongKey,
    /// Cipher backend rejected the key, IV or data
    CryptoFailure,

    // =========================================================================
    // Boot Errors (0x04xx)
    // =========================================================================
    /// Application entry point is implausible
    ResetVectorInvalid,
    /// No bootable image exists in any slot
    NoValidImage,
}

impl Error {
    /// Get the error code for this error
    ///
    /// Error codes are organized by category:
    /// - 0x01xx: Topology errors
    /// - 0x02xx: I/O errors
    /// - 0x03xx: Content errors
    /// - 0x04xx: Boot errors
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::InvalidParameters => 0x0101,
            Self::InvalidAddress => 0x0102,
            Self::SlotsOverlap => 0x0103,
            Self::UnknownMemoryType => 0x0104,
            Self::UnknownSlotType => 0x0105,

            Self::DriverFailure => 0x0201,
            Self::BufferTooSmall => 0x0202,

            Self::HeaderInvalid => 0x0301,
            Self::InvalidLength => 0x0302,
            Self::DigestMismatch => 0x0303,
            Self::WrongKey => 0x0304,
            Self::CryptoFailure => 0x0305,

            Self::ResetVectorInvalid => 0x0401,
            Self::NoValidImage => 0x0402,
        }
    }

    /// Check if the error concerns image content rather than the device
    ///
    /// Content errors reject a candidate; the running or backup image is
    /// used instead.
    #[must_use]
    pub const fn is_content_error(&self) -> bool {
        matches!(
            self,
            Self::HeaderInvalid
                | Self::InvalidLength
                | Self::DigestMismatch
                | Self::WrongKey
                | Self::CryptoFailure
                | Self::ResetVectorInvalid
        )
    }

    /// Check if the error is a topology/configuration error
    #[must_use]
    pub const fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidParameters
                | Self::InvalidAddress
                | Self::SlotsOverlap
                | Self::UnknownMemoryType
                | Self::UnknownSlotType
        )
    }

    /// Get a short description of the error
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::InvalidParameters => "invalid parameters",
            Self::InvalidAddress => "invalid address",
            Self::SlotsOverlap => "slots overlap",
            Self::UnknownMemoryType => "unknown memory type",
            Self::UnknownSlotType => "unknown slot type",
            Self::DriverFailure => "driver failure",
            Self::BufferTooSmall => "buffer too small",
            Self::HeaderInvalid => "image header invalid",
            Self::InvalidLength => "invalid image length",
            Self::DigestMismatch => "digest mismatch",
            Self::WrongKey => "wrong decryption key",
            Self::CryptoFailure => "crypto failure",
            Self::ResetVectorInvalid => "reset vector invalid",
            Self::NoValidImage => "no valid image",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[0x{:04X}] {}", self.code(), self.description())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "[0x{:04X}] {}", self.code(), self.description());
    }
}
