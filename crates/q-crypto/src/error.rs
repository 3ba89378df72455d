// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Cryptographic error types

use core::fmt;

/// Error type for digest and cipher operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    /// Key length is not 16, 24 or 32 bytes
    InvalidKey,
    /// IV length does not match the cipher
    InvalidIv,
    /// Data is not a whole number of cipher blocks
    InvalidLength,
    /// Cipher used before `init`
    NotInitialized,
    /// Output buffer is smaller than the digest
    BufferTooSmall,
}

impl CryptoError {
    /// Get error code for logging/debugging
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::InvalidKey => 0x0901,
            Self::InvalidIv => 0x0902,
            Self::InvalidLength => 0x0903,
            Self::NotInitialized => 0x0904,
            Self::BufferTooSmall => 0x0905,
        }
    }

    /// Get error description
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::InvalidKey => "invalid key",
            Self::InvalidIv => "invalid IV",
            Self::InvalidLength => "data not block aligned",
            Self::NotInitialized => "cipher not initialized",
            Self::BufferTooSmall => "buffer too small",
        }
    }
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[0x{:04X}] {}", self.code(), self.description())
    }
}

impl From<CryptoError> for q_common::Error {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::InvalidKey => Self::WrongKey,
            CryptoError::InvalidLength => Self::InvalidLength,
            CryptoError::BufferTooSmall => Self::BufferTooSmall,
            CryptoError::InvalidIv | CryptoError::NotInitialized => Self::CryptoFailure,
        }
    }
}

/// Result type for cryptographic operations
pub type CryptoResult<T> = Result<T, CryptoError>;
