// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! HAL error types

use core::fmt;

/// HAL error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalError {
    /// Driver used before `init`
    NotInitialized,
    /// Driver initialization failed
    InitFailed,
    /// Flash address out of bounds
    FlashOutOfBounds,
    /// Flash write not aligned to the write granularity
    FlashUnaligned,
    /// Flash erase failed
    FlashEraseFailed,
    /// Flash write failed
    FlashWriteFailed,
    /// Flash read failed
    FlashReadFailed,
    /// Flash stayed busy past the poll limit
    FlashTimeout,
    /// File does not exist
    FileNotFound,
    /// File operation failed
    FileError,
    /// No free file handle
    TooManyOpenFiles,
    /// Invalid parameter
    InvalidParameter,
    /// Operation not supported by this driver
    NotSupported,
}

impl HalError {
    /// Get error code
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::NotInitialized => 0x0801,
            Self::InitFailed => 0x0802,
            Self::FlashOutOfBounds => 0x0810,
            Self::FlashUnaligned => 0x0811,
            Self::FlashEraseFailed => 0x0812,
            Self::FlashWriteFailed => 0x0813,
            Self::FlashReadFailed => 0x0814,
            Self::FlashTimeout => 0x0815,
            Self::FileNotFound => 0x0820,
            Self::FileError => 0x0821,
            Self::TooManyOpenFiles => 0x0822,
            Self::InvalidParameter => 0x08F0,
            Self::NotSupported => 0x08FF,
        }
    }

    /// Get error description
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::NotInitialized => "not initialized",
            Self::InitFailed => "initialization failed",
            Self::FlashOutOfBounds => "flash address out of bounds",
            Self::FlashUnaligned => "flash write unaligned",
            Self::FlashEraseFailed => "flash erase failed",
            Self::FlashWriteFailed => "flash write failed",
            Self::FlashReadFailed => "flash read failed",
            Self::FlashTimeout => "flash operation timeout",
            Self::FileNotFound => "file not found",
            Self::FileError => "file error",
            Self::TooManyOpenFiles => "too many open files",
            Self::InvalidParameter => "invalid parameter",
            Self::NotSupported => "not supported",
        }
    }
}

impl fmt::Display for HalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[0x{:04X}] {}", self.code(), self.description())
    }
}

impl From<HalError> for q_common::Error {
    fn from(e: HalError) -> Self {
        match e {
            HalError::InvalidParameter => Self::InvalidParameters,
            _ => Self::DriverFailure,
        }
    }
}

/// HAL Result type
pub type HalResult<T> = Result<T, HalError>;
