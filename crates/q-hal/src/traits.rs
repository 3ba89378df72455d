// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! HAL trait definitions
//!
//! This module defines the driver capability sets the update engine is
//! written against. Per-MCU drivers implement them; the engine receives
//! them as trait objects so a backend can be swapped without touching the
//! core.

use crate::error::{HalError, HalResult};

/// Number of `status()` polls before a busy driver is declared timed out
pub const READY_POLL_LIMIT: u32 = 1_000_000;

/// Static geometry of a flash device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashInfo {
    /// Absolute address of the first byte
    pub base_address: u32,
    /// Device size in bytes
    pub size: u32,
    /// Minimum write granularity in bytes
    pub write_size: usize,
    /// Smallest erase sector size in bytes
    pub sector_size: u32,
}

impl FlashInfo {
    /// Address one past the last byte
    #[must_use]
    pub const fn end_address(&self) -> u64 {
        self.base_address as u64 + self.size as u64
    }

    /// Check if `[address, address + len)` lies within the device
    #[must_use]
    pub const fn contains(&self, address: u32, len: u32) -> bool {
        address >= self.base_address && address as u64 + len as u64 <= self.end_address()
    }
}

/// Flash controller status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashStatus {
    /// Ready for the next operation
    Idle,
    /// Operation in progress
    Busy,
    /// Last operation failed
    Error,
}

/// Flash memory driver
pub trait FlashDriver {
    /// Initialize the flash controller
    fn init(&mut self) -> HalResult<()>;

    /// Release the controller and leave it in a known state
    fn deinit(&mut self) -> HalResult<()>;

    /// Device geometry
    fn info(&self) -> FlashInfo;

    /// Current controller status
    fn status(&self) -> FlashStatus;

    /// Read data from flash
    ///
    /// # Arguments
    /// * `address` - Absolute flash address
    /// * `buffer` - Buffer to read into
    fn read(&self, address: u32, buffer: &mut [u8]) -> HalResult<()>;

    /// Write data to flash
    ///
    /// # Arguments
    /// * `address` - Absolute address aligned to [`FlashInfo::write_size`]
    /// * `data` - Data whose length is a multiple of the write size
    ///
    /// # Notes
    /// Flash must be erased before writing.
    fn write(&mut self, address: u32, data: &[u8]) -> HalResult<()>;

    /// Erase `size` bytes starting at a sector boundary
    fn erase(&mut self, address: u32, size: u32) -> HalResult<()>;

    /// Check if `address` is the first byte of an erase sector
    fn is_sector_addr(&self, address: u32) -> bool;

    /// Start address of the sector following the one containing `address`
    ///
    /// Returns `None` past the end of the device.
    fn next_sector_addr(&self, address: u32) -> Option<u32>;

    /// Swap flash banks on dual-bank devices
    fn swap_banks(&mut self) -> HalResult<()> {
        Err(HalError::NotSupported)
    }

    /// Poll `status()` until the controller is idle
    fn wait_ready(&self) -> HalResult<()> {
        for _ in 0..READY_POLL_LIMIT {
            match self.status() {
                FlashStatus::Idle => return Ok(()),
                FlashStatus::Busy => core::hint::spin_loop(),
                FlashStatus::Error => return Err(HalError::FlashWriteFailed),
            }
        }
        Err(HalError::FlashTimeout)
    }
}

/// Handle of an open file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileHandle(pub u16);

/// File open mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read only; the file must exist
    Read,
    /// Read and write; the file is created if missing
    ReadWrite,
}

/// Filesystem driver
pub trait FsDriver {
    /// Mount / initialize the filesystem
    fn init(&mut self) -> HalResult<()>;

    /// Unmount the filesystem
    fn deinit(&mut self) -> HalResult<()>;

    /// Open a file
    fn open(&mut self, path: &str, mode: OpenMode) -> HalResult<FileHandle>;

    /// Read at `offset`, returning the number of bytes read
    fn read(&mut self, file: FileHandle, offset: u32, buffer: &mut [u8]) -> HalResult<usize>;

    /// Write `data` at `offset`
    fn write(&mut self, file: FileHandle, offset: u32, data: &[u8]) -> HalResult<()>;

    /// Reset `len` bytes at `offset` to the erased state
    fn erase(&mut self, file: FileHandle, offset: u32, len: u32) -> HalResult<()>;

    /// Close a handle
    fn close(&mut self, file: FileHandle) -> HalResult<()>;

    /// Preferred write block size
    fn write_size(&self) -> usize {
        256
    }
}
