// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! RAM-backed simulation drivers
//!
//! Host builds have no flash controller. These drivers keep the device
//! contents in a `Vec` and record every mutating call so tests can assert
//! alignment, call counts and cleanup behavior. [`RamFlash`] enforces NOR
//! semantics: writes can only clear bits, and must be aligned to the write
//! granularity.

use core::cell::Cell;
use std::collections::BTreeMap;
use std::string::{String, ToString};
use std::vec;
use std::vec::Vec;

use crate::error::{HalError, HalResult};
use crate::traits::{FileHandle, FlashDriver, FlashInfo, FlashStatus, FsDriver, OpenMode};

/// One recorded driver write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRecord {
    /// Absolute address (flash) or file offset
    pub address: u32,
    /// Number of bytes written
    pub len: usize,
}

/// Simulated flash device
pub struct RamFlash {
    info: FlashInfo,
    data: Vec<u8>,
    initialized: bool,
    deinit_calls: usize,
    writes: Vec<WriteRecord>,
    erases: Vec<(u32, u32)>,
    fail_write_after: Option<usize>,
    busy_polls: u32,
    busy_left: Cell<u32>,
}

impl RamFlash {
    /// Create an erased device
    ///
    /// # Panics
    ///
    /// Panics if `size` is not a multiple of `sector_size`.
    #[must_use]
    pub fn new(base_address: u32, size: u32, sector_size: u32, write_size: usize) -> Self {
        assert!(sector_size > 0 && size % sector_size == 0, "irregular geometry");
        Self {
            info: FlashInfo {
                base_address,
                size,
                write_size,
                sector_size,
            },
            data: vec![0xFF; size as usize],
            initialized: false,
            deinit_calls: 0,
            writes: Vec::new(),
            erases: Vec::new(),
            fail_write_after: None,
            busy_polls: 0,
            busy_left: Cell::new(0),
        }
    }

    /// Report `Busy` for `polls` status reads after every write/erase
    #[must_use]
    pub fn with_busy_polls(mut self, polls: u32) -> Self {
        self.busy_polls = polls;
        self
    }

    /// Let `count` more writes succeed, then fail every write
    pub fn fail_writes_after(&mut self, count: usize) {
        self.fail_write_after = Some(self.writes.len() + count);
    }

    /// Recorded writes, oldest first
    #[must_use]
    pub fn writes(&self) -> &[WriteRecord] {
        &self.writes
    }

    /// Recorded erases as `(address, size)`
    #[must_use]
    pub fn erases(&self) -> &[(u32, u32)] {
        &self.erases
    }

    /// Forget recorded calls
    pub fn clear_log(&mut self) {
        self.writes.clear();
        self.erases.clear();
    }

    /// Number of `deinit` calls so far
    #[must_use]
    pub fn deinit_count(&self) -> usize {
        self.deinit_calls
    }

    /// Check if the driver is initialized
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Raw view of device contents
    ///
    /// # Panics
    ///
    /// Panics if the range is outside the device.
    #[must_use]
    pub fn contents(&self, address: u32, len: usize) -> &[u8] {
        let start = (address - self.info.base_address) as usize;
        &self.data[start..start + len]
    }

    /// Program raw bytes, bypassing alignment and erase rules
    ///
    /// # Panics
    ///
    /// Panics if the range is outside the device.
    pub fn load(&mut self, address: u32, bytes: &[u8]) {
        let start = (address - self.info.base_address) as usize;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
    }

    /// Invert one byte of the device
    ///
    /// # Panics
    ///
    /// Panics if the address is outside the device.
    pub fn corrupt(&mut self, address: u32) {
        let index = (address - self.info.base_address) as usize;
        self.data[index] ^= 0xFF;
    }

    fn offset(&self, address: u32, len: usize) -> HalResult<usize> {
        let len = u32::try_from(len).map_err(|_| HalError::FlashOutOfBounds)?;
        if !self.info.contains(address, len) {
            return Err(HalError::FlashOutOfBounds);
        }
        Ok((address - self.info.base_address) as usize)
    }

    fn ensure_initialized(&self) -> HalResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(HalError::NotInitialized)
        }
    }
}

impl FlashDriver for RamFlash {
    fn init(&mut self) -> HalResult<()> {
        self.initialized = true;
        Ok(())
    }

    fn deinit(&mut self) -> HalResult<()> {
        self.initialized = false;
        self.deinit_calls += 1;
        Ok(())
    }

    fn info(&self) -> FlashInfo {
        self.info
    }

    fn status(&self) -> FlashStatus {
        let left = self.busy_left.get();
        if left > 0 {
            self.busy_left.set(left - 1);
            FlashStatus::Busy
        } else {
            FlashStatus::Idle
        }
    }

    fn read(&self, address: u32, buffer: &mut [u8]) -> HalResult<()> {
        self.ensure_initialized()?;
        let start = self.offset(address, buffer.len())?;
        buffer.copy_from_slice(&self.data[start..start + buffer.len()]);
        Ok(())
    }

    fn write(&mut self, address: u32, data: &[u8]) -> HalResult<()> {
        self.ensure_initialized()?;
        let start = self.offset(address, data.len())?;
        let granule = self.info.write_size;
        if data.is_empty() || start % granule != 0 || data.len() % granule != 0 {
            return Err(HalError::FlashUnaligned);
        }
        if self.fail_write_after.is_some_and(|limit| self.writes.len() >= limit) {
            return Err(HalError::FlashWriteFailed);
        }

        for (cell, byte) in self.data[start..start + data.len()].iter_mut().zip(data) {
            *cell &= *byte;
        }
        self.writes.push(WriteRecord {
            address,
            len: data.len(),
        });
        self.busy_left.set(self.busy_polls);
        Ok(())
    }

    fn erase(&mut self, address: u32, size: u32) -> HalResult<()> {
        self.ensure_initialized()?;
        let start = self.offset(address, size as usize)?;
        if !self.is_sector_addr(address) || size % self.info.sector_size != 0 {
            return Err(HalError::FlashEraseFailed);
        }

        self.data[start..start + size as usize].fill(0xFF);
        self.erases.push((address, size));
        self.busy_left.set(self.busy_polls);
        Ok(())
    }

    fn is_sector_addr(&self, address: u32) -> bool {
        self.info.contains(address, 1)
            && (address - self.info.base_address) % self.info.sector_size == 0
    }

    fn next_sector_addr(&self, address: u32) -> Option<u32> {
        if !self.info.contains(address, 1) {
            return None;
        }
        let sector = self.info.sector_size;
        let index = (address - self.info.base_address) / sector;
        Some(self.info.base_address + (index + 1) * sector)
    }
}

/// Maximum simultaneously open files in [`RamFs`]
pub const RAM_FS_MAX_OPEN: usize = 4;

/// Simulated filesystem
pub struct RamFs {
    files: BTreeMap<String, Vec<u8>>,
    handles: [Option<String>; RAM_FS_MAX_OPEN],
    mounted: bool,
    write_size: usize,
    writes: Vec<WriteRecord>,
    close_calls: usize,
}

impl RamFs {
    /// Create an empty filesystem with the given write block size
    #[must_use]
    pub fn new(write_size: usize) -> Self {
        Self {
            files: BTreeMap::new(),
            handles: Default::default(),
            mounted: false,
            write_size,
            writes: Vec::new(),
            close_calls: 0,
        }
    }

    /// Create or replace a file
    pub fn insert_file(&mut self, path: &str, contents: &[u8]) {
        self.files.insert(path.to_string(), contents.to_vec());
    }

    /// Contents of a file
    #[must_use]
    pub fn file(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    /// Mutable contents of a file
    pub fn file_mut(&mut self, path: &str) -> Option<&mut Vec<u8>> {
        self.files.get_mut(path)
    }

    /// Number of currently open handles
    #[must_use]
    pub fn open_handles(&self) -> usize {
        self.handles.iter().filter(|h| h.is_some()).count()
    }

    /// Number of `close` calls so far
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.close_calls
    }

    /// Recorded writes as `(offset, len)`
    #[must_use]
    pub fn writes(&self) -> &[WriteRecord] {
        &self.writes
    }

    fn path_of(&self, file: FileHandle) -> HalResult<&str> {
        self.handles
            .get(file.0 as usize)
            .and_then(Option::as_deref)
            .ok_or(HalError::InvalidParameter)
    }

    fn contents_mut(&mut self, file: FileHandle, end: usize) -> HalResult<&mut Vec<u8>> {
        let path = self.path_of(file)?.to_string();
        let contents = self.files.get_mut(&path).ok_or(HalError::FileNotFound)?;
        if contents.len() < end {
            contents.resize(end, 0xFF);
        }
        Ok(contents)
    }
}

impl FsDriver for RamFs {
    fn init(&mut self) -> HalResult<()> {
        self.mounted = true;
        Ok(())
    }

    fn deinit(&mut self) -> HalResult<()> {
        self.mounted = false;
        self.handles = Default::default();
        Ok(())
    }

    fn open(&mut self, path: &str, mode: OpenMode) -> HalResult<FileHandle> {
        if !self.mounted {
            return Err(HalError::NotInitialized);
        }
        if !self.files.contains_key(path) {
            match mode {
                OpenMode::Read => return Err(HalError::FileNotFound),
                OpenMode::ReadWrite => {
                    self.files.insert(path.to_string(), Vec::new());
                }
            }
        }

        let index = self
            .handles
            .iter()
            .position(Option::is_none)
            .ok_or(HalError::TooManyOpenFiles)?;
        self.handles[index] = Some(path.to_string());
        // RAM_FS_MAX_OPEN fits in u16.
        Ok(FileHandle(index as u16))
    }

    fn read(&mut self, file: FileHandle, offset: u32, buffer: &mut [u8]) -> HalResult<usize> {
        let path = self.path_of(file)?;
        let contents = self.files.get(path).ok_or(HalError::FileNotFound)?;
        let start = (offset as usize).min(contents.len());
        let count = buffer.len().min(contents.len() - start);
        buffer[..count].copy_from_slice(&contents[start..start + count]);
        Ok(count)
    }

    fn write(&mut self, file: FileHandle, offset: u32, data: &[u8]) -> HalResult<()> {
        let start = offset as usize;
        let contents = self.contents_mut(file, start + data.len())?;
        contents[start..start + data.len()].copy_from_slice(data);
        self.writes.push(WriteRecord {
            address: offset,
            len: data.len(),
        });
        Ok(())
    }

    fn erase(&mut self, file: FileHandle, offset: u32, len: u32) -> HalResult<()> {
        let start = offset as usize;
        let end = start + len as usize;
        let contents = self.contents_mut(file, end)?;
        contents[start..end].fill(0xFF);
        Ok(())
    }

    fn close(&mut self, file: FileHandle) -> HalResult<()> {
        let slot = self
            .handles
            .get_mut(file.0 as usize)
            .ok_or(HalError::InvalidParameter)?;
        if slot.take().is_none() {
            return Err(HalError::InvalidParameter);
        }
        self.close_calls += 1;
        Ok(())
    }

    fn write_size(&self) -> usize {
        self.write_size
    }
}
