// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Memory abstraction and buffered writer
//!
//! [`Storage`] owns every registered memory and exposes slot-relative
//! `read` / `write` / `erase` / `copy` regardless of whether a slot is
//! flash-mapped or file-backed.
//!
//! # Coalescing writer
//!
//! Flash controllers reject writes that are unaligned or shorter than the
//! write granularity. All writes therefore pass through one [`WriteBuffer`]
//! sized to the granule of the target memory: bytes accumulate until the
//! buffer is full, then exactly one driver `write` of one granule is
//! issued. [`WriteFlag::Force`] zero-pads and flushes a partial tail.
//!
//! A buffered run is strictly sequential: it starts on a granule boundary
//! and every following call must continue at the next byte of the same
//! slot. There is one buffer per `Storage`, so there is one writer at a
//! time.
//!
//! # Failure handling
//!
//! Any driver error runs [`Storage::cleanup`] on the failing memory (flash
//! is de-initialized, open files are closed), discards buffered bytes and
//! surfaces as `Error::DriverFailure`. Nothing is retried here.

use heapless::Vec;
use q_common::config::MAX_MEMORIES;
use q_common::constants::MAX_WRITE_SIZE;
use q_common::{Error, MemoryRole, Result, SlotSettings};
use q_hal::{FileHandle, FlashDriver, FlashStatus, FsDriver, HalError, HalResult, OpenMode};

use crate::registry::{ContentType, Driver, Memory, Slot, SlotRef};

/// Chunk size used by [`Storage::copy`]
pub const COPY_CHUNK_SIZE: usize = 256;

/// Write completion mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteFlag {
    /// Keep a partial granule buffered
    Buffered,
    /// Zero-pad and flush any partial granule
    Force,
}

// ============================================================================
// Write Buffer
// ============================================================================

/// Scratch buffer holding at most one granule
pub struct WriteBuffer {
    data: [u8; MAX_WRITE_SIZE],
    len: usize,
    granule: usize,
    target: SlotRef,
    offset: u32,
}

impl WriteBuffer {
    const fn new() -> Self {
        Self {
            data: [0; MAX_WRITE_SIZE],
            len: 0,
            granule: 1,
            target: SlotRef::new(0, 0),
            offset: 0,
        }
    }

    fn is_pending(&self) -> bool {
        self.len > 0
    }

    fn is_full(&self) -> bool {
        self.len == self.granule
    }

    fn next_offset(&self) -> u64 {
        u64::from(self.offset) + self.len as u64
    }

    fn start(&mut self, target: SlotRef, offset: u32, granule: usize) {
        self.target = target;
        self.offset = offset;
        self.granule = granule;
        self.len = 0;
    }

    fn fill(&mut self, data: &[u8]) -> usize {
        let taken = data.len().min(self.granule - self.len);
        self.data[self.len..self.len + taken].copy_from_slice(&data[..taken]);
        self.len += taken;
        taken
    }

    fn pad(&mut self) {
        self.data[self.len..self.granule].fill(0);
        self.len = self.granule;
    }

    fn advance(&mut self) {
        self.offset += self.granule as u32;
        self.len = 0;
    }

    fn discard(&mut self) {
        self.len = 0;
    }
}

// ============================================================================
// Driver helpers
// ============================================================================

fn file_handle(fs: &mut dyn FsDriver, slot: &mut Slot, mode: OpenMode) -> HalResult<FileHandle> {
    let SlotSettings::File { path, .. } = *slot.location() else {
        return Err(HalError::InvalidParameter);
    };

    match slot.handle {
        Some((handle, OpenMode::ReadWrite)) => return Ok(handle),
        Some((handle, OpenMode::Read)) if mode == OpenMode::Read => return Ok(handle),
        Some((handle, OpenMode::Read)) => {
            slot.handle = None;
            fs.close(handle)?;
        }
        None => {}
    }

    let handle = fs.open(path, mode)?;
    slot.handle = Some((handle, mode));
    Ok(handle)
}

fn wait_idle(flash: &dyn FlashDriver) -> HalResult<()> {
    if flash.status() == FlashStatus::Idle {
        return Ok(());
    }
    flash.wait_ready()
}

fn erase_sectors(flash: &mut dyn FlashDriver, start: u32, end: u64) -> HalResult<()> {
    let mut address = start;
    while u64::from(address) < end {
        let next = flash
            .next_sector_addr(address)
            .ok_or(HalError::FlashOutOfBounds)?;
        flash.erase(address, next - address)?;
        wait_idle(flash)?;
        address = next;
    }
    Ok(())
}

fn check_range(slot: &Slot, offset: u32, len: usize) -> Result<()> {
    if u64::from(offset) + len as u64 > u64::from(slot.size()) {
        return Err(Error::InvalidLength);
    }
    Ok(())
}

// ============================================================================
// Storage
// ============================================================================

/// Iterator over every registered slot, see [`Storage::slots`]
pub struct SlotIter<'s, 'a> {
    memories: &'s [Memory<'a>],
    memory: usize,
    index: usize,
}

impl<'s> Iterator for SlotIter<'s, '_> {
    type Item = (SlotRef, &'s Slot);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(memory) = self.memories.get(self.memory) {
            if let Some(slot) = memory.slots.get(self.index) {
                let slot_ref = SlotRef::new(self.memory as u8, self.index as u8);
                self.index += 1;
                return Some((slot_ref, slot));
            }
            self.memory += 1;
            self.index = 0;
        }
        None
    }
}


/// All registered memories plus the shared write buffer
pub struct Storage<'a> {
    memories: Vec<Memory<'a>, MAX_MEMORIES>,
    buffer: WriteBuffer,
}

impl Default for Storage<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Storage<'a> {
    /// Create empty storage
    #[must_use]
    pub const fn new() -> Self {
        Self {
            memories: Vec::new(),
            buffer: WriteBuffer::new(),
        }
    }

    /// Append a registered memory
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameters` when full.
    pub fn add(&mut self, memory: Memory<'a>) -> Result<()> {
        self.memories.push(memory).map_err(|_| Error::InvalidParameters)
    }

    /// Registered memories
    #[must_use]
    pub fn memories(&self) -> &[Memory<'a>] {
        &self.memories
    }

    fn locate(&self, slot: SlotRef) -> Result<(usize, usize)> {
        let memory = self
            .memories
            .get(usize::from(slot.memory))
            .ok_or(Error::InvalidParameters)?;
        if usize::from(slot.index) >= memory.slots.len() {
            return Err(Error::InvalidParameters);
        }
        Ok((usize::from(slot.memory), usize::from(slot.index)))
    }

    /// Look up a slot
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameters` for an unknown reference.
    pub fn slot(&self, slot: SlotRef) -> Result<&Slot> {
        let (m, i) = self.locate(slot)?;
        Ok(&self.memories[m].slots[i])
    }

    /// Role of the memory holding `slot`
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameters` for an unknown reference.
    pub fn role_of(&self, slot: SlotRef) -> Result<MemoryRole> {
        let (m, _) = self.locate(slot)?;
        Ok(self.memories[m].role())
    }

    /// Write granularity of the memory holding `slot`
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameters` for an unknown reference.
    pub fn granule(&self, slot: SlotRef) -> Result<usize> {
        let (m, _) = self.locate(slot)?;
        Ok(self.memories[m].driver.write_size())
    }

    /// Every slot, primary memory first
    #[must_use]
    pub fn slots(&self) -> SlotIter<'_, 'a> {
        SlotIter {
            memories: &self.memories,
            memory: 0,
            index: 0,
        }
    }

    /// First slot whose content includes `content`
    #[must_use]
    pub fn find(&self, content: ContentType) -> Option<SlotRef> {
        self.slots()
            .find(|(_, slot)| slot.content().contains(content))
            .map(|(slot_ref, _)| slot_ref)
    }

    /// Number of slots whose content includes `content`
    #[must_use]
    pub fn count(&self, content: ContentType) -> usize {
        self.slots()
            .filter(|(_, slot)| slot.content().contains(content))
            .count()
    }

    /// Bytes waiting in the write buffer
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len
    }

    /// Initialize every driver
    ///
    /// # Errors
    ///
    /// Returns `Error::DriverFailure` if a driver fails to come up.
    pub fn init(&mut self) -> Result<()> {
        for m in 0..self.memories.len() {
            let result = match &mut self.memories[m].driver {
                Driver::Flash(flash) => flash.init().and_then(|()| wait_idle(&**flash)),
                Driver::File(fs) => fs.init(),
            };
            self.check(m, result)?;
        }
        Ok(())
    }

    fn check<T>(&mut self, memory: usize, result: HalResult<T>) -> Result<T> {
        result.map_err(|e| {
            self.cleanup(memory);
            Error::from(e)
        })
    }

    /// Read `buffer.len()` bytes at `offset` within `slot`
    ///
    /// Bytes past the end of a file-backed slot read as erased (`0xFF`).
    ///
    /// # Errors
    ///
    /// - `InvalidLength`: range exceeds the slot
    /// - `DriverFailure`: the driver failed; the memory has been cleaned up
    pub fn read(&mut self, slot: SlotRef, offset: u32, buffer: &mut [u8]) -> Result<()> {
        let (m, i) = self.locate(slot)?;
        check_range(&self.memories[m].slots[i], offset, buffer.len())?;

        let memory = &mut self.memories[m];
        let result = match &mut memory.driver {
            Driver::Flash(flash) => {
                let address = memory.slots[i].address().ok_or(Error::UnknownSlotType)?;
                flash.read(address + offset, buffer)
            }
            Driver::File(fs) => file_handle(&mut **fs, &mut memory.slots[i], OpenMode::Read)
                .and_then(|handle| fs.read(handle, offset, buffer))
                .map(|count| buffer[count..].fill(0xFF)),
        };
        self.check(m, result)
    }

    /// Buffered write of `data` at `offset` within `slot`
    ///
    /// # Errors
    ///
    /// - `InvalidLength`: range exceeds the slot
    /// - `InvalidAddress`: a new run does not start on a granule boundary
    /// - `InvalidParameters`: bytes are pending for a different position
    /// - `DriverFailure`: the driver failed; buffered bytes are discarded
    pub fn write(&mut self, slot: SlotRef, offset: u32, data: &[u8], flag: WriteFlag) -> Result<()> {
        let (m, i) = self.locate(slot)?;
        check_range(&self.memories[m].slots[i], offset, data.len())?;

        if self.buffer.is_pending() {
            if self.buffer.target != slot || self.buffer.next_offset() != u64::from(offset) {
                return Err(Error::InvalidParameters);
            }
        } else {
            let granule = self.memories[m].driver.write_size();
            if offset as usize % granule != 0 {
                return Err(Error::InvalidAddress);
            }
            self.buffer.start(slot, offset, granule);
        }

        let mut rest = data;
        while !rest.is_empty() {
            let taken = self.buffer.fill(rest);
            rest = &rest[taken..];
            if self.buffer.is_full() {
                self.flush()?;
            }
        }

        if flag == WriteFlag::Force && self.buffer.is_pending() {
            self.buffer.pad();
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let (m, i) = self.locate(self.buffer.target)?;
        let offset = self.buffer.offset;
        let granule = self.buffer.granule;
        if let Err(e) = check_range(&self.memories[m].slots[i], offset, granule) {
            self.buffer.discard();
            return Err(e);
        }

        let memory = &mut self.memories[m];
        let data = &self.buffer.data[..granule];
        let result = match &mut memory.driver {
            Driver::Flash(flash) => {
                let address = memory.slots[i].address().ok_or(Error::UnknownSlotType)?;
                flash
                    .write(address + offset, data)
                    .and_then(|()| wait_idle(&**flash))
            }
            Driver::File(fs) => file_handle(&mut **fs, &mut memory.slots[i], OpenMode::ReadWrite)
                .and_then(|handle| fs.write(handle, offset, data)),
        };
        self.check(m, result)?;
        self.buffer.advance();
        Ok(())
    }

    /// Erase `len` bytes at `offset` within `slot`
    ///
    /// Flash erases whole sectors, so the range is rounded up to the end of
    /// the sector holding its last byte.
    ///
    /// # Errors
    ///
    /// - `InvalidLength`: range exceeds the slot
    /// - `InvalidAddress`: `offset` is not a sector boundary (flash)
    /// - `DriverFailure`: the driver failed; the memory has been cleaned up
    pub fn erase(&mut self, slot: SlotRef, offset: u32, len: u32) -> Result<()> {
        let (m, i) = self.locate(slot)?;
        check_range(&self.memories[m].slots[i], offset, len as usize)?;
        if len == 0 {
            return Ok(());
        }

        let memory = &mut self.memories[m];
        let result = match &mut memory.driver {
            Driver::Flash(flash) => {
                let start = memory.slots[i].address().ok_or(Error::UnknownSlotType)? + offset;
                if !flash.is_sector_addr(start) {
                    return Err(Error::InvalidAddress);
                }
                erase_sectors(&mut **flash, start, u64::from(start) + u64::from(len))
            }
            Driver::File(fs) => file_handle(&mut **fs, &mut memory.slots[i], OpenMode::ReadWrite)
                .and_then(|handle| fs.erase(handle, offset, len)),
        };
        self.check(m, result)
    }

    /// Stream `len` bytes from the start of `src` to the start of `dst`
    ///
    /// The destination must already be erased.
    ///
    /// # Errors
    ///
    /// Any error of [`Storage::read`] or [`Storage::write`];
    /// `InvalidParameters` if `src == dst`.
    pub fn copy(&mut self, src: SlotRef, dst: SlotRef, len: u32) -> Result<()> {
        if src == dst {
            return Err(Error::InvalidParameters);
        }
        check_range(self.slot(src)?, 0, len as usize)?;
        check_range(self.slot(dst)?, 0, len as usize)?;

        let mut chunk = [0u8; COPY_CHUNK_SIZE];
        let mut offset = 0u32;
        while offset < len {
            let count = COPY_CHUNK_SIZE.min((len - offset) as usize);
            self.read(src, offset, &mut chunk[..count])?;
            self.write(dst, offset, &chunk[..count], WriteFlag::Buffered)?;
            offset += count as u32;
        }
        self.write(dst, offset, &[], WriteFlag::Force)
    }

    /// Drop buffered bytes without writing them
    pub fn discard(&mut self) {
        self.buffer.discard();
    }

    /// Close every open file handle
    ///
    /// # Errors
    ///
    /// Returns `Error::DriverFailure` if any close failed; every handle is
    /// released regardless.
    pub fn close_all(&mut self) -> Result<()> {
        let mut result = Ok(());
        for memory in &mut self.memories {
            if let Driver::File(fs) = &mut memory.driver {
                for slot in &mut memory.slots {
                    if let Some((handle, _)) = slot.handle.take() {
                        if fs.close(handle).is_err() {
                            result = Err(Error::DriverFailure);
                        }
                    }
                }
            }
        }
        result
    }

    /// Leave `memory` in a known state after an I/O failure
    pub fn cleanup(&mut self, memory: usize) {
        self.buffer.discard();
        let Some(memory) = self.memories.get_mut(memory) else {
            return;
        };
        match &mut memory.driver {
            Driver::Flash(flash) => {
                let _ = flash.deinit();
            }
            Driver::File(fs) => {
                for slot in &mut memory.slots {
                    if let Some((handle, _)) = slot.handle.take() {
                        let _ = fs.close(handle);
                    }
                }
            }
        }
    }

    /// Close files and de-initialize every driver
    ///
    /// # Errors
    ///
    /// Returns `Error::DriverFailure` if any driver reported an error; all
    /// drivers are released regardless.
    pub fn shutdown(&mut self) -> Result<()> {
        self.buffer.discard();
        let mut result = self.close_all();
        for memory in &mut self.memories {
            let released = match &mut memory.driver {
                Driver::Flash(flash) => flash.deinit(),
                Driver::File(fs) => fs.deinit(),
            };
            if released.is_err() {
                result = Err(Error::DriverFailure);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_fill_and_pad() {
        let mut buffer = WriteBuffer::new();
        buffer.start(SlotRef::new(0, 1), 32, 16);
        assert_eq!(buffer.fill(&[1; 10]), 10);
        assert_eq!(buffer.fill(&[2; 10]), 6);
        assert!(buffer.is_full());
        buffer.advance();
        assert_eq!(buffer.next_offset(), 48);

        buffer.fill(&[3; 3]);
        buffer.pad();
        assert_eq!(&buffer.data[..4], &[3, 3, 3, 0]);
        assert!(buffer.is_full());
    }
}
