// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Slot & memory registry
//!
//! Turns externally supplied [`MemorySettings`] into a validated
//! [`Memory`]: a driver plus a fixed-capacity list of [`Slot`]s. The
//! topology is checked once at boot and never resized afterwards.
//!
//! # Slot roles
//!
//! Roles are assigned by position:
//!
//! ```text
//! Primary memory                     Secondary memory
//! ┌───────────────────────────┐      ┌───────────────────────────┐
//! │ slot0  APPLICATION        │      │ slot0  UPDATE (+BACKUP*)  │
//! │ slot1  UPDATE (+BACKUP*)  │ (1)  │ slot1  BACKUP (fallback)  │
//! │ slot2  BACKUP (fallback)  │ (1)  └───────────────────────────┘
//! └───────────────────────────┘
//! (1) only without external memory
//! *   when fallback is disabled the update slot doubles as backup
//! ```

use bitflags::bitflags;
use heapless::Vec;
use q_common::config::{MAX_MEMORIES, MAX_SLOTS};
use q_common::constants::MAX_WRITE_SIZE;
use q_common::{BootPolicy, Error, MemoryKind, MemoryRole, MemorySettings, Result, SlotSettings};
use q_hal::{FileHandle, FlashDriver, FsDriver, OpenMode};

bitflags! {
    /// What a slot holds
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ContentType: u8 {
        /// The running application
        const APPLICATION = 0b001;
        /// A staged update image
        const UPDATE = 0b010;
        /// A known-good image to fall back to
        const BACKUP = 0b100;
    }
}

/// Index of a slot within the storage arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRef {
    /// Memory index (0 = primary, 1 = secondary)
    pub memory: u8,
    /// Slot index within the memory
    pub index: u8,
}

impl SlotRef {
    /// Create a slot reference
    #[must_use]
    pub const fn new(memory: u8, index: u8) -> Self {
        Self { memory, index }
    }
}

impl core::fmt::Display for SlotRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "m{}s{}", self.memory, self.index)
    }
}

/// Driver backing a memory
pub enum Driver<'a> {
    /// Sector-erasable flash
    Flash(&'a mut dyn FlashDriver),
    /// Filesystem
    File(&'a mut dyn FsDriver),
}

impl Driver<'_> {
    /// Memory kind this driver serves
    #[must_use]
    pub fn kind(&self) -> MemoryKind {
        match self {
            Self::Flash(_) => MemoryKind::Flash,
            Self::File(_) => MemoryKind::FileSystem,
        }
    }

    /// Minimum write granularity in bytes
    #[must_use]
    pub fn write_size(&self) -> usize {
        match self {
            Self::Flash(flash) => flash.info().write_size,
            Self::File(fs) => fs.write_size(),
        }
    }
}

/// One image region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    location: SlotSettings,
    content: ContentType,
    memory: u8,
    pub(crate) handle: Option<(FileHandle, OpenMode)>,
}

impl Slot {
    /// Where the slot lives
    #[must_use]
    pub fn location(&self) -> &SlotSettings {
        &self.location
    }

    /// Slot size in bytes
    #[must_use]
    pub fn size(&self) -> u32 {
        self.location.size()
    }

    /// Absolute start address of a flash-mapped slot
    #[must_use]
    pub fn address(&self) -> Option<u32> {
        match self.location {
            SlotSettings::Direct { address, .. } => Some(address),
            SlotSettings::File { .. } => None,
        }
    }

    /// Roles of this slot
    #[must_use]
    pub fn content(&self) -> ContentType {
        self.content
    }

    /// Index of the owning memory
    #[must_use]
    pub fn memory(&self) -> u8 {
        self.memory
    }

    /// Check if a file handle is currently open
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }
}

/// A storage backend partitioned into slots
pub struct Memory<'a> {
    role: MemoryRole,
    pub(crate) driver: Driver<'a>,
    pub(crate) slots: Vec<Slot, MAX_SLOTS>,
}

impl Memory<'_> {
    /// Memory role
    #[must_use]
    pub fn role(&self) -> MemoryRole {
        self.role
    }

    /// Memory kind
    #[must_use]
    pub fn kind(&self) -> MemoryKind {
        self.driver.kind()
    }

    /// Registered slots
    #[must_use]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }
}

/// Content type of the slot at `position` under `policy`
#[must_use]
pub fn content_for(role: MemoryRole, position: usize, policy: &BootPolicy) -> ContentType {
    let update = if policy.fallback {
        ContentType::UPDATE
    } else {
        ContentType::UPDATE | ContentType::BACKUP
    };
    let backup = if policy.fallback {
        ContentType::BACKUP
    } else {
        ContentType::empty()
    };

    match (role, position) {
        (MemoryRole::Primary, 0) => ContentType::APPLICATION,
        (MemoryRole::Primary, 1) if !policy.external_memory => update,
        (MemoryRole::Primary, 2) if !policy.external_memory => backup,
        (MemoryRole::Secondary, 0) => update,
        (MemoryRole::Secondary, 1) => backup,
        _ => ContentType::empty(),
    }
}

fn check_direct_slot(flash: &dyn FlashDriver, address: u32, size: u32) -> Result<()> {
    let info = flash.info();
    if size == 0 || !info.contains(address, size) || !flash.is_sector_addr(address) {
        return Err(Error::InvalidAddress);
    }
    // The end is a sector boundary or the end of the device.
    let end = u64::from(address) + u64::from(size);
    if end != info.end_address() && !flash.is_sector_addr(end as u32) {
        return Err(Error::InvalidAddress);
    }
    Ok(())
}

fn overlaps(a: &SlotSettings, b: &SlotSettings) -> bool {
    match (a, b) {
        (
            SlotSettings::Direct { address: a0, size: a_len },
            SlotSettings::Direct { address: b0, size: b_len },
        ) => {
            let (a0, b0) = (u64::from(*a0), u64::from(*b0));
            a0 < b0 + u64::from(*b_len) && b0 < a0 + u64::from(*a_len)
        }
        (SlotSettings::File { path: a, .. }, SlotSettings::File { path: b, .. }) => a == b,
        _ => false,
    }
}

/// Validate `settings` against `driver` and build the memory
///
/// `index` is the position of the memory in the boot context (0 = primary).
///
/// # Errors
///
/// - `InvalidParameters`: empty slot list, bad index, unusable write size
///   or a file slot that is not a whole number of write granules
/// - `UnknownMemoryType`: driver kind differs from the settings, or the
///   primary memory is not flash
/// - `UnknownSlotType`: a slot location does not fit the memory kind
/// - `InvalidAddress`: a flash slot is empty, off-device or not sector
///   aligned
/// - `SlotsOverlap`: two slots share bytes (or a file path)
pub fn register_memory<'a>(
    index: usize,
    settings: &MemorySettings,
    driver: Driver<'a>,
    policy: &BootPolicy,
) -> Result<Memory<'a>> {
    if index >= MAX_MEMORIES || settings.slots.is_empty() {
        return Err(Error::InvalidParameters);
    }
    if driver.kind() != settings.kind {
        return Err(Error::UnknownMemoryType);
    }
    if settings.role == MemoryRole::Primary && settings.kind != MemoryKind::Flash {
        return Err(Error::UnknownMemoryType);
    }

    let granule = driver.write_size();
    if granule == 0 || granule > MAX_WRITE_SIZE {
        return Err(Error::InvalidParameters);
    }

    let mut slots = Vec::new();
    for (position, location) in settings.slots.iter().enumerate() {
        if location.kind() != settings.kind {
            return Err(Error::UnknownSlotType);
        }
        match (location, &driver) {
            (SlotSettings::Direct { address, size }, Driver::Flash(flash)) => {
                check_direct_slot(&**flash, *address, *size)?;
            }
            (SlotSettings::File { size, .. }, Driver::File(_)) => {
                if *size == 0 || *size % granule as u32 != 0 {
                    return Err(Error::InvalidParameters);
                }
            }
            _ => return Err(Error::UnknownSlotType),
        }

        if settings.slots[..position].iter().any(|other| overlaps(other, location)) {
            return Err(Error::SlotsOverlap);
        }

        slots
            .push(Slot {
                location: *location,
                content: content_for(settings.role, position, policy),
                memory: index as u8,
                handle: None,
            })
            .map_err(|_| Error::InvalidParameters)?;
    }

    Ok(Memory {
        role: settings.role,
        driver,
        slots,
    })
}
