// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Bootloader settings
//!
//! Settings describe the storage topology (memories and their slots), the
//! pre-shared image key and the policy switches the update engine honors.
//! They are supplied once at boot, validated by the slot registry and never
//! changed afterwards.
//!
//! The policy switches are modelled as a runtime [`BootPolicy`] rather than
//! cargo features so one bootloader build can be exercised under every
//! policy on the host.

use heapless::Vec;

use crate::errors::{Error, Result};

/// Maximum number of memories (internal + optional external)
pub const MAX_MEMORIES: usize = 2;

/// Maximum number of slots per memory
pub const MAX_SLOTS: usize = 3;

/// Role of a memory in the boot topology
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryRole {
    /// Internal memory holding the executable application
    Primary,
    /// Optional external memory holding staged images
    Secondary,
}

/// Storage technology behind a memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryKind {
    /// Memory-mapped or SPI flash
    Flash,
    /// Files on a filesystem
    FileSystem,
}

/// Location of one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotSettings {
    /// Flash-mapped region
    Direct {
        /// Absolute start address (must be a sector boundary)
        address: u32,
        /// Region size in bytes
        size: u32,
    },
    /// Path-backed slot on a filesystem
    File {
        /// File path understood by the filesystem driver
        path: &'static str,
        /// Maximum image size the file may hold
        size: u32,
    },
}

impl SlotSettings {
    /// Size of the slot in bytes
    #[must_use]
    pub const fn size(&self) -> u32 {
        match self {
            Self::Direct { size, .. } | Self::File { size, .. } => *size,
        }
    }

    /// Memory kind this slot location belongs to
    #[must_use]
    pub const fn kind(&self) -> MemoryKind {
        match self {
            Self::Direct { .. } => MemoryKind::Flash,
            Self::File { .. } => MemoryKind::FileSystem,
        }
    }
}

/// Settings of one memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySettings {
    /// Role of the memory
    pub role: MemoryRole,
    /// Storage technology
    pub kind: MemoryKind,
    /// Ordered slot list (position determines content type)
    pub slots: Vec<SlotSettings, MAX_SLOTS>,
}

impl MemorySettings {
    /// Create settings with an empty slot list
    #[must_use]
    pub const fn new(role: MemoryRole, kind: MemoryKind) -> Self {
        Self {
            role,
            kind,
            slots: Vec::new(),
        }
    }

    /// Create settings from a slot list
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameters` if more than [`MAX_SLOTS`] slots are given.
    pub fn with_slots(role: MemoryRole, kind: MemoryKind, slots: &[SlotSettings]) -> Result<Self> {
        let slots = Vec::from_slice(slots).map_err(|()| Error::InvalidParameters)?;
        Ok(Self { role, kind, slots })
    }

    /// Append a slot
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameters` when the slot list is full.
    pub fn push_slot(&mut self, slot: SlotSettings) -> Result<()> {
        self.slots.push(slot).map_err(|_| Error::InvalidParameters)
    }
}

/// Behavioral switches of the update engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootPolicy {
    /// Update images are staged in a secondary (external) memory
    pub external_memory: bool,
    /// Keep a backup slot to revert to when an update fails
    pub fallback: bool,
    /// Candidates must also carry a newer firmware version
    pub anti_rollback: bool,
    /// Images in the secondary memory are AES-CBC encrypted
    pub external_encryption: bool,
}

impl BootPolicy {
    /// Everything disabled: single internal memory, no fallback
    pub const DEFAULT: Self = Self {
        external_memory: false,
        fallback: false,
        anti_rollback: false,
        external_encryption: false,
    };
}

impl Default for BootPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Update engine tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateConfig {
    /// Offset of the vector table inside the application slot
    pub vector_table_offset: u32,
    /// Streaming chunk size (multiple of the cipher block size)
    pub chunk_size: usize,
}

impl UpdateConfig {
    /// Default configuration
    pub const DEFAULT: Self = Self {
        vector_table_offset: 0,
        chunk_size: 512,
    };
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Complete bootloader settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Memory descriptions, index 0 is the primary memory
    pub memories: Vec<MemorySettings, MAX_MEMORIES>,
    /// Pre-shared image decryption key
    pub psk: &'static [u8],
    /// Policy switches
    pub policy: BootPolicy,
    /// Engine tuning
    pub update: UpdateConfig,
}

impl Settings {
    /// Create settings for a primary memory only
    #[must_use]
    pub fn new(primary: MemorySettings, policy: BootPolicy) -> Self {
        let mut memories = Vec::new();
        // Capacity is at least one.
        let _ = memories.push(primary);
        Self {
            memories,
            psk: &[],
            policy,
            update: UpdateConfig::DEFAULT,
        }
    }

    /// Add the secondary (external) memory
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameters` if a secondary memory is already present.
    pub fn with_secondary(mut self, secondary: MemorySettings) -> Result<Self> {
        self.memories
            .push(secondary)
            .map_err(|_| Error::InvalidParameters)?;
        Ok(self)
    }

    /// Set the pre-shared key
    #[must_use]
    pub fn with_psk(mut self, psk: &'static [u8]) -> Self {
        self.psk = psk;
        self
    }

    /// Set the engine tuning
    #[must_use]
    pub fn with_update_config(mut self, update: UpdateConfig) -> Self {
        self.update = update;
        self
    }

    /// Validate settings that do not depend on drivers
    ///
    /// # Errors
    ///
    /// - `Error::InvalidParameters` when memory roles are out of order, the
    ///   secondary memory is present without `external_memory` (or missing
    ///   with it), or the chunk size is not a positive multiple of 16.
    pub fn validate(&self) -> Result<()> {
        let primary = self.memories.first().ok_or(Error::InvalidParameters)?;
        if primary.role != MemoryRole::Primary {
            return Err(Error::InvalidParameters);
        }

        match self.memories.get(1) {
            Some(secondary) => {
                if secondary.role != MemoryRole::Secondary || !self.policy.external_memory {
                    return Err(Error::InvalidParameters);
                }
            }
            None if self.policy.external_memory => return Err(Error::InvalidParameters),
            None => {}
        }

        if self.update.chunk_size == 0 || self.update.chunk_size % 16 != 0 {
            return Err(Error::InvalidParameters);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primary() -> MemorySettings {
        MemorySettings::with_slots(
            MemoryRole::Primary,
            MemoryKind::Flash,
            &[SlotSettings::Direct { address: 0x0800_0000, size: 0x1000 }],
        )
        .unwrap()
    }

    #[test]
    fn test_slot_capacity_enforced() {
        let slot = SlotSettings::Direct { address: 0, size: 0x100 };
        let mut mem = MemorySettings::new(MemoryRole::Primary, MemoryKind::Flash);
        for _ in 0..MAX_SLOTS {
            mem.push_slot(slot).unwrap();
        }
        assert_eq!(mem.push_slot(slot), Err(Error::InvalidParameters));
    }

    #[test]
    fn test_secondary_requires_external_policy() {
        let secondary = MemorySettings::new(MemoryRole::Secondary, MemoryKind::Flash);
        let settings = Settings::new(primary(), BootPolicy::DEFAULT)
            .with_secondary(secondary)
            .unwrap();
        assert_eq!(settings.validate(), Err(Error::InvalidParameters));
    }

    #[test]
    fn test_external_policy_requires_secondary() {
        let policy = BootPolicy { external_memory: true, ..BootPolicy::DEFAULT };
        let settings = Settings::new(primary(), policy);
        assert_eq!(settings.validate(), Err(Error::InvalidParameters));
    }

    #[test]
    fn test_chunk_size_must_be_block_multiple() {
        let settings = Settings::new(primary(), BootPolicy::DEFAULT).with_update_config(UpdateConfig {
            vector_table_offset: 0,
            chunk_size: 100,
        });
        assert_eq!(settings.validate(), Err(Error::InvalidParameters));
    }

    #[test]
    fn test_default_settings_valid() {
        assert!(Settings::new(primary(), BootPolicy::DEFAULT).validate().is_ok());
    }
}
