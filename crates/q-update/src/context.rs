// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Boot context
//!
//! Everything one boot needs, owned in one place: the storage arena, the
//! pre-shared key, the policy switches, the digest / cipher / header
//! backends and the boot log. Nothing in the engine reaches for global
//! state.

use q_common::constants::{MAX_CHUNK_SIZE, MAX_DIGEST_SIZE};
use q_common::{log_info, BootPolicy, Error, LogBuffer, MemoryRole, Result, Settings, UpdateConfig};
use q_crypto::{CipherAlgo, HashAlgo, PresharedKey};

use crate::header::{ImageHeader, ImageHeaderCodec, MAX_HEADER_SIZE};
use crate::memory::Storage;
use crate::registry::{register_memory, ContentType, Driver, SlotRef};

/// Algorithm backends used by the engine
pub struct Backends<'a> {
    /// Running image digest
    pub hash: &'a mut dyn HashAlgo,
    /// Payload decryption for encrypted slots
    pub cipher: &'a mut dyn CipherAlgo,
    /// Image header parser
    pub codec: &'a dyn ImageHeaderCodec,
}

/// State shared by every stage of one boot
pub struct BootContext<'a> {
    /// Registered memories and the write buffer
    pub storage: Storage<'a>,
    /// Policy switches
    pub policy: BootPolicy,
    /// Update tunables
    pub config: UpdateConfig,
    /// Boot log
    pub log: LogBuffer,
    pub(crate) psk: PresharedKey,
    pub(crate) hash: &'a mut dyn HashAlgo,
    pub(crate) cipher: &'a mut dyn CipherAlgo,
    pub(crate) codec: &'a dyn ImageHeaderCodec,
}

impl<'a> BootContext<'a> {
    /// Validate `settings`, register the memories and bring up the drivers
    ///
    /// `secondary` must be given exactly when the settings describe a
    /// secondary memory.
    ///
    /// # Errors
    ///
    /// Any registry error, `InvalidParameters` for an inconsistent
    /// configuration (key, backends, slot roles) and `DriverFailure` if a
    /// driver does not initialize.
    pub fn new(
        settings: &Settings,
        primary: Driver<'a>,
        secondary: Option<Driver<'a>>,
        backends: Backends<'a>,
    ) -> Result<Self> {
        settings.validate()?;
        if settings.update.chunk_size > MAX_CHUNK_SIZE
            || backends.hash.digest_size() > MAX_DIGEST_SIZE
            || backends.codec.header_size() > MAX_HEADER_SIZE
        {
            return Err(Error::InvalidParameters);
        }

        let psk = PresharedKey::new(settings.psk).map_err(|_| Error::InvalidParameters)?;
        if settings.policy.external_encryption && psk.is_empty() {
            return Err(Error::InvalidParameters);
        }

        if settings.memories.len() != 1 + usize::from(secondary.is_some()) {
            return Err(Error::InvalidParameters);
        }

        let mut storage = Storage::new();
        let drivers = core::iter::once(primary).chain(secondary);
        for (index, (memory, driver)) in settings.memories.iter().zip(drivers).enumerate() {
            storage.add(register_memory(index, memory, driver, &settings.policy)?)?;
        }
        check_roles(&storage, &settings.policy)?;
        storage.init()?;

        let mut ctx = Self {
            storage,
            policy: settings.policy,
            config: settings.update,
            log: LogBuffer::new(),
            psk,
            hash: backends.hash,
            cipher: backends.cipher,
            codec: backends.codec,
        };
        log_info!(
            ctx.log,
            "registry",
            "{} memories, {} slots registered",
            ctx.storage.memories().len(),
            ctx.storage.slots().count()
        );
        Ok(ctx)
    }

    /// The running application slot
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameters` if no slot has the role; a
    /// context that passed `new` always has one.
    pub fn application_slot(&self) -> Result<SlotRef> {
        self.storage
            .find(ContentType::APPLICATION)
            .ok_or(Error::InvalidParameters)
    }

    /// The staged update slot
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameters` if no slot has the role.
    pub fn update_slot(&self) -> Result<SlotRef> {
        self.storage
            .find(ContentType::UPDATE)
            .ok_or(Error::InvalidParameters)
    }

    /// The backup slot, when fallback is enabled
    #[must_use]
    pub fn backup_slot(&self) -> Option<SlotRef> {
        if !self.policy.fallback {
            return None;
        }
        self.storage
            .slots()
            .find(|(_, slot)| slot.content() == ContentType::BACKUP)
            .map(|(slot_ref, _)| slot_ref)
    }

    /// Check if `slot` holds an encrypted image
    #[must_use]
    pub fn is_encrypted(&self, slot: SlotRef) -> bool {
        self.policy.external_encryption
            && self.storage.role_of(slot) == Ok(MemoryRole::Secondary)
    }

    /// Digest size of the configured hash
    #[must_use]
    pub fn digest_size(&self) -> usize {
        self.hash.digest_size()
    }

    /// Header size of the configured codec
    #[must_use]
    pub fn header_size(&self) -> usize {
        self.codec.header_size()
    }

    /// Read and parse the header of `slot`
    ///
    /// # Errors
    ///
    /// `HeaderInvalid` on any header defect, or a storage error.
    pub fn read_header(&mut self, slot: SlotRef) -> Result<ImageHeader> {
        let size = self.codec.header_size();
        let mut raw = [0u8; MAX_HEADER_SIZE];
        self.storage.read(slot, 0, &mut raw[..size])?;
        self.codec.parse(&raw[..size])
    }

    /// Release every driver
    ///
    /// # Errors
    ///
    /// Returns `Error::DriverFailure` if a driver failed to shut down.
    pub fn shutdown(&mut self) -> Result<()> {
        self.cipher.deinit();
        let result = self.storage.shutdown();
        log_info!(self.log, "boot", "drivers released");
        result
    }
}

fn check_roles(storage: &Storage<'_>, policy: &BootPolicy) -> Result<()> {
    let application = storage
        .find(ContentType::APPLICATION)
        .ok_or(Error::InvalidParameters)?;
    if storage.count(ContentType::APPLICATION) != 1
        || storage.role_of(application)? != MemoryRole::Primary
        || storage.count(ContentType::UPDATE) != 1
    {
        return Err(Error::InvalidParameters);
    }
    if policy.fallback
        && !storage
            .slots()
            .any(|(_, slot)| slot.content() == ContentType::BACKUP)
    {
        return Err(Error::InvalidParameters);
    }
    Ok(())
}
