// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Integration tests for q-boot
//!
//! The state machine runs against RAM-backed flash with images produced by
//! `ImageBuilder`; each image carries a Cortex-M style vector table right
//! after the 64-byte header.

mod fixtures {
    use q_common::{BootPolicy, MemoryKind, MemoryRole, MemorySettings, Settings, SlotSettings, UpdateConfig, Version};
    use q_crypto::{AesCbc, Crc32};
    use q_hal::sim::RamFlash;
    use q_update::builder::ImageBuilder;
    use q_update::{Backends, StandardHeader};

    pub const FLASH_BASE: u32 = 0x0800_0000;
    pub const SLOT_SIZE: u32 = 0x8000;
    pub const APP: u32 = FLASH_BASE;
    pub const UPDATE: u32 = FLASH_BASE + SLOT_SIZE;
    pub const BACKUP: u32 = FLASH_BASE + 2 * SLOT_SIZE;
    pub const VECTOR_TABLE: u32 = 0x40;

    pub fn flash() -> RamFlash {
        RamFlash::new(FLASH_BASE, 3 * SLOT_SIZE, 0x1000, 16)
    }

    pub fn settings(fallback: bool, anti_rollback: bool) -> Settings {
        let mut slots = vec![
            SlotSettings::Direct { address: APP, size: SLOT_SIZE },
            SlotSettings::Direct { address: UPDATE, size: SLOT_SIZE },
        ];
        if fallback {
            slots.push(SlotSettings::Direct { address: BACKUP, size: SLOT_SIZE });
        }
        let primary = MemorySettings::with_slots(MemoryRole::Primary, MemoryKind::Flash, &slots).unwrap();
        let policy = BootPolicy {
            fallback,
            anti_rollback,
            ..BootPolicy::DEFAULT
        };
        Settings::new(primary, policy).with_update_config(UpdateConfig {
            vector_table_offset: VECTOR_TABLE,
            chunk_size: 256,
        })
    }

    pub fn backends<'a>(hash: &'a mut Crc32, cipher: &'a mut AesCbc) -> Backends<'a> {
        Backends {
            hash,
            cipher,
            codec: &StandardHeader,
        }
    }

    /// Payload starting with `[initial SP][reset vector]`
    pub fn firmware(reset_vector: u32, len: usize, seed: u8) -> Vec<u8> {
        let mut payload: Vec<u8> = (0..len).map(|i| (i as u8) ^ seed).collect();
        payload[..4].copy_from_slice(&0x2000_8000u32.to_le_bytes());
        payload[4..8].copy_from_slice(&reset_vector.to_le_bytes());
        payload
    }

    /// Image bootable from the application slot
    pub fn bootable(index: u32, version: Version, seed: u8) -> Vec<u8> {
        let payload = firmware(APP + VECTOR_TABLE + 0x101, 512, seed);
        ImageBuilder::new(index, version, &payload).build().unwrap()
    }
}

mod vector_tests {
    use super::fixtures::*;
    use proptest::prelude::*;
    use q_boot::{check_reset_vector, validate_reset_vector};
    use q_common::{Error, Version};
    use q_crypto::{AesCbc, Crc32};
    use q_update::builder::ImageBuilder;
    use q_update::{BootContext, Driver, SlotRef};

    const APP_SLOT: SlotRef = SlotRef::new(0, 0);

    fn check(flash: &mut q_hal::sim::RamFlash) -> Result<u32, Error> {
        let settings = settings(false, false);
        let (mut hash, mut cipher) = (Crc32::new(), AesCbc::new());
        let mut ctx =
            BootContext::new(&settings, Driver::Flash(flash), None, backends(&mut hash, &mut cipher)).unwrap();
        check_reset_vector(&mut ctx, APP_SLOT)
    }

    #[test]
    fn test_valid_vector() {
        let mut flash = flash();
        flash.load(APP, &bootable(1, Version::new(1, 0, 0), 0));
        assert_eq!(check(&mut flash), Ok(APP + VECTOR_TABLE + 0x101));
    }

    #[test]
    fn test_erased_slot_rejected() {
        let mut flash = flash();
        assert_eq!(check(&mut flash), Err(Error::ResetVectorInvalid));
    }

    #[test]
    fn test_vector_outside_slot_rejected() {
        let payload = firmware(UPDATE + 0x200, 64, 0);
        let mut flash = flash();
        flash.load(APP, &ImageBuilder::new(1, Version::new(1, 0, 0), &payload).build().unwrap());
        assert_eq!(check(&mut flash), Err(Error::ResetVectorInvalid));
    }

    #[test]
    fn test_vector_below_slot_rejected() {
        let payload = firmware(APP - 4, 64, 0);
        let mut flash = flash();
        flash.load(APP, &ImageBuilder::new(1, Version::new(1, 0, 0), &payload).build().unwrap());
        assert_eq!(check(&mut flash), Err(Error::ResetVectorInvalid));
    }

    proptest! {
        #[test]
        fn prop_erased_word_always_rejected(address in any::<u32>(), size in any::<u32>()) {
            prop_assert_eq!(
                validate_reset_vector(0xFFFF_FFFF, address, size),
                Err(Error::ResetVectorInvalid)
            );
        }

        #[test]
        fn prop_in_range_accepted(address in 0u32..0xF000_0000, size in 1u32..0x0100_0000, at in any::<prop::sample::Index>()) {
            let vector = address + at.index(size as usize) as u32;
            prop_assert!(validate_reset_vector(vector, address, size).is_ok());
        }

        #[test]
        fn prop_out_of_range_rejected(address in 0x1000u32..0xF000_0000, size in 1u32..0x0100_0000, below in any::<bool>()) {
            let vector = if below { address - 1 } else { address + size };
            prop_assert_eq!(
                validate_reset_vector(vector, address, size),
                Err(Error::ResetVectorInvalid)
            );
        }
    }
}

mod state_tests {
    use super::fixtures::*;
    use q_boot::{BootMachine, BootOutcome, BootState};
    use q_common::{Error, Settings, Version};
    use q_crypto::{AesCbc, Crc32};
    use q_hal::sim::RamFlash;
    use q_update::builder::ImageBuilder;
    use q_update::header::ImageHeader;
    use q_update::{check_image, BootContext, Driver, SlotRef};

    const APP_SLOT: SlotRef = SlotRef::new(0, 0);
    const UPDATE_SLOT: SlotRef = SlotRef::new(0, 1);
    const BACKUP_SLOT: SlotRef = SlotRef::new(0, 2);

    struct Boot {
        outcome: BootOutcome,
        history: Vec<BootState>,
        installed: Result<ImageHeader, Error>,
    }

    fn boot(flash: &mut RamFlash, settings: &Settings) -> Boot {
        let (mut hash, mut cipher) = (Crc32::new(), AesCbc::new());
        let mut ctx =
            BootContext::new(settings, Driver::Flash(flash), None, backends(&mut hash, &mut cipher)).unwrap();
        let mut machine = BootMachine::new(&mut ctx);
        let outcome = machine.run();
        let history = machine.history().to_vec();
        assert!(machine.state().is_terminal());
        drop(machine);

        // Whatever the machine decided, the slot must still be readable.
        ctx.storage.init().unwrap();
        let installed = check_image(&mut ctx, APP_SLOT);
        Boot {
            outcome,
            history,
            installed,
        }
    }

    fn run_at_app() -> BootOutcome {
        BootOutcome::Run {
            address: APP + VECTOR_TABLE,
        }
    }

    #[test]
    fn test_no_candidate_runs_current() {
        let mut flash = flash();
        flash.load(APP, &bootable(3, Version::new(1, 0, 0), 1));

        let result = boot(&mut flash, &settings(false, false));
        assert_eq!(result.outcome, run_at_app());
        assert_eq!(
            result.history,
            vec![
                BootState::Init,
                BootState::CheckCurrentApp,
                BootState::SelectCandidate,
                BootState::Run,
            ]
        );
        assert!(flash.writes().is_empty());
    }

    #[test]
    fn test_newer_candidate_installed() {
        let mut flash = flash();
        flash.load(APP, &bootable(3, Version::new(1, 0, 0), 1));
        let update = bootable(4, Version::new(1, 1, 0), 2);
        flash.load(UPDATE, &update);

        let result = boot(&mut flash, &settings(false, false));
        assert_eq!(result.outcome, run_at_app());
        assert_eq!(result.installed.map(|h| h.img_index), Ok(4));
        assert_eq!(
            result.history,
            vec![
                BootState::Init,
                BootState::CheckCurrentApp,
                BootState::SelectCandidate,
                BootState::Verify(UPDATE_SLOT),
                BootState::Transfer(UPDATE_SLOT),
                BootState::VerifyTransferred,
                BootState::CommitAndRun,
                BootState::Run,
            ]
        );
        assert_eq!(flash.contents(APP, update.len()), &update[..]);
        // The staged image is left in place.
        assert_eq!(flash.contents(UPDATE, update.len()), &update[..]);
    }

    #[test]
    fn test_second_boot_is_stable() {
        let mut flash = flash();
        flash.load(APP, &bootable(3, Version::new(1, 0, 0), 1));
        flash.load(UPDATE, &bootable(4, Version::new(1, 1, 0), 2));
        let settings = settings(false, false);

        boot(&mut flash, &settings);
        flash.clear_log();
        let second = boot(&mut flash, &settings);
        assert_eq!(second.outcome, run_at_app());
        assert!(!second.history.contains(&BootState::Transfer(UPDATE_SLOT)));
        assert!(flash.writes().is_empty());
    }

    #[test]
    fn test_corrupt_candidate_ignored() {
        let mut flash = flash();
        let app = bootable(3, Version::new(1, 0, 0), 1);
        flash.load(APP, &app);
        flash.load(UPDATE, &bootable(4, Version::new(1, 1, 0), 2));
        flash.corrupt(UPDATE + 300);

        let result = boot(&mut flash, &settings(false, false));
        assert_eq!(result.outcome, run_at_app());
        assert_eq!(result.history[3], BootState::Verify(UPDATE_SLOT));
        assert_eq!(result.history[4], BootState::Run);
        assert_eq!(flash.contents(APP, app.len()), &app[..]);
    }

    #[test]
    fn test_anti_rollback_keeps_current() {
        let mut flash = flash();
        flash.load(APP, &bootable(5, Version::new(1, 0, 0), 1));
        flash.load(UPDATE, &bootable(6, Version::new(0, 9, 0), 2));

        let result = boot(&mut flash, &settings(false, true));
        assert_eq!(result.outcome, run_at_app());
        assert_eq!(result.installed.map(|h| h.img_index), Ok(5));
    }

    #[test]
    fn test_invalid_app_halts_without_fallback() {
        let mut flash = flash();
        flash.load(APP, &bootable(3, Version::new(1, 0, 0), 1));
        flash.corrupt(APP + 100);

        let result = boot(&mut flash, &settings(false, false));
        assert_eq!(result.outcome, BootOutcome::Halt(Error::NoValidImage));
        assert_eq!(
            result.history.last(),
            Some(&BootState::ErrorHalt(Error::NoValidImage))
        );
    }

    #[test]
    fn test_empty_flash_halts() {
        let mut flash = flash();
        let result = boot(&mut flash, &settings(true, false));
        assert_eq!(result.outcome, BootOutcome::Halt(Error::NoValidImage));
        assert!(result.history.contains(&BootState::Fallback));
    }

    #[test]
    fn test_invalid_app_restored_from_backup() {
        let mut flash = flash();
        let backup = bootable(2, Version::new(1, 0, 0), 7);
        flash.load(APP, &bootable(3, Version::new(1, 0, 0), 1));
        flash.corrupt(APP + 100);
        flash.load(BACKUP, &backup);

        let result = boot(&mut flash, &settings(true, false));
        assert_eq!(result.outcome, run_at_app());
        assert_eq!(result.installed.map(|h| h.img_index), Ok(2));
        assert_eq!(
            result.history,
            vec![
                BootState::Init,
                BootState::CheckCurrentApp,
                BootState::Fallback,
                BootState::VerifyTransferred,
                BootState::CommitAndRun,
                BootState::Run,
            ]
        );
    }

    #[test]
    fn test_write_fault_during_backup_keeps_running_image() {
        let mut flash = flash();
        let app = bootable(3, Version::new(1, 0, 0), 1);
        flash.load(APP, &app);
        flash.load(UPDATE, &bootable(4, Version::new(1, 1, 0), 2));
        // Backing up the running image is the first write of the transfer.
        flash.fail_writes_after(0);

        let result = boot(&mut flash, &settings(true, false));
        assert_eq!(result.outcome, run_at_app());
        assert_eq!(result.installed.map(|h| h.img_index), Ok(3));
        assert_eq!(
            result.history,
            vec![
                BootState::Init,
                BootState::CheckCurrentApp,
                BootState::SelectCandidate,
                BootState::Verify(UPDATE_SLOT),
                BootState::Transfer(UPDATE_SLOT),
                BootState::VerifyTransferred,
                BootState::Run,
            ]
        );
        assert_eq!(flash.contents(APP, app.len()), &app[..]);
        assert!(flash.erases().iter().all(|(address, _)| *address >= BACKUP));
    }

    #[test]
    fn test_bad_reset_vector_falls_back_once() {
        let mut flash = flash();
        let app = bootable(3, Version::new(1, 0, 0), 1);
        flash.load(APP, &app);
        // Valid image, but its reset vector is erased flash.
        let payload = firmware(0xFFFF_FFFF, 512, 2);
        flash.load(
            UPDATE,
            &ImageBuilder::new(4, Version::new(1, 1, 0), &payload).build().unwrap(),
        );

        let result = boot(&mut flash, &settings(true, false));
        assert_eq!(result.outcome, run_at_app());
        assert_eq!(result.installed.map(|h| h.img_index), Ok(3));
        assert_eq!(
            result.history.iter().filter(|s| **s == BootState::Fallback).count(),
            1
        );
        assert_eq!(flash.contents(APP, app.len()), &app[..]);
        assert_eq!(flash.contents(BACKUP, app.len()), &app[..]);
    }

    #[test]
    fn test_bad_reset_vector_without_fallback_halts() {
        let mut flash = flash();
        let payload = firmware(0xFFFF_FFFF, 512, 2);
        flash.load(APP, &ImageBuilder::new(4, Version::new(1, 1, 0), &payload).build().unwrap());

        let result = boot(&mut flash, &settings(false, false));
        assert_eq!(result.outcome, BootOutcome::Halt(Error::ResetVectorInvalid));
    }

    #[test]
    fn test_backup_never_selected_over_newer_update() {
        let mut flash = flash();
        flash.load(APP, &bootable(3, Version::new(1, 0, 0), 1));
        flash.load(UPDATE, &bootable(5, Version::new(1, 0, 0), 2));
        flash.load(BACKUP, &bootable(4, Version::new(1, 0, 0), 3));

        let result = boot(&mut flash, &settings(true, false));
        assert_eq!(result.installed.map(|h| h.img_index), Ok(5));
        assert!(result.history.contains(&BootState::Transfer(UPDATE_SLOT)));
        assert!(!result.history.contains(&BootState::Transfer(BACKUP_SLOT)));
    }

    #[test]
    fn test_transitions_logged() {
        let mut flash = flash();
        flash.load(APP, &bootable(3, Version::new(1, 0, 0), 1));

        let settings = settings(false, false);
        let (mut hash, mut cipher) = (Crc32::new(), AesCbc::new());
        let mut ctx = BootContext::new(&settings, Driver::Flash(&mut flash), None, backends(&mut hash, &mut cipher))
            .unwrap();
        BootMachine::new(&mut ctx).run();
        assert!(ctx.log.contains("boot", "SelectCandidate -> Run"));
        assert!(ctx.log.contains("boot", "running m0s0"));
    }
}
