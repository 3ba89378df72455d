// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Boot state machine
//!
//! ```text
//! Init -> CheckCurrentApp -> SelectCandidate -+-> Run               (no candidate)
//!                 |                           +-> Verify(slot)
//!                 |                                 |-> Run         (candidate invalid)
//!                 |                                 +-> Transfer(slot) -> VerifyTransferred
//!                 |                                                        |-> CommitAndRun -> Run
//!                 |                                                        |-> Run  (transfer failed, slot intact)
//!                 +-> Fallback / ErrorHalt                                 +-> Fallback / ErrorHalt
//!
//! Fallback -> VerifyTransferred          (backup verified and installed)
//! ```
//!
//! Every handler performs its side effects and returns the next state;
//! [`BootMachine::change_state`] only records it. `Run` re-checks the reset
//! vector before reporting the hand-off address, and a bad vector takes
//! the fallback path like any other defective image. Fallback runs at most
//! once per boot.

use core::fmt;

use heapless::Vec;
use q_common::{log_error, log_info, log_warn, Error};
use q_update::{check_image, select_update_slot, transfer, BootContext, Selection, SlotRef};

use crate::vector::check_reset_vector;

/// Bound on recorded transitions
pub const MAX_HISTORY: usize = 16;

/// Boot states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootState {
    /// Context constructed, nothing checked yet
    Init,
    /// Verify the running application
    CheckCurrentApp,
    /// Look for a newer staged image
    SelectCandidate,
    /// Verify the selected candidate
    Verify(SlotRef),
    /// Install the candidate into the application slot
    Transfer(SlotRef),
    /// Verify the freshly written application slot
    VerifyTransferred,
    /// Release file handles and accept the new image
    CommitAndRun,
    /// Reinstall the backup image
    Fallback,
    /// Hand off to the application (terminal)
    Run,
    /// No bootable image (terminal)
    ErrorHalt(Error),
}

impl BootState {
    /// Check if the machine stops in this state
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Run | Self::ErrorHalt(_))
    }
}

impl fmt::Display for BootState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "Init"),
            Self::CheckCurrentApp => write!(f, "CheckCurrentApp"),
            Self::SelectCandidate => write!(f, "SelectCandidate"),
            Self::Verify(slot) => write!(f, "Verify({slot})"),
            Self::Transfer(slot) => write!(f, "Transfer({slot})"),
            Self::VerifyTransferred => write!(f, "VerifyTransferred"),
            Self::CommitAndRun => write!(f, "CommitAndRun"),
            Self::Fallback => write!(f, "Fallback"),
            Self::Run => write!(f, "Run"),
            Self::ErrorHalt(e) => write!(f, "ErrorHalt({e})"),
        }
    }
}

/// Final decision of one boot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootOutcome {
    /// Jump to the application whose vector table is at `address`
    Run {
        /// Vector table address
        address: u32,
    },
    /// Stop; nothing may be executed
    Halt(Error),
}

/// Sequences verification, selection, transfer and fallback
pub struct BootMachine<'c, 'a> {
    ctx: &'c mut BootContext<'a>,
    state: BootState,
    history: Vec<BootState, MAX_HISTORY>,
    app_verified: bool,
    transfer_failed: bool,
    fallback_attempted: bool,
}

impl<'c, 'a> BootMachine<'c, 'a> {
    /// Create a machine in `Init`
    pub fn new(ctx: &'c mut BootContext<'a>) -> Self {
        let mut history = Vec::new();
        let _ = history.push(BootState::Init);
        Self {
            ctx,
            state: BootState::Init,
            history,
            app_verified: false,
            transfer_failed: false,
            fallback_attempted: false,
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> BootState {
        self.state
    }

    /// Every state entered so far, oldest first
    #[must_use]
    pub fn history(&self) -> &[BootState] {
        &self.history
    }

    /// Check if the backup image has already been tried
    #[must_use]
    pub fn fallback_attempted(&self) -> bool {
        self.fallback_attempted
    }

    fn change_state(&mut self, next: BootState) {
        log_info!(self.ctx.log, "boot", "{} -> {}", self.state, next);
        self.state = next;
        if self.history.push(next).is_err() {
            // Unreachable with the transition graph above.
            self.state = BootState::ErrorHalt(Error::InvalidParameters);
        }
    }

    /// Drive the machine to a terminal state
    pub fn run(&mut self) -> BootOutcome {
        loop {
            if let Some(outcome) = self.step() {
                return outcome;
            }
        }
    }

    /// Execute one state handler
    ///
    /// Returns the outcome once a terminal state has been handled.
    pub fn step(&mut self) -> Option<BootOutcome> {
        let next = match self.state {
            BootState::Init => BootState::CheckCurrentApp,
            BootState::CheckCurrentApp => self.check_current_app(),
            BootState::SelectCandidate => self.select_candidate(),
            BootState::Verify(slot) => self.verify_candidate(slot),
            BootState::Transfer(slot) => self.install(slot),
            BootState::VerifyTransferred => self.verify_transferred(),
            BootState::CommitAndRun => self.commit(),
            BootState::Fallback => self.fallback(),
            BootState::Run => match self.hand_off() {
                Ok(address) => return Some(BootOutcome::Run { address }),
                Err(next) => next,
            },
            BootState::ErrorHalt(e) => {
                log_error!(self.ctx.log, "boot", "halted: {}", e);
                return Some(BootOutcome::Halt(e));
            }
        };
        self.change_state(next);
        None
    }

    /// Fallback if it is enabled and untried, otherwise halt with `error`
    fn recover(&self, error: Error) -> BootState {
        if self.ctx.policy.fallback && !self.fallback_attempted {
            BootState::Fallback
        } else {
            BootState::ErrorHalt(error)
        }
    }

    fn check_current_app(&mut self) -> BootState {
        let Ok(app) = self.ctx.application_slot() else {
            return BootState::ErrorHalt(Error::NoValidImage);
        };
        match check_image(self.ctx, app) {
            Ok(_) => {
                self.app_verified = true;
                BootState::SelectCandidate
            }
            Err(_) => self.recover(Error::NoValidImage),
        }
    }

    fn select_candidate(&mut self) -> BootState {
        match select_update_slot(self.ctx) {
            Ok(Selection::Current(_)) => BootState::Run,
            Ok(Selection::Update(slot)) => BootState::Verify(slot),
            Err(e) => BootState::ErrorHalt(e),
        }
    }

    fn verify_candidate(&mut self, slot: SlotRef) -> BootState {
        match check_image(self.ctx, slot) {
            Ok(_) => BootState::Transfer(slot),
            Err(e) => {
                log_warn!(self.ctx.log, "boot", "candidate {} ignored: {}", slot, e);
                BootState::Run
            }
        }
    }

    fn install(&mut self, slot: SlotRef) -> BootState {
        self.app_verified = false;
        self.transfer_failed = false;
        if let Err(e) = transfer(self.ctx, slot) {
            log_warn!(self.ctx.log, "boot", "transfer from {} failed: {}", slot, e);
            self.transfer_failed = true;
        }
        BootState::VerifyTransferred
    }

    fn verify_transferred(&mut self) -> BootState {
        let Ok(app) = self.ctx.application_slot() else {
            return BootState::ErrorHalt(Error::NoValidImage);
        };
        // A failed transfer de-initializes the driver it failed on.
        if self.ctx.storage.init().is_err() {
            return self.recover(Error::DriverFailure);
        }
        match check_image(self.ctx, app) {
            Ok(_) if self.transfer_failed => {
                self.app_verified = true;
                log_warn!(self.ctx.log, "boot", "update not applied, keeping {}", app);
                BootState::Run
            }
            Ok(_) => {
                self.app_verified = true;
                BootState::CommitAndRun
            }
            Err(_) => self.recover(Error::NoValidImage),
        }
    }

    fn commit(&mut self) -> BootState {
        if self.ctx.storage.close_all().is_err() {
            log_warn!(self.ctx.log, "boot", "file handles not released cleanly");
        }
        log_info!(self.ctx.log, "boot", "update committed");
        BootState::Run
    }

    fn fallback(&mut self) -> BootState {
        self.fallback_attempted = true;
        self.app_verified = false;
        let Some(backup) = self.ctx.backup_slot() else {
            return BootState::ErrorHalt(Error::NoValidImage);
        };
        log_warn!(self.ctx.log, "boot", "falling back to {}", backup);

        // A driver failure earlier in this boot leaves flash de-initialized.
        if self.ctx.storage.init().is_err() {
            return BootState::ErrorHalt(Error::DriverFailure);
        }
        if check_image(self.ctx, backup).is_err() {
            return BootState::ErrorHalt(Error::NoValidImage);
        }
        self.transfer_failed = false;
        if let Err(e) = transfer(self.ctx, backup) {
            log_warn!(self.ctx.log, "boot", "backup reinstall failed: {}", e);
            self.transfer_failed = true;
        }
        BootState::VerifyTransferred
    }

    fn hand_off(&mut self) -> Result<u32, BootState> {
        let app = self
            .ctx
            .application_slot()
            .map_err(|_| BootState::ErrorHalt(Error::NoValidImage))?;

        if !self.app_verified {
            check_image(self.ctx, app).map_err(|_| self.recover(Error::NoValidImage))?;
            self.app_verified = true;
        }

        let entry = check_reset_vector(self.ctx, app).map_err(|e| {
            log_error!(self.ctx.log, "boot", "reset vector rejected: {}", e);
            self.recover(e)
        })?;

        let address = self
            .ctx
            .storage
            .slot(app)
            .ok()
            .and_then(|slot| slot.address())
            .ok_or(BootState::ErrorHalt(Error::UnknownSlotType))?
            + self.ctx.config.vector_table_offset;
        log_info!(self.ctx.log, "boot", "running {} (entry 0x{:08X})", app, entry);
        Ok(address)
    }
}
