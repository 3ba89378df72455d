// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Bootloader sequencing
//!
//! This crate turns the update engine into a boot decision:
//!
//! - **Vector**: reset vector plausibility check before hand-off
//! - **State**: the boot state machine (verify, select, transfer, fallback)
//! - **Launch**: the architecture-specific jump into the application
//!
//! The board support package builds a [`q_update::BootContext`] from its
//! settings and drivers and calls [`boot`]. Everything up to the final
//! jump is host-testable through [`BootMachine::run`].

#![no_std]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod launch;
pub mod state;
pub mod vector;

pub use state::{BootMachine, BootOutcome, BootState};
pub use vector::{check_reset_vector, validate_reset_vector};

use q_common::log_warn;
use q_update::BootContext;

/// Run the boot state machine and hand off or halt
///
/// Drivers are released before the jump. Never returns.
pub fn boot(ctx: &mut BootContext<'_>) -> ! {
    let outcome = BootMachine::new(ctx).run();
    if ctx.shutdown().is_err() {
        log_warn!(ctx.log, "boot", "driver shutdown reported an error");
    }
    match outcome {
        BootOutcome::Run { address } => launch::jump_to_application(address),
        BootOutcome::Halt(_) => launch::halt(),
    }
}
