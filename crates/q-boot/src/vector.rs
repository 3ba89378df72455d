// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Reset vector plausibility check
//!
//! A cheap pre-check run before hand-off: the reset handler address in the
//! application's vector table must not be erased flash and must point into
//! the application slot. It does not replace [`q_update::check_image`].

use q_common::constants::{ERASED_WORD, RESET_VECTOR_OFFSET};
use q_common::{Error, Result};
use q_update::{BootContext, SlotRef};

/// Validate a reset vector word against the slot it was read from
///
/// # Errors
///
/// Returns `Error::ResetVectorInvalid` for the erased sentinel or an
/// address outside `[address, address + size)`.
pub fn validate_reset_vector(vector: u32, address: u32, size: u32) -> Result<()> {
    let end = u64::from(address) + u64::from(size);
    if vector == ERASED_WORD || vector < address || u64::from(vector) >= end {
        return Err(Error::ResetVectorInvalid);
    }
    Ok(())
}

/// Read and validate the reset vector of the image in `slot`
///
/// Returns the reset handler address.
///
/// # Errors
///
/// - `ResetVectorInvalid`: erased or out-of-slot vector
/// - `UnknownSlotType`: `slot` is not flash-mapped
/// - `InvalidLength` / `DriverFailure`: the word could not be read
pub fn check_reset_vector(ctx: &mut BootContext<'_>, slot: SlotRef) -> Result<u32> {
    let (address, size) = {
        let slot = ctx.storage.slot(slot)?;
        (slot.address().ok_or(Error::UnknownSlotType)?, slot.size())
    };

    let offset = ctx
        .config
        .vector_table_offset
        .checked_add(RESET_VECTOR_OFFSET)
        .ok_or(Error::InvalidLength)?;
    let mut word = [0u8; 4];
    ctx.storage.read(slot, offset, &mut word)?;

    let vector = u32::from_le_bytes(word);
    validate_reset_vector(vector, address, size)?;
    Ok(vector)
}
