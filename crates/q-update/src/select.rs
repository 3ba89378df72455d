// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Update-candidate selection
//!
//! The running application's header is the baseline. Candidates are
//! visited in priority order (update slot, then backup slot when fallback
//! is enabled) and replace the baseline only when strictly newer. Equal
//! install indices never switch, so a duplicated image cannot cause an
//! update loop.

use heapless::Vec;
use q_common::{log_debug, log_info, log_warn, Result};

use crate::context::BootContext;
use crate::header::ImageHeader;
use crate::registry::SlotRef;

/// Outcome of candidate selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Keep the running image
    Current(SlotRef),
    /// Install the image in this slot
    Update(SlotRef),
}

impl Selection {
    /// The chosen slot
    #[must_use]
    pub const fn slot(&self) -> SlotRef {
        match self {
            Self::Current(slot) | Self::Update(slot) => *slot,
        }
    }
}

/// Check if `candidate` should replace `baseline`
#[must_use]
pub fn is_newer(candidate: &ImageHeader, baseline: &ImageHeader, anti_rollback: bool) -> bool {
    candidate.img_index > baseline.img_index
        && (!anti_rollback || candidate.data_vers.is_greater_than(&baseline.data_vers))
}

/// Candidate slots in priority order
#[must_use]
pub fn candidates(ctx: &BootContext<'_>) -> Vec<SlotRef, 2> {
    let mut list = Vec::new();
    if let Ok(update) = ctx.update_slot() {
        let _ = list.push(update);
    }
    if let Some(backup) = ctx.backup_slot() {
        if !list.contains(&backup) {
            let _ = list.push(backup);
        }
    }
    list
}

/// Pick the freshest valid image
///
/// A candidate whose header cannot be read or parsed is skipped.
///
/// # Errors
///
/// Fails only if the running application's header cannot be read or is
/// invalid.
pub fn select_update_slot(ctx: &mut BootContext<'_>) -> Result<Selection> {
    let current = ctx.application_slot()?;
    let mut best = match ctx.read_header(current) {
        Ok(header) => header,
        Err(e) => {
            log_warn!(ctx.log, "select", "running image header unusable: {}", e);
            return Err(e);
        }
    };
    let mut selection = Selection::Current(current);

    for slot in candidates(ctx) {
        let header = match ctx.read_header(slot) {
            Ok(header) => header,
            Err(e) => {
                log_debug!(ctx.log, "select", "{} skipped: {}", slot, e);
                continue;
            }
        };

        if is_newer(&header, &best, ctx.policy.anti_rollback) {
            log_info!(
                ctx.log,
                "select",
                "{} index {} {} supersedes index {}",
                slot,
                header.img_index,
                header.data_vers,
                best.img_index
            );
            best = header;
            selection = Selection::Update(slot);
        } else {
            log_debug!(ctx.log, "select", "{} index {} not newer", slot, header.img_index);
        }
    }

    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use q_common::Version;

    fn header(index: u32, version: Version) -> ImageHeader {
        ImageHeader::new(index, 16, version)
    }

    #[test]
    fn test_equal_index_never_newer() {
        let v = Version::new(1, 0, 0);
        assert!(!is_newer(&header(5, v), &header(5, v), false));
        assert!(!is_newer(&header(5, Version::new(2, 0, 0)), &header(5, v), true));
    }

    #[test]
    fn test_anti_rollback_requires_version() {
        let current = header(5, Version::new(1, 0, 0));
        let older = header(6, Version::new(0, 9, 0));
        assert!(is_newer(&older, &current, false));
        assert!(!is_newer(&older, &current, true));
        assert!(is_newer(&header(6, Version::new(1, 0, 1)), &current, true));
    }
}
