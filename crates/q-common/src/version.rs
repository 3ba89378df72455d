// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Firmware version handling
//!
//! Image headers carry the firmware version packed into one word
//! (`major << 16 | minor << 8 | patch`). Anti-rollback compares versions
//! with strict ordering: major > minor > patch.

use core::cmp::Ordering;
use core::fmt;

/// Semantic firmware version
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Version {
    /// Major version (breaking changes)
    pub major: u8,
    /// Minor version (new features)
    pub minor: u8,
    /// Patch version (bug fixes)
    pub patch: u8,
}

impl Version {
    /// Create a new version
    #[must_use]
    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self { major, minor, patch }
    }

    /// Version 0.0.0
    pub const ZERO: Self = Self::new(0, 0, 0);

    /// Unpack from the header word
    #[must_use]
    pub const fn from_packed(value: u32) -> Self {
        Self {
            major: (value >> 16) as u8,
            minor: (value >> 8) as u8,
            patch: value as u8,
        }
    }

    /// Pack into the header word
    #[must_use]
    pub const fn to_packed(&self) -> u32 {
        ((self.major as u32) << 16) | ((self.minor as u32) << 8) | self.patch as u32
    }

    /// Parse `"major.minor.patch"`
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let patch = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(major, minor, patch))
    }

    /// Check if this version is strictly greater than another
    #[must_use]
    pub const fn is_greater_than(&self, other: &Self) -> bool {
        self.to_packed() > other.to_packed()
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_packed().cmp(&other.to_packed())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
