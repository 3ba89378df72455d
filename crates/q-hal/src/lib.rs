// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Hardware Abstraction Layer for the update engine
//!
//! The update engine never touches hardware directly. It consumes two
//! capability sets, chosen at configuration time:
//!
//! 1. [`FlashDriver`]: sector-erasable flash with a minimum write granularity
//! 2. [`FsDriver`]: handle-keyed files on a filesystem
//!
//! All calls are synchronous. A driver reporting "busy" is polled, never
//! awaited.
//!
//! # Features
//!
//! - `sim`: RAM-backed [`sim::RamFlash`] and [`sim::RamFs`] that record every
//!   call, for host tests

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

cfg_if::cfg_if! {
    if #[cfg(feature = "sim")] {
        extern crate std;
        pub mod sim;
    }
}

pub mod error;
pub mod traits;

pub use error::{HalError, HalResult};
pub use traits::*;
