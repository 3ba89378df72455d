// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Common library for the secure firmware-update engine
//!
//! This crate provides the types shared by every layer of the bootloader:
//!
//! - **errors**: the unified error taxonomy and `Result` alias
//! - **config**: memory/slot topology settings and policy switches
//! - **version**: semantic firmware version used for anti-rollback
//! - **log**: fixed-capacity log buffer and `log_*!` macros
//! - **constants**: on-media layout constants shared with the image tool
//!
//! # Features
//!
//! - `std`: Enable standard library support (disabled by default for embedded)
//! - `defmt`: Enable defmt formatting of errors for embedded debugging
//!
//! No heap allocations are performed - all buffers use fixed-size arrays or
//! heapless collections.

#![no_std]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[cfg(feature = "std")]
extern crate std;

pub mod config;
pub mod constants;
pub mod errors;
pub mod log;
pub mod version;

pub use config::{BootPolicy, MemoryKind, MemoryRole, MemorySettings, Settings, SlotSettings, UpdateConfig};
pub use errors::{Error, Result};
pub use log::{LogBuffer, LogLevel};
pub use version::Version;
