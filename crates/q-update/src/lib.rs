// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Firmware update engine
//!
//! This crate holds everything between the raw drivers and the boot state
//! machine:
//!
//! - **Registry**: validates the slot topology and assigns slot roles
//! - **Storage**: uniform read/write/erase/copy over flash- or file-backed
//!   slots, with a coalescing writer that only ever issues whole-granule
//!   driver writes
//! - **Selector**: picks the freshest valid update candidate
//! - **Integrity**: header, digest and key checks of a staged image
//! - **Transfer**: single-pass decrypt + digest + write into the
//!   application slot
//!
//! # On-media image layout
//!
//! ```text
//! ┌──────────────┬─────────┬──────────────────┬──────────────┬────────┐
//! │ ImageHeader  │ IV (16) │ Magic block (16) │ Payload      │ Digest │
//! └──────────────┴─────────┴──────────────────┴──────────────┴────────┘
//!                 └─ encrypted slots only ──┘
//! ```
//!
//! # Features
//!
//! - `builder`: host-only [`builder::ImageBuilder`] producing bit-exact
//!   images for tests and tooling

#![no_std]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]

#[cfg(any(test, feature = "builder"))]
extern crate std;

#[cfg(feature = "builder")]
pub mod builder;

pub mod context;
pub mod header;
pub mod integrity;
pub mod memory;
pub mod registry;
pub mod select;
pub mod transfer;

pub use context::{Backends, BootContext};
pub use header::{ImageHeader, ImageHeaderCodec, StandardHeader};
pub use integrity::check_image;
pub use memory::{SlotIter, Storage, WriteFlag};
pub use registry::{register_memory, ContentType, Driver, Memory, Slot, SlotRef};
pub use select::{select_update_slot, Selection};
pub use transfer::transfer;
