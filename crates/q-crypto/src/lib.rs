// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Digest and cipher capabilities for the update engine
//!
//! The update engine consumes two opaque capability sets:
//!
//! - [`HashAlgo`]: streaming `init` / `update` / `finalize` with a fixed
//!   digest size
//! - [`CipherAlgo`]: CBC block decryption given a key and IV
//!
//! This crate defines both traits and ships the default backends:
//!
//! - [`Crc32`]: CRC-32/ISO-HDLC, the default image digest
//! - [`Sha3_256`]: SHA3-256 for deployments that want a cryptographic digest
//! - [`AesCbc`]: AES-128/192/256 in CBC mode, selected by key length
//!
//! Key material lives in [`PresharedKey`], which is zeroized on drop.
//!
//! # Security
//!
//! The encrypted-image format carries no authentication tag. A decrypted
//! "magic block" only tells a wrong key apart from a corrupt payload.

#![no_std]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]

#[cfg(test)]
extern crate std;

pub mod cbc;
pub mod crc;
pub mod error;
pub mod hash;
pub mod key;
pub mod traits;

pub use self::cbc::{AesCbc, AesCbcEncryptor};
pub use self::crc::{crc32, Crc32};
pub use error::{CryptoError, CryptoResult};
pub use hash::Sha3_256;
pub use key::PresharedKey;
pub use traits::{constant_time_eq, CipherAlgo, HashAlgo};
