// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Image integrity verification
//!
//! A staged image is accepted only if its header parses, the whole image
//! fits its slot and the stored digest matches the digest recomputed over
//! the payload. The running digest is seeded with the header's own CRC so
//! header and body are chained.
//!
//! Encrypted slots carry an IV and an encrypted magic block in front of
//! the payload. The magic block is decrypted first: a mismatch means the
//! configured key is wrong, which is reported as `WrongKey` rather than as
//! a digest failure. The digest of an encrypted slot covers the bytes as
//! stored on media.

use q_common::constants::{CIPHER_BLOCK_SIZE, IV_SIZE, MAGIC_BLOCK_CRC, MAX_CHUNK_SIZE, MAX_DIGEST_SIZE};
use q_common::{log_debug, log_info, log_warn, Error, Result};
use q_crypto::{constant_time_eq, crc32};

use crate::context::BootContext;
use crate::header::ImageHeader;
use crate::registry::SlotRef;

/// Byte layout of one image inside its slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLayout {
    /// Offset of the first byte after the header
    pub body_offset: u32,
    /// Bytes between header and digest (IV + magic block + payload)
    pub body_len: u32,
    /// Digest size in bytes
    pub digest_len: u32,
    /// Whether the body is encrypted
    pub encrypted: bool,
}

impl ImageLayout {
    /// Offset of the stored digest
    #[must_use]
    pub const fn digest_offset(&self) -> u32 {
        self.body_offset + self.body_len
    }

    /// Total image size including header and digest
    #[must_use]
    pub const fn total_len(&self) -> u32 {
        self.digest_offset() + self.digest_len
    }

    /// Offset of the first payload byte
    #[must_use]
    pub const fn payload_offset(&self) -> u32 {
        if self.encrypted {
            self.body_offset + (IV_SIZE + CIPHER_BLOCK_SIZE) as u32
        } else {
            self.body_offset
        }
    }
}

/// Compute the layout of `header` in `slot` and check it fits
///
/// # Errors
///
/// Returns `Error::InvalidLength` if an encrypted payload is not block
/// aligned or the image does not fit the slot.
pub fn layout(ctx: &BootContext<'_>, slot: SlotRef, header: &ImageHeader) -> Result<ImageLayout> {
    let encrypted = ctx.is_encrypted(slot);
    let mut body_len = u64::from(header.data_size);
    if encrypted {
        if header.data_size as usize % CIPHER_BLOCK_SIZE != 0 {
            return Err(Error::InvalidLength);
        }
        body_len += (IV_SIZE + CIPHER_BLOCK_SIZE) as u64;
    }

    let header_len = ctx.header_size() as u64;
    let digest_len = ctx.digest_size() as u64;
    if header_len + body_len + digest_len > u64::from(ctx.storage.slot(slot)?.size()) {
        return Err(Error::InvalidLength);
    }

    // Bounded by the slot size, so every field fits in u32.
    Ok(ImageLayout {
        body_offset: header_len as u32,
        body_len: body_len as u32,
        digest_len: digest_len as u32,
        encrypted,
    })
}

/// Digest `len` bytes of `slot` starting at `offset`, seeded with `seed`
///
/// Returns the number of digest bytes written to `out`.
pub(crate) fn digest_region(
    ctx: &mut BootContext<'_>,
    slot: SlotRef,
    seed: &[u8],
    offset: u32,
    len: u32,
    out: &mut [u8],
) -> Result<usize> {
    let chunk_size = ctx.config.chunk_size.min(MAX_CHUNK_SIZE);
    let mut chunk = [0u8; MAX_CHUNK_SIZE];

    ctx.hash.init();
    ctx.hash.update(seed);

    let mut done = 0u32;
    while done < len {
        let count = chunk_size.min((len - done) as usize);
        ctx.storage.read(slot, offset + done, &mut chunk[..count])?;
        ctx.hash.update(&chunk[..count]);
        done += count as u32;
    }

    Ok(ctx.hash.finalize(out)?)
}

fn check_magic_block(ctx: &mut BootContext<'_>, slot: SlotRef, layout: &ImageLayout) -> Result<()> {
    let mut iv = [0u8; IV_SIZE];
    let mut magic = [0u8; CIPHER_BLOCK_SIZE];
    ctx.storage.read(slot, layout.body_offset, &mut iv)?;
    ctx.storage
        .read(slot, layout.body_offset + IV_SIZE as u32, &mut magic)?;

    let result = ctx
        .cipher
        .init(ctx.psk.as_bytes(), &iv)
        .and_then(|()| ctx.cipher.decrypt(&mut magic));
    ctx.cipher.deinit();
    result?;

    if crc32(&magic) == MAGIC_BLOCK_CRC {
        Ok(())
    } else {
        Err(Error::WrongKey)
    }
}

fn verify(ctx: &mut BootContext<'_>, slot: SlotRef) -> Result<ImageHeader> {
    let header = ctx.read_header(slot)?;
    let layout = layout(ctx, slot, &header)?;

    if layout.encrypted {
        check_magic_block(ctx, slot, &layout)?;
    }

    let mut computed = [0u8; MAX_DIGEST_SIZE];
    let size = digest_region(
        ctx,
        slot,
        &header.digest_seed(),
        layout.body_offset,
        layout.body_len,
        &mut computed,
    )?;

    let mut stored = [0u8; MAX_DIGEST_SIZE];
    ctx.storage
        .read(slot, layout.digest_offset(), &mut stored[..size])?;

    if !constant_time_eq(&computed[..size], &stored[..size]) {
        return Err(Error::DigestMismatch);
    }
    Ok(header)
}

/// Verify the image stored in `slot`
///
/// Returns the parsed header on success.
///
/// # Errors
///
/// - `HeaderInvalid`: the header failed to parse
/// - `InvalidLength`: the image does not fit the slot
/// - `WrongKey`: the magic block did not decrypt to the known constant
/// - `DigestMismatch`: payload or stored digest corrupt
/// - `DriverFailure`: a read failed
pub fn check_image(ctx: &mut BootContext<'_>, slot: SlotRef) -> Result<ImageHeader> {
    log_debug!(ctx.log, "verify", "checking {}", slot);
    match verify(ctx, slot) {
        Ok(header) => {
            log_info!(
                ctx.log,
                "verify",
                "{} valid: index {} {} ({} bytes)",
                slot,
                header.img_index,
                header.data_vers,
                header.data_size
            );
            Ok(header)
        }
        Err(e) => {
            log_warn!(ctx.log, "verify", "{} rejected: {}", slot, e);
            Err(e)
        }
    }
}
