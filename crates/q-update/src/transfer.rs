// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Update transfer
//!
//! Installs a verified candidate into the application slot in one
//! streaming pass:
//!
//! 1. copy the header verbatim and seed the digest with its CRC
//! 2. encrypted source: load the IV and decrypt the magic block to advance
//!    the CBC chain (the block itself is not written)
//! 3. per chunk: read, decrypt, digest the plaintext, buffered write
//! 4. append the plaintext digest, force-flushing the tail
//!
//! The destination ends up as a plain image that [`check_image`] accepts.
//! Memory use is one chunk buffer regardless of image size.
//!
//! Any failure aborts immediately and leaves the destination partially
//! written. A transfer that returned `Ok` still has to be re-verified
//! before the image is trusted.

use q_common::constants::{CIPHER_BLOCK_SIZE, IV_SIZE, MAX_CHUNK_SIZE, MAX_DIGEST_SIZE};
use q_common::{log_debug, log_error, log_info, log_warn, Error, Result};

use crate::context::BootContext;
use crate::header::MAX_HEADER_SIZE;
use crate::integrity::{check_image, layout};
use crate::memory::WriteFlag;
use crate::registry::SlotRef;

/// Preserve the running image in the backup slot before it is replaced
fn backup_running_image(ctx: &mut BootContext<'_>, app: SlotRef, source: SlotRef) -> Result<()> {
    let Some(backup) = ctx.backup_slot() else {
        return Ok(());
    };
    if backup == source || ctx.is_encrypted(backup) {
        log_debug!(ctx.log, "transfer", "backup copy to {} skipped", backup);
        return Ok(());
    }

    let Ok(header) = check_image(ctx, app) else {
        log_warn!(ctx.log, "transfer", "running image invalid, no backup taken");
        return Ok(());
    };
    let len = layout(ctx, app, &header)?.total_len();
    if len > ctx.storage.slot(backup)?.size() {
        log_warn!(ctx.log, "transfer", "running image does not fit {}", backup);
        return Ok(());
    }

    ctx.storage.erase(backup, 0, len)?;
    ctx.storage.copy(app, backup, len)?;
    log_info!(ctx.log, "transfer", "running image backed up to {} ({} bytes)", backup, len);
    Ok(())
}

fn stream(ctx: &mut BootContext<'_>, source: SlotRef, dest: SlotRef) -> Result<()> {
    let header = check_image(ctx, source)?;
    let src = layout(ctx, source, &header)?;

    let header_len = ctx.header_size();
    let digest_len = ctx.digest_size();
    let dest_len = header_len as u64 + u64::from(header.data_size) + digest_len as u64;
    if dest_len > u64::from(ctx.storage.slot(dest)?.size()) {
        return Err(Error::InvalidLength);
    }

    if ctx.policy.fallback {
        backup_running_image(ctx, dest, source)?;
    }
    ctx.storage.erase(dest, 0, dest_len as u32)?;

    let mut raw = [0u8; MAX_HEADER_SIZE];
    ctx.storage.read(source, 0, &mut raw[..header_len])?;
    ctx.storage
        .write(dest, 0, &raw[..header_len], WriteFlag::Buffered)?;

    ctx.hash.init();
    ctx.hash.update(&header.digest_seed());

    if src.encrypted {
        let mut iv = [0u8; IV_SIZE];
        let mut magic = [0u8; CIPHER_BLOCK_SIZE];
        ctx.storage.read(source, src.body_offset, &mut iv)?;
        ctx.storage
            .read(source, src.body_offset + IV_SIZE as u32, &mut magic)?;
        ctx.cipher.init(ctx.psk.as_bytes(), &iv)?;
        ctx.cipher.decrypt(&mut magic)?;
    }

    let chunk_size = ctx.config.chunk_size.min(MAX_CHUNK_SIZE);
    let mut chunk = [0u8; MAX_CHUNK_SIZE];
    let payload = src.payload_offset();
    let mut done = 0u32;
    while done < header.data_size {
        let count = chunk_size.min((header.data_size - done) as usize);
        let data = &mut chunk[..count];
        ctx.storage.read(source, payload + done, data)?;
        if src.encrypted {
            ctx.cipher.decrypt(data)?;
        }
        ctx.hash.update(data);
        ctx.storage
            .write(dest, header_len as u32 + done, data, WriteFlag::Buffered)?;
        done += count as u32;
    }

    let mut digest = [0u8; MAX_DIGEST_SIZE];
    let size = ctx.hash.finalize(&mut digest)?;
    ctx.storage.write(
        dest,
        header_len as u32 + header.data_size,
        &digest[..size],
        WriteFlag::Force,
    )?;

    log_info!(
        ctx.log,
        "transfer",
        "{} installed from {}: index {} ({} bytes)",
        dest,
        source,
        header.img_index,
        header.data_size
    );
    Ok(())
}

/// Install the image in `source` into the application slot
///
/// The source is verified first; nothing is erased if it is invalid.
///
/// # Errors
///
/// Any [`check_image`] error for the source, `InvalidLength` if the image
/// does not fit the application slot, `InvalidParameters` if `source` is
/// the application slot, or a storage / cipher error mid-stream.
pub fn transfer(ctx: &mut BootContext<'_>, source: SlotRef) -> Result<()> {
    let dest = ctx.application_slot()?;
    if source == dest {
        return Err(Error::InvalidParameters);
    }

    log_info!(ctx.log, "transfer", "{} -> {}", source, dest);
    let result = stream(ctx, source, dest);
    ctx.cipher.deinit();
    if let Err(e) = result {
        ctx.storage.discard();
        log_error!(ctx.log, "transfer", "aborted: {}", e);
    }
    result
}
