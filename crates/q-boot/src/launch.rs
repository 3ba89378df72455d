// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Application hand-off
//!
//! The final step of a boot: point VTOR at the application's vector
//! table, load its initial stack pointer and branch to its reset handler.
//! Only meaningful on an ARMv7-M / ARMv8-M target; on any other target
//! both entry points park the CPU.

#![allow(unsafe_code)]

#[cfg(target_arch = "arm")]
use core::ptr;

/// Vector Table Offset Register (SCB)
#[cfg(target_arch = "arm")]
const SCB_VTOR: u32 = 0xE000_ED08;

/// Jump to the application whose vector table starts at `vector_table`
///
/// The image must have passed `check_image` and the reset vector check;
/// drivers must already be released.
pub fn jump_to_application(vector_table: u32) -> ! {
    #[cfg(target_arch = "arm")]
    {
        // SAFETY: `vector_table` is the start of a verified application
        // image in memory-mapped flash. Word 0 is the initial stack pointer
        // and word 1 the reset handler, which was checked to lie inside the
        // application slot.
        let (initial_sp, entry) = unsafe {
            (
                ptr::read_volatile(vector_table as *const u32),
                ptr::read_volatile((vector_table + 4) as *const u32),
            )
        };

        // SAFETY: SCB_VTOR is an always-mapped System Control Block
        // register, writable in privileged mode. The table address is
        // aligned by the linker script of the application.
        unsafe {
            ptr::write_volatile(SCB_VTOR as *mut u32, vector_table);
        }
        dsb();
        isb();

        // SAFETY: Standard Cortex-M hand-off. MSP is set to the image's
        // initial stack pointer and control never returns to the
        // bootloader, so nothing on the current stack is used again.
        unsafe {
            core::arch::asm!(
                "msr msp, {sp}",
                "bx {entry}",
                sp = in(reg) initial_sp,
                entry = in(reg) entry,
                options(noreturn)
            );
        }
    }

    #[cfg(not(target_arch = "arm"))]
    {
        let _ = vector_table;
        halt()
    }
}

/// Park the CPU; nothing may be executed
pub fn halt() -> ! {
    loop {
        #[cfg(target_arch = "arm")]
        // SAFETY: WFI only suspends execution until the next interrupt.
        unsafe {
            core::arch::asm!("wfi", options(nomem, nostack, preserves_flags));
        }
        #[cfg(not(target_arch = "arm"))]
        core::hint::spin_loop();
    }
}

/// Data Synchronization Barrier
#[cfg(target_arch = "arm")]
#[inline(always)]
fn dsb() {
    // SAFETY: DSB waits for outstanding memory accesses; it has no other
    // effect on memory or the stack.
    unsafe {
        core::arch::asm!("dsb sy", options(nomem, nostack, preserves_flags));
    }
}

/// Instruction Synchronization Barrier
#[cfg(target_arch = "arm")]
#[inline(always)]
fn isb() {
    // SAFETY: ISB flushes the pipeline so the new VTOR is observed.
    unsafe {
        core::arch::asm!("isb", options(nomem, nostack, preserves_flags));
    }
}
