//! ARMv6-M CPU utilities for the Cortex-M0+ cores.
//!
//! Only what the flash and BOOTSEL paths need. `cortex_m::interrupt` and
//! `cortex_m::asm` only mark their wrappers `#[inline]`, which may leave a
//! call into flash from the RAM-resident callers; these are
//! `#[inline(always)]` so they are emitted in place.

/// Disable interrupts and return the previous PRIMASK.
#[inline(always)]
pub fn disable_interrupts() -> u32 {
    let primask: u32;
    unsafe {
        core::arch::asm!(
            "mrs {}, PRIMASK",
            "cpsid i",
            out(reg) primask,
            options(nomem, nostack)
        );
    }
    primask
}

/// Restore the PRIMASK returned by [`disable_interrupts`].
#[inline(always)]
pub fn restore_interrupts(primask: u32) {
    unsafe {
        core::arch::asm!(
            "msr PRIMASK, {}",
            in(reg) primask,
            options(nomem, nostack)
        );
    }
}

/// Busy-wait for roughly `cycles * 3` core cycles without touching memory.
#[inline(always)]
pub fn spin(cycles: u32) {
    let mut count = cycles;
    unsafe {
        core::arch::asm!(
            "1:",
            "subs {0}, {0}, #1",
            "bne 1b",
            inout(reg) count,
            options(nomem, nostack)
        );
    }
    let _ = count;
}

/// Data synchronization barrier.
#[inline(always)]
pub fn dsb() {
    unsafe {
        core::arch::asm!("dsb", options(nostack));
    }
}

/// Instruction synchronization barrier.
#[inline(always)]
pub fn isb() {
    unsafe {
        core::arch::asm!("isb", options(nostack));
    }
}
