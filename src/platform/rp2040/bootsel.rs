//! BOOTSEL button readout.
//!
//! The BOOTSEL button pulls the flash chip-select low. Reading it means
//! floating chip-select for a moment, so the flash is unreadable while this
//! runs: the code sits in RAM and interrupts are masked. Core 1 is unaffected
//! because it never touches flash.

use core::ptr::{read_volatile, write_volatile};

use crate::arch;

const IO_QSPI_SS_CTRL: *mut u32 = 0x4001_800C as *mut u32;
const SIO_GPIO_HI_IN: *const u32 = 0xD000_0008 as *const u32;

const OEOVER_LSB: u32 = 12;
const OEOVER_MASK: u32 = 0b11 << OEOVER_LSB;
const OEOVER_NORMAL: u32 = 0;
const OEOVER_LOW: u32 = 2;

/// QSPI_SS is bit 1 of the high GPIO bank.
const SS_BIT: u32 = 1 << 1;

/// Settle time for the chip-select line once the output is released.
const SETTLE_SPINS: u32 = 1000;

/// Sample the BOOTSEL button (true when pressed).
#[unsafe(link_section = ".data.ram_func")]
#[inline(never)]
pub fn is_pressed() -> bool {
    let primask = arch::disable_interrupts();

    unsafe {
        let ctrl = read_volatile(IO_QSPI_SS_CTRL);
        write_volatile(IO_QSPI_SS_CTRL, (ctrl & !OEOVER_MASK) | (OEOVER_LOW << OEOVER_LSB));
        arch::spin(SETTLE_SPINS);

        // Active low
        let pressed = read_volatile(SIO_GPIO_HI_IN) & SS_BIT == 0;

        let ctrl = read_volatile(IO_QSPI_SS_CTRL);
        write_volatile(IO_QSPI_SS_CTRL, (ctrl & !OEOVER_MASK) | (OEOVER_NORMAL << OEOVER_LSB));

        arch::restore_interrupts(primask);
        pressed
    }
}
