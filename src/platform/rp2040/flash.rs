//! On-board QSPI flash as the slot store.
//!
//! Erase and program go through the boot ROM routines. While they run the
//! flash is not memory mapped, so the code doing the sequence lives in RAM,
//! interrupts are masked and every ROM entry point is resolved up front.
//! Core 1 never executes from flash, so it keeps serving the bus meanwhile.

use rp2040_hal::rom_data;

use mempak::{Error, NvStore, Result};

use crate::arch;

/// Memory-mapped (XIP) view of the flash.
const XIP_BASE: u32 = 0x1000_0000;

/// Size of the boot2 stage at the start of flash.
const BOOT2_SIZE: usize = 256;

const SECTOR_SIZE: u32 = 4096;
const PAGE_SIZE: u32 = 256;

/// 64 KiB block erase command, used by the ROM when a range allows it.
const BLOCK_SIZE: u32 = 1 << 16;
const BLOCK_ERASE_CMD: u8 = 0xD8;

type VoidFn = unsafe extern "C" fn();
type EraseFn = unsafe extern "C" fn(u32, usize, u32, u8);
type ProgramFn = unsafe extern "C" fn(u32, *const u8, usize);

/// Boot ROM flash routines, resolved once.
#[derive(Clone, Copy)]
struct RomFns {
    connect_internal_flash: VoidFn,
    flash_exit_xip: VoidFn,
    flash_range_erase: EraseFn,
    flash_range_program: ProgramFn,
    flash_flush_cache: VoidFn,
}

impl RomFns {
    /// The ROM table is read through flash-resident code, so this runs
    /// while XIP is still up.
    fn resolve() -> Self {
        Self {
            connect_internal_flash: rom_data::connect_internal_flash::ptr(),
            flash_exit_xip: rom_data::flash_exit_xip::ptr(),
            flash_range_erase: rom_data::flash_range_erase::ptr(),
            flash_range_program: rom_data::flash_range_program::ptr(),
            flash_flush_cache: rom_data::flash_flush_cache::ptr(),
        }
    }
}

/// Which ROM operation to run with XIP down.
#[derive(Clone, Copy)]
enum FlashOp<'a> {
    Erase { offset: u32, len: u32 },
    Program { offset: u32, data: &'a [u8] },
}

/// The slot store backed by the chip's own flash.
pub struct RomFlash {
    capacity: u32,
    rom: RomFns,
    /// RAM copy of boot2, re-run to bring XIP back up
    boot2: [u32; BOOT2_SIZE / 4],
}

impl RomFlash {
    /// # Safety
    /// Must be created once, while XIP is up, before core 1 is launched.
    pub unsafe fn new(capacity: u32) -> Self {
        let mut boot2 = [0u32; BOOT2_SIZE / 4];
        for (i, word) in boot2.iter_mut().enumerate() {
            *word = unsafe { core::ptr::read_volatile((XIP_BASE as *const u32).add(i)) };
        }
        Self {
            capacity,
            rom: RomFns::resolve(),
            boot2,
        }
    }

    fn check(&self, offset: u32, len: u32, unit: u32) -> Result<()> {
        if offset % unit != 0 || len % unit != 0 {
            return Err(Error::Misaligned { offset, len });
        }
        if offset.checked_add(len).is_none_or(|end| end > self.capacity) {
            return Err(Error::OutOfBounds { offset, len });
        }
        Ok(())
    }

    fn run(&mut self, op: FlashOp<'_>) {
        let primask = arch::disable_interrupts();
        unsafe { run_with_xip_down(&self.rom, self.boot2.as_ptr(), op) };
        arch::restore_interrupts(primask);
    }
}

/// Take XIP down, run `op`, flush the cache and re-enter XIP through boot2.
///
/// Everything reachable from here must be in RAM or ROM.
#[unsafe(link_section = ".data.ram_func")]
#[inline(never)]
unsafe fn run_with_xip_down(rom: &RomFns, boot2: *const u32, op: FlashOp<'_>) {
    unsafe {
        (rom.connect_internal_flash)();
        (rom.flash_exit_xip)();
        match op {
            FlashOp::Erase { offset, len } => {
                (rom.flash_range_erase)(offset, len as usize, BLOCK_SIZE, BLOCK_ERASE_CMD)
            }
            FlashOp::Program { offset, data } => {
                (rom.flash_range_program)(offset, data.as_ptr(), data.len())
            }
        }
        (rom.flash_flush_cache)();

        // boot2 is Thumb code; bit 0 selects the Thumb state
        arch::dsb();
        arch::isb();
        let enter_xip: VoidFn = core::mem::transmute((boot2 as usize) | 1);
        enter_xip();
    }
}

impl NvStore for RomFlash {
    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn erase_unit(&self) -> u32 {
        SECTOR_SIZE
    }

    fn program_unit(&self) -> u32 {
        PAGE_SIZE
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<()> {
        let len = buf.len() as u32;
        if offset.checked_add(len).is_none_or(|end| end > self.capacity) {
            return Err(Error::OutOfBounds { offset, len });
        }
        let src = (XIP_BASE + offset) as *const u8;
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = unsafe { core::ptr::read_volatile(src.add(i)) };
        }
        Ok(())
    }

    fn erase(&mut self, offset: u32, len: u32) -> Result<()> {
        self.check(offset, len, SECTOR_SIZE)?;
        self.run(FlashOp::Erase { offset, len });
        Ok(())
    }

    fn program(&mut self, offset: u32, data: &[u8]) -> Result<()> {
        self.check(offset, data.len() as u32, PAGE_SIZE)?;
        self.run(FlashOp::Program { offset, data });
        Ok(())
    }
}
