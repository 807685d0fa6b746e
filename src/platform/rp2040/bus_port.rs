//! Cartridge connector on the SIO GPIO registers.
//!
//! The engine needs one-cycle access to all 30 GPIOs at once, so this goes
//! straight to the single-cycle IO block instead of through the HAL pins.

use core::ptr::{read_volatile, write_volatile};

use mempak::config::pins;
use mempak::{BusEngine, BusPort, SharedState};

// SIO register block (single-cycle IO)
const SIO_BASE: usize = 0xD000_0000;
const GPIO_IN: *const u32 = (SIO_BASE + 0x004) as *const u32;
const GPIO_OUT_SET: *mut u32 = (SIO_BASE + 0x014) as *mut u32;
const GPIO_OUT_CLR: *mut u32 = (SIO_BASE + 0x018) as *mut u32;
const GPIO_OE_SET: *mut u32 = (SIO_BASE + 0x024) as *mut u32;
const GPIO_OE_CLR: *mut u32 = (SIO_BASE + 0x028) as *mut u32;

/// Zero-sized handle on the bus pins; owned by core 1.
pub struct SioBus {
    _private: (),
}

impl SioBus {
    /// # Safety
    /// The address, control and data pins must already be switched to the
    /// SIO function, and only one `SioBus` may exist.
    pub const unsafe fn steal() -> Self {
        Self { _private: () }
    }
}

impl BusPort for SioBus {
    #[inline(always)]
    fn sample(&self) -> u32 {
        unsafe { read_volatile(GPIO_IN) }
    }

    #[inline(always)]
    fn release_data(&mut self) {
        unsafe { write_volatile(GPIO_OE_CLR, pins::DATA_MASK) };
    }

    #[inline(always)]
    fn drive_data(&mut self, byte: u8) {
        let value = (byte as u32) << pins::DATA_SHIFT;
        unsafe {
            write_volatile(GPIO_OUT_CLR, pins::DATA_MASK & !value);
            write_volatile(GPIO_OUT_SET, value);
            write_volatile(GPIO_OE_SET, pins::DATA_MASK);
        }
    }
}

/// Core 1 entry: serve the console forever.
///
/// Lives in RAM so that flash erase/program on core 0 never stalls it.
#[unsafe(link_section = ".data.ram_func")]
#[inline(never)]
pub fn bus_loop(shared: &'static SharedState) -> ! {
    let mut port = unsafe { SioBus::steal() };
    port.release_data();
    BusEngine::new(shared).run(&mut port)
}
