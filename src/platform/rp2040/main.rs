//! # Memory Cartridge Firmware (RP2040)
//!
//! Core 0 runs the orchestrator (write-back, button, USB); core 1 runs the
//! bus loop from RAM and never returns.

#![no_std]
#![no_main]

mod arch;
mod board;
mod bootsel;
mod bus_port;
mod clocks;
mod flash;
#[cfg(feature = "debug_log")]
mod logger;
mod usb;

use core::panic::PanicInfo;

use embedded_hal::digital::PinState;
use fugit::ExtU32;
use log::error;
use rp2040_hal as hal;
use static_cell::StaticCell;
use usb_device::bus::UsbBusAllocator;
use ws2812_pio::Ws2812Direct;

use hal::Clock as _;
use hal::multicore::{Multicore, Stack};
use hal::pac;
use hal::pio::PIOExt;
use hal::Watchdog;

use mempak::{Board, BootPath, Config, Orchestrator, SharedState, SlotLayout};

use crate::board::{DetectPin, OperatorButton, Pico, StatusLight, TimerClock};
use crate::flash::RomFlash;
use crate::usb::UsbTransport;

// =============================================================================
// Boot Stage 2
// =============================================================================

#[unsafe(link_section = ".boot2")]
#[unsafe(no_mangle)]
#[used]
pub static BOOT2_FIRMWARE: [u8; 256] = rp2040_boot2::BOOT_LOADER_W25Q080;

// =============================================================================
// Constants / Statics
// =============================================================================

/// Flash size of the Pico board.
const FLASH_SIZE: u32 = 2 * 1024 * 1024;

/// Pull-up settle time before the boot button is sampled (cycles).
const BUTTON_SETTLE_CYCLES: u32 = 1_000;

static SHARED: SharedState = SharedState::new();

static mut CORE1_STACK: Stack<1024> = Stack::new();

static USB_BUS: StaticCell<UsbBusAllocator<hal::usb::UsbBus>> = StaticCell::new();
static ORCHESTRATOR: StaticCell<Orchestrator<'static, Pico>> = StaticCell::new();

/// Hand cartridge pins to the SIO block as inputs in the given pull mode.
macro_rules! sio_inputs {
    ($pins:ident.$mode:ident: $($pin:ident),+ $(,)?) => {
        $( let _ = $pins.$pin.$mode(); )+
    };
}

// =============================================================================
// Entry
// =============================================================================

#[hal::entry]
fn main() -> ! {
    #[cfg(feature = "debug_log")]
    logger::init();

    let Some(mut pac) = pac::Peripherals::take() else {
        cortex_m::peripheral::SCB::sys_reset();
    };
    let mut watchdog = Watchdog::new(pac.WATCHDOG);
    let mut sio = hal::Sio::new(pac.SIO);
    let pins = hal::gpio::Pins::new(pac.IO_BANK0, pac.PADS_BANK0, sio.gpio_bank0, &mut pac.RESETS);

    // Button held at power-up: straight to the ROM USB bootloader
    let mut button = OperatorButton::new(pins.gpio28.into_pull_up_input());
    cortex_m::asm::delay(BUTTON_SETTLE_CYCLES);
    if BootPath::select(&mut button) == BootPath::Bootloader {
        hal::rom_data::reset_to_usb_boot(0, 0);
        restart(&mut watchdog);
    }

    let Ok(clocks) = clocks::configure_overclock(
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.VREG_AND_CHIP_RESET,
        &mut pac.RESETS,
        &mut watchdog,
    ) else {
        restart(&mut watchdog);
    };

    // Cartridge connector: A0..A14 and D0..D7 float, the strobes idle high
    // so an unplugged connector decodes as deselected
    sio_inputs!(pins.into_floating_input:
        gpio0, gpio1, gpio2, gpio3, gpio4, gpio5, gpio6, gpio7,
        gpio8, gpio9, gpio10, gpio11, gpio12, gpio13, gpio14,
        gpio17, gpio18, gpio19, gpio20, gpio21, gpio22, gpio23, gpio24,
    );
    sio_inputs!(pins.into_pull_up_input: gpio15, gpio26, gpio27);
    let detect = DetectPin::new(pins.gpio25.into_push_pull_output_in_state(PinState::High));

    // Status light
    let (mut pio, sm0, _, _, _) = pac.PIO0.split(&mut pac.RESETS);
    let ws = Ws2812Direct::new(pins.gpio16.into_function::<hal::gpio::FunctionPio0>(), &mut pio, sm0, clocks.peripheral_clock.freq());

    let timer = hal::Timer::new(pac.TIMER, &mut pac.RESETS, &clocks);

    let usb_bus = USB_BUS.init(UsbBusAllocator::new(hal::usb::UsbBus::new(
        pac.USBCTRL_REGS,
        pac.USBCTRL_DPRAM,
        clocks.usb_clock,
        true,
        &mut pac.RESETS,
    )));

    let store = unsafe { RomFlash::new(FLASH_SIZE) };
    let layout = match SlotLayout::for_store(&store) {
        Ok(layout) => layout,
        Err(err) => {
            error!("{}", err);
            restart(&mut watchdog);
        }
    };

    let board = Board::<Pico> {
        clock: TimerClock::new(timer),
        store,
        led: StatusLight::new(ws),
        button,
        detect,
        transport: UsbTransport::new(usb_bus),
    };
    let orch = ORCHESTRATOR.init_with(|| Orchestrator::new(&SHARED, board, layout, Config::DEFAULT));

    // Core 1: bus engine
    let mut mc = Multicore::new(&mut pac.PSM, &mut pac.PPB, &mut sio.fifo);
    let cores = mc.cores();
    let core1 = &mut cores[1];

    let booted = orch.boot(|| {
        let stack = unsafe { &mut *(&raw mut CORE1_STACK) };
        let spawned = match stack.take() {
            Some(mem) => core1.spawn(mem, || bus_port::bus_loop(&SHARED)).is_ok(),
            None => false,
        };
        if !spawned {
            error!("core 1 did not start");
        }
    });
    if let Err(err) = booted {
        error!("boot failed: {}", err);
        restart(&mut watchdog);
    }

    loop {
        if orch.step().is_terminal() {
            restart(&mut watchdog);
        }
    }
}

/// Reset the chip through the watchdog.
fn restart(watchdog: &mut Watchdog) -> ! {
    watchdog.start(1_000.micros());
    loop {
        cortex_m::asm::nop();
    }
}

// =============================================================================
// Panic Handler
// =============================================================================

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    error!("panic: {}", info);
    cortex_m::peripheral::SCB::sys_reset()
}
