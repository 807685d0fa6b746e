//! Pico board wiring for the cartridge core.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use rp2040_hal as hal;
use smart_leds_trait::{RGB8, SmartLedsWrite};
use ws2812_pio::Ws2812Direct;

use hal::gpio::bank0::{Gpio16, Gpio25, Gpio28};
use hal::gpio::{FunctionPio0, FunctionSioInput, FunctionSioOutput, Pin, PullDown, PullUp};
use hal::pac;
use hal::pio::SM0;

use mempak::{Clock, DetectLine, Platform, PressButton, Rgb, StatusLed};

use crate::bootsel;
use crate::flash::RomFlash;
use crate::usb::UsbTransport;

// =============================================================================
// Time
// =============================================================================

/// Millisecond clock on the 1 MHz system timer.
pub struct TimerClock {
    timer: hal::Timer,
}

impl TimerClock {
    pub fn new(timer: hal::Timer) -> Self {
        Self { timer }
    }
}

impl Clock for TimerClock {
    fn now_ms(&self) -> u64 {
        self.timer.get_counter().ticks() / 1000
    }

    fn delay_ms(&mut self, ms: u32) {
        self.timer.delay_ms(ms);
    }
}

// =============================================================================
// Operator I/O
// =============================================================================

pub type LedPin = Pin<Gpio16, FunctionPio0, PullDown>;

/// WS2812 status light on GPIO 16, driven by PIO0 SM0.
pub struct StatusLight {
    ws: Ws2812Direct<pac::PIO0, SM0, LedPin>,
}

impl StatusLight {
    pub fn new(ws: Ws2812Direct<pac::PIO0, SM0, LedPin>) -> Self {
        Self { ws }
    }
}

impl StatusLed for StatusLight {
    fn set(&mut self, color: Rgb) {
        let _ = self.ws.write([RGB8::new(color.r, color.g, color.b)]);
    }
}

/// BOOTSEL or the external button on GPIO 28, whichever is pressed.
pub struct OperatorButton {
    external: Pin<Gpio28, FunctionSioInput, PullUp>,
}

impl OperatorButton {
    pub fn new(external: Pin<Gpio28, FunctionSioInput, PullUp>) -> Self {
        Self { external }
    }

    /// External button only; safe to call before the flash sequence matters.
    pub fn external_pressed(&mut self) -> bool {
        self.external.is_low().unwrap_or(false)
    }
}

impl PressButton for OperatorButton {
    fn is_pressed(&mut self) -> bool {
        bootsel::is_pressed() || self.external_pressed()
    }
}

/// Cartridge-present output on GPIO 25.
pub struct DetectPin {
    pin: Pin<Gpio25, FunctionSioOutput, PullDown>,
}

impl DetectPin {
    pub fn new(pin: Pin<Gpio25, FunctionSioOutput, PullDown>) -> Self {
        Self { pin }
    }
}

impl DetectLine for DetectPin {
    fn set_present(&mut self, present: bool) {
        let _ = if present {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
    }
}

// =============================================================================
// Platform
// =============================================================================

pub struct Pico;

impl Platform for Pico {
    type Clock = TimerClock;
    type Store = RomFlash;
    type Led = StatusLight;
    type Button = OperatorButton;
    type Detect = DetectPin;
    type Transport = UsbTransport;
}
