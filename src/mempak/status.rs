//! Status light colors and blink patterns.

use crate::hal::{Clock, StatusLed};

/// 24-bit color for the status light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const OFF: Self = Self::new(0, 0, 0);

    /// Shown while a flush is pending and during blink patterns.
    pub const BUSY: Self = Self::new(0, 255, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Flash the light `count` times; each blink is one on and one off phase.
pub fn blink<L: StatusLed, C: Clock>(led: &mut L, clock: &mut C, count: u32, interval_ms: u32) {
    for _ in 0..count {
        led.set(Rgb::BUSY);
        clock.delay_ms(interval_ms);
        led.set(Rgb::OFF);
        clock.delay_ms(interval_ms);
    }
}
