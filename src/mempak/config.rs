//! Compile-time configuration.
//!
//! The device has no runtime configuration surface: sizes, the pin map and
//! every timing threshold are fixed here.

// =============================================================================
// Image / Storage Geometry
// =============================================================================

/// Size of one cartridge image in bytes (15 address lines).
pub const IMAGE_SIZE: usize = 32768;

/// Number of virtual cartridges stored in flash.
pub const SLOT_COUNT: u8 = 10;

/// Block size presented over USB mass storage.
pub const VOLUME_BLOCK_SIZE: usize = 512;

/// Number of blocks in the USB volume (one image).
pub const VOLUME_BLOCKS: usize = IMAGE_SIZE / VOLUME_BLOCK_SIZE;

// =============================================================================
// Pin Map (GPIO bit positions in the bus snapshot)
// =============================================================================

pub mod pins {
    /// A0..A14 occupy GPIO 0..14.
    pub const ADDR_MASK: u32 = 0x0000_7FFF;

    /// Chip enable, active low.
    pub const NCE: u32 = 15;

    /// WS2812 status LED data line.
    pub const LED: u32 = 16;

    /// D0 is GPIO 17, D7 is GPIO 24.
    pub const DATA_SHIFT: u32 = 17;

    /// D0..D7 as a register mask.
    pub const DATA_MASK: u32 = 0xFF << DATA_SHIFT;

    /// Cartridge-present output (high = inserted).
    pub const DETECT: u32 = 25;

    /// Output enable, active low.
    pub const NOE: u32 = 26;

    /// Write enable, active low.
    pub const NWE: u32 = 27;

    /// External push button, active low with pull-up.
    pub const BUTTON: u32 = 28;
}

// =============================================================================
// Timing
// =============================================================================

/// Timing thresholds used by the persistence manager, gesture recognizer and
/// orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Quiet time after the last bus write before the image is flushed.
    pub flush_quiet_ms: u32,
    /// Quiet time after the last slot switch before the index is persisted.
    pub index_quiet_ms: u32,
    /// Presses held strictly longer than this are long presses.
    pub long_press_ms: u32,
    /// Pause after the last release that ends a press sequence.
    pub max_pause_ms: u32,
    /// On/off phase length of the slot blink pattern.
    pub blink_interval_ms: u32,
    /// How long the detect line is held low to simulate removal.
    pub detect_pulse_ms: u32,
    /// Delay between a completed USB import and the restart.
    pub eject_settle_ms: u32,
    /// Delay after starting the bus engine before the control loop runs.
    pub engine_settle_ms: u32,
    /// Sleep between control loop iterations (button sampling cadence).
    pub poll_interval_ms: u32,
}

impl Config {
    pub const DEFAULT: Self = Self {
        flush_quiet_ms: 5000,
        index_quiet_ms: 2000,
        long_press_ms: 1500,
        max_pause_ms: 1000,
        blink_interval_ms: 250,
        detect_pulse_ms: 500,
        eject_settle_ms: 500,
        engine_settle_ms: 100,
        poll_interval_ms: 10,
    };
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}
