//! Hardware Abstraction Layer
//!
//! Platform-agnostic traits for everything the cartridge core touches. The
//! RP2040 binary implements them on real registers; the integration tests
//! implement them with a simulated clock and a RAM-backed store.

use crate::error::Result;
use crate::status::Rgb;
use crate::volume::{Direction, ImageVolume};

// =============================================================================
// Time
// =============================================================================

/// Monotonic millisecond clock with blocking delays.
pub trait Clock {
    /// Milliseconds since boot.
    fn now_ms(&self) -> u64;

    /// Block the calling context for `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);

    /// Milliseconds elapsed since `since`.
    fn elapsed_ms(&self, since: u64) -> u64 {
        self.now_ms().saturating_sub(since)
    }
}

// =============================================================================
// Parallel Bus
// =============================================================================

/// The cartridge connector as seen by the bus engine.
///
/// Implementations for real hardware must be `#[inline(always)]` and must not
/// touch flash: they are inlined into the RAM-resident engine loop.
pub trait BusPort {
    /// Read every bus line at once as a GPIO snapshot (see `config::pins`).
    fn sample(&self) -> u32;

    /// Switch the data lines to input (tri-state).
    fn release_data(&mut self);

    /// Switch the data lines to output and drive `byte`.
    fn drive_data(&mut self, byte: u8);
}

// =============================================================================
// Non-Volatile Store
// =============================================================================

/// Erase/program flash with fixed granularities.
///
/// Offsets are relative to the start of the store. `erase` and `program`
/// must leave the medium readable again before returning; on hardware this
/// means running with interrupts disabled while execute-in-place is down.
pub trait NvStore {
    /// Total store size in bytes.
    fn capacity(&self) -> u32;

    /// Smallest erasable unit in bytes.
    fn erase_unit(&self) -> u32;

    /// Smallest programmable unit in bytes.
    fn program_unit(&self) -> u32;

    /// Copy `buf.len()` bytes starting at `offset`.
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<()>;

    /// Erase `len` bytes starting at `offset` (both erase-unit aligned).
    fn erase(&mut self, offset: u32, len: u32) -> Result<()>;

    /// Program `data` at `offset` (both program-unit aligned).
    fn program(&mut self, offset: u32, data: &[u8]) -> Result<()>;
}

// =============================================================================
// Operator I/O
// =============================================================================

/// The single operator button.
pub trait PressButton {
    /// Current level, true while held down.
    fn is_pressed(&mut self) -> bool;
}

/// Colored status light.
pub trait StatusLed {
    fn set(&mut self, color: Rgb);
}

/// Cartridge-present line towards the console.
pub trait DetectLine {
    /// Drive the line high (`true`, inserted) or low (`false`, removed).
    fn set_present(&mut self, present: bool);
}

// =============================================================================
// Mass Storage Transport
// =============================================================================

/// External block transport (USB mass storage on the board).
pub trait Transport {
    /// Bring up the link and present the image in the given direction.
    fn attach(&mut self, direction: Direction);

    /// Service the link once. Block requests are answered from `volume`.
    fn poll(&mut self, volume: &mut ImageVolume<'_>);
}

// =============================================================================
// Platform
// =============================================================================

/// Binds the concrete peripheral types of one board.
pub trait Platform {
    type Clock: Clock;
    type Store: NvStore;
    type Led: StatusLed;
    type Button: PressButton;
    type Detect: DetectLine;
    type Transport: Transport;
}

/// Peripherals owned by the control context.
pub struct Board<P: Platform> {
    pub clock: P::Clock,
    pub store: P::Store,
    pub led: P::Led,
    pub button: P::Button,
    pub detect: P::Detect,
    pub transport: P::Transport,
}
