//! State shared between the bus core and the control core.
//!
//! There is no lock. Each field has exactly one writer per direction:
//!
//! - Core 1 (bus engine) writes arbitrary image bytes and sets `dirty`
//! - Core 0 (orchestrator) clears `dirty` and replaces the whole image on a
//!   slot switch or a USB import
//!
//! A byte store is always followed by a Release store of `dirty`, so a core
//! that observes `dirty` with Acquire also observes the byte. Only plain
//! loads and stores are used; ARMv6-M has no compare-and-swap.

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use crate::config::IMAGE_SIZE;

/// The live cartridge image plus the dirty signal.
pub struct SharedState {
    image: [AtomicU8; IMAGE_SIZE],
    dirty: AtomicBool,
}

impl SharedState {
    /// All-zero image, clean.
    pub const fn new() -> Self {
        Self {
            image: [const { AtomicU8::new(0) }; IMAGE_SIZE],
            dirty: AtomicBool::new(false),
        }
    }

    // =========================================================================
    // Bus side (core 1)
    // =========================================================================

    /// Read one byte for a bus READ cycle.
    #[inline(always)]
    pub fn read_byte(&self, addr: usize) -> u8 {
        self.image[addr & (IMAGE_SIZE - 1)].load(Ordering::Relaxed)
    }

    /// Store one byte for a bus WRITE cycle and raise the dirty signal.
    #[inline(always)]
    pub fn write_byte(&self, addr: usize, value: u8) {
        self.image[addr & (IMAGE_SIZE - 1)].store(value, Ordering::Relaxed);
        self.dirty.store(true, Ordering::Release);
    }

    // =========================================================================
    // Control side (core 0)
    // =========================================================================

    /// Check for writes since the last clear.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Drop the dirty signal before starting a quiet window.
    #[inline]
    pub fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::Release);
    }

    /// Copy the image into `out` (must be `IMAGE_SIZE` bytes).
    pub fn snapshot(&self, out: &mut [u8]) {
        for (dst, src) in out.iter_mut().zip(self.image.iter()) {
            *dst = src.load(Ordering::Relaxed);
        }
    }

    /// Replace the whole image without touching the dirty signal.
    ///
    /// The bus engine keeps running while this happens; a bus access that
    /// lands mid-copy can see a mix of old and new bytes. Callers pulse the
    /// detect line so the console stops accessing the cartridge.
    pub fn load(&self, data: &[u8]) {
        for (dst, src) in self.image.iter().zip(data.iter()) {
            dst.store(*src, Ordering::Relaxed);
        }
    }

    /// Copy `data` into the image at `offset` and raise the dirty signal.
    ///
    /// Used by the USB import path; out-of-range bytes are dropped.
    pub fn write_range(&self, offset: usize, data: &[u8]) {
        let end = (offset + data.len()).min(IMAGE_SIZE);
        if offset >= end {
            return;
        }
        for (dst, src) in self.image[offset..end].iter().zip(data.iter()) {
            dst.store(*src, Ordering::Relaxed);
        }
        self.dirty.store(true, Ordering::Release);
    }

    /// Copy `out.len()` bytes of the image starting at `offset`.
    pub fn read_range(&self, offset: usize, out: &mut [u8]) {
        for (i, dst) in out.iter_mut().enumerate() {
            *dst = match self.image.get(offset + i) {
                Some(byte) => byte.load(Ordering::Relaxed),
                None => 0,
            };
        }
    }
}
