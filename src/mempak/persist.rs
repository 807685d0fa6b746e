//! Flash persistence manager
//!
//! Keeps flash wear and bus disturbance low by writing back only after the
//! console has stopped writing for a full quiet window:
//!
//! 1. Dirty signal seen: clear it, light goes busy, sleep the quiet window
//! 2. Signal raised again during the sleep: go back to 1
//! 3. Otherwise snapshot the image, erase the active slot, program it
//!
//! A write during a window only postpones durability. The byte is already
//! in the image and the dirty signal it raised triggers the next round.
//!
//! The slot index has its own, shorter debounce so that cycling through
//! several slots in a row only persists the one the operator stopped at.

use log::{debug, info, warn};

use crate::config::IMAGE_SIZE;
use crate::error::Result;
use crate::hal::{Clock, NvStore, StatusLed};
use crate::layout::{SlotIndex, SlotLayout};
use crate::shared::SharedState;
use crate::status::Rgb;

// =============================================================================
// Image Write-Back
// =============================================================================

/// Debounced image write-back plus the raw slot/index accessors.
pub struct WriteBack {
    layout: SlotLayout,
    quiet_ms: u32,
    flushes: u32,
    /// Image snapshot for programming and staging buffer for slot loads
    scratch: [u8; IMAGE_SIZE],
}

impl WriteBack {
    pub const fn new(layout: SlotLayout, quiet_ms: u32) -> Self {
        Self {
            layout,
            quiet_ms,
            flushes: 0,
            scratch: [0; IMAGE_SIZE],
        }
    }

    /// Run one round of the write-back protocol.
    ///
    /// Returns immediately with `false` when the image is clean. Otherwise
    /// blocks until a full quiet window passes without writes, then flushes
    /// the image into `slot` and returns `true`.
    pub fn service<C, S, L>(
        &mut self,
        shared: &SharedState,
        slot: SlotIndex,
        clock: &mut C,
        store: &mut S,
        led: &mut L,
    ) -> Result<bool>
    where
        C: Clock,
        S: NvStore,
        L: StatusLed,
    {
        if !shared.is_dirty() {
            return Ok(false);
        }

        let mut rounds = 0u32;
        loop {
            shared.clear_dirty();
            led.set(Rgb::BUSY);
            clock.delay_ms(self.quiet_ms);
            rounds += 1;

            if !shared.is_dirty() {
                break;
            }
        }
        if rounds > 1 {
            debug!("flush postponed {} times by bus writes", rounds - 1);
        }

        self.flush_now(shared, slot, store)?;
        led.set(Rgb::OFF);
        Ok(true)
    }

    /// Snapshot the image and write it into `slot` right away.
    pub fn flush_now<S: NvStore>(&mut self, shared: &SharedState, slot: SlotIndex, store: &mut S) -> Result<()> {
        let offset = self.layout.slot_offset(slot);

        shared.snapshot(&mut self.scratch);
        store.erase(offset, IMAGE_SIZE as u32)?;
        store.program(offset, &self.scratch)?;

        self.flushes = self.flushes.wrapping_add(1);
        info!("slot {} written to flash at {:#x}", slot.number(), offset);
        Ok(())
    }

    /// Replace the live image with the contents of `slot`.
    pub fn load_slot<S: NvStore>(&mut self, shared: &SharedState, slot: SlotIndex, store: &mut S) -> Result<()> {
        store.read(self.layout.slot_offset(slot), &mut self.scratch)?;
        shared.load(&self.scratch);
        Ok(())
    }

    /// Read the persisted slot index, recovering to slot 0 when invalid.
    pub fn read_index<S: NvStore>(&mut self, store: &mut S) -> Result<SlotIndex> {
        let mut raw = [0u8; 1];
        store.read(self.layout.index_offset(), &mut raw)?;

        let index = SlotIndex::from_persisted(raw[0]);
        if index.get() != raw[0] {
            warn!("stored slot index {:#04x} invalid, using first slot", raw[0]);
        }
        Ok(index)
    }

    /// Erase the index unit and program `slot` into its first byte.
    pub fn persist_index<S: NvStore>(&mut self, store: &mut S, slot: SlotIndex) -> Result<()> {
        let offset = self.layout.index_offset();
        let page = &mut self.scratch[..self.layout.program_unit() as usize];
        page.fill(0xFF);
        page[0] = slot.get();

        store.erase(offset, self.layout.erase_unit())?;
        store.program(offset, page)?;

        info!("active slot {} persisted", slot.number());
        Ok(())
    }

    /// Number of completed image flushes since boot.
    #[inline]
    pub fn flush_count(&self) -> u32 {
        self.flushes
    }

    #[inline]
    pub fn layout(&self) -> &SlotLayout {
        &self.layout
    }
}

// =============================================================================
// Slot Index Debounce
// =============================================================================

/// Delays persisting the slot index until switching has settled.
#[derive(Debug, Clone, Copy)]
pub struct IndexDebounce {
    quiet_ms: u32,
    pending: Option<(SlotIndex, u64)>,
}

impl IndexDebounce {
    pub const fn new(quiet_ms: u32) -> Self {
        Self { quiet_ms, pending: None }
    }

    /// Start (or restart) the quiet window for `slot`.
    pub fn arm(&mut self, slot: SlotIndex, now_ms: u64) {
        self.pending = Some((slot, now_ms));
    }

    /// Return the slot to persist once the window has fully elapsed.
    pub fn due(&mut self, now_ms: u64) -> Option<SlotIndex> {
        match self.pending {
            Some((slot, since)) if now_ms.saturating_sub(since) >= self.quiet_ms as u64 => {
                self.pending = None;
                Some(slot)
            }
            _ => None,
        }
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_debounce_keeps_last_switch() {
        let mut debounce = IndexDebounce::new(2000);
        let first = SlotIndex::new(1).unwrap();
        let second = SlotIndex::new(2).unwrap();

        debounce.arm(first, 1000);
        assert_eq!(debounce.due(2500), None);

        debounce.arm(second, 2500);
        assert_eq!(debounce.due(3999), None);
        assert_eq!(debounce.due(4500), Some(second));
        assert!(!debounce.is_pending());
        assert_eq!(debounce.due(10_000), None);
    }

    #[test]
    fn test_index_debounce_exact_window() {
        let mut debounce = IndexDebounce::new(2000);
        debounce.arm(SlotIndex::FIRST, 0);
        assert_eq!(debounce.due(1999), None);
        assert_eq!(debounce.due(2000), Some(SlotIndex::FIRST));
    }
}
