//! Flash layout of the virtual cartridge slots.
//!
//! The slots sit at the very top of the store, one image each. The erase
//! unit directly below them holds the active slot index in its first byte:
//!
//! ```text
//! capacity - N*IMAGE - ERASE   index unit  [idx, 0xFF, 0xFF, ...]
//! capacity - N*IMAGE           slot 0
//! capacity - (N-1)*IMAGE       slot 1
//! ...
//! capacity - IMAGE             slot N-1
//! ```

use crate::config::{IMAGE_SIZE, SLOT_COUNT};
use crate::error::{Error, Result};
use crate::hal::NvStore;

// =============================================================================
// Slot Index
// =============================================================================

/// Index of the active virtual cartridge, always in `[0, SLOT_COUNT)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct SlotIndex(u8);

impl SlotIndex {
    pub const FIRST: Self = Self(0);

    /// Build from a raw value, `None` if out of range.
    pub const fn new(raw: u8) -> Option<Self> {
        if raw < SLOT_COUNT { Some(Self(raw)) } else { None }
    }

    /// Interpret the byte read back from flash. Erased flash reads 0xFF,
    /// anything out of range falls back to the first slot.
    pub const fn from_persisted(raw: u8) -> Self {
        match Self::new(raw) {
            Some(index) => index,
            None => Self::FIRST,
        }
    }

    /// Next slot, wrapping after the last one.
    pub const fn next(self) -> Self {
        Self((self.0 + 1) % SLOT_COUNT)
    }

    #[inline]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// One-based number shown to the operator.
    #[inline]
    pub const fn number(self) -> u32 {
        self.0 as u32 + 1
    }
}

// =============================================================================
// Slot Layout
// =============================================================================

/// Byte offsets of the slot regions and the index unit inside a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotLayout {
    slots_base: u32,
    index_offset: u32,
    erase_unit: u32,
    program_unit: u32,
}

impl SlotLayout {
    /// Place the slot array at the top of a store with the given geometry.
    pub fn new(capacity: u32, erase_unit: u32, program_unit: u32) -> Result<Self> {
        let image = IMAGE_SIZE as u32;
        let slots_len = image * SLOT_COUNT as u32;
        let required = slots_len + erase_unit;

        if erase_unit == 0
            || program_unit == 0
            || image % erase_unit != 0
            || image % program_unit != 0
            || erase_unit % program_unit != 0
        {
            return Err(Error::Misaligned { offset: 0, len: image });
        }
        if required > capacity {
            return Err(Error::LayoutDoesNotFit { required, capacity });
        }

        let slots_base = capacity - slots_len;
        Ok(Self {
            slots_base,
            index_offset: slots_base - erase_unit,
            erase_unit,
            program_unit,
        })
    }

    /// Layout for a concrete store.
    pub fn for_store<S: NvStore>(store: &S) -> Result<Self> {
        Self::new(store.capacity(), store.erase_unit(), store.program_unit())
    }

    /// Offset of the region backing `slot`.
    #[inline]
    pub fn slot_offset(&self, slot: SlotIndex) -> u32 {
        self.slots_base + slot.get() as u32 * IMAGE_SIZE as u32
    }

    /// Offset of the erase unit holding the index byte.
    #[inline]
    pub fn index_offset(&self) -> u32 {
        self.index_offset
    }

    #[inline]
    pub fn erase_unit(&self) -> u32 {
        self.erase_unit
    }

    #[inline]
    pub fn program_unit(&self) -> u32 {
        self.program_unit
    }

    /// Lowest byte used by the layout; everything below is free for code.
    #[inline]
    pub fn reserved_start(&self) -> u32 {
        self.index_offset
    }
}
