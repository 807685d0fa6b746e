//! Block view of the live image for the USB mass-storage transport.
//!
//! The host sees one small disk of `VOLUME_BLOCKS` blocks. In export mode
//! the disk is write protected; in import mode every written block lands in
//! the live image and the transfer counts as complete once every block has
//! been written at least once.

use log::info;

use crate::config::{IMAGE_SIZE, VOLUME_BLOCK_SIZE, VOLUME_BLOCKS};
use crate::error::{Error, Result};
use crate::shared::SharedState;

// One bit per block in the written mask.
const _: () = assert!(VOLUME_BLOCKS <= 64);

const ALL_BLOCKS: u64 = u64::MAX >> (64 - VOLUME_BLOCKS);

/// Which way the image travels over USB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host reads the image; writes are refused
    Export,
    /// Host writes a new image
    Import,
}

/// Result of a block write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteProgress {
    /// More blocks are still missing (or the image was already complete)
    Partial,
    /// This write completed the image for the first time
    Complete,
}

/// The image exposed as a fixed-size block device.
pub struct ImageVolume<'a> {
    shared: &'a SharedState,
    direction: Direction,
    written: u64,
    completed_at: Option<u64>,
}

impl<'a> ImageVolume<'a> {
    pub fn new(shared: &'a SharedState, direction: Direction) -> Self {
        Self {
            shared,
            direction,
            written: 0,
            completed_at: None,
        }
    }

    #[inline]
    pub const fn block_size(&self) -> usize {
        VOLUME_BLOCK_SIZE
    }

    #[inline]
    pub const fn block_count(&self) -> usize {
        VOLUME_BLOCKS
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[inline]
    pub fn is_writable(&self) -> bool {
        self.direction == Direction::Import
    }

    /// Copy block `lba` into `buf` (at least one block long).
    pub fn read_block(&self, lba: u32, buf: &mut [u8]) -> Result<()> {
        let offset = Self::block_offset(lba, buf.len())?;
        self.shared.read_range(offset, &mut buf[..VOLUME_BLOCK_SIZE]);
        Ok(())
    }

    /// Store one block from the host into the live image.
    pub fn write_block(&mut self, lba: u32, data: &[u8]) -> Result<WriteProgress> {
        if !self.is_writable() {
            return Err(Error::WriteProtected);
        }
        let offset = Self::block_offset(lba, data.len())?;
        self.shared.write_range(offset, &data[..VOLUME_BLOCK_SIZE]);

        let was_complete = self.is_complete();
        self.written |= 1u64 << lba;
        if !was_complete && self.is_complete() {
            info!("USB import complete, {} blocks received", VOLUME_BLOCKS);
            return Ok(WriteProgress::Complete);
        }
        Ok(WriteProgress::Partial)
    }

    /// True once every block has been written.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.written == ALL_BLOCKS
    }

    /// Record when the completed image was made durable.
    pub fn mark_completed(&mut self, now_ms: u64) {
        self.completed_at.get_or_insert(now_ms);
    }

    /// Timestamp of `mark_completed`, if any.
    #[inline]
    pub fn completed_at(&self) -> Option<u64> {
        self.completed_at
    }

    fn block_offset(lba: u32, len: usize) -> Result<usize> {
        let offset = lba as usize * VOLUME_BLOCK_SIZE;
        if lba as usize >= VOLUME_BLOCKS || offset + VOLUME_BLOCK_SIZE > IMAGE_SIZE {
            return Err(Error::OutOfBounds {
                offset: offset as u32,
                len: VOLUME_BLOCK_SIZE as u32,
            });
        }
        if len < VOLUME_BLOCK_SIZE {
            return Err(Error::OutOfBounds {
                offset: offset as u32,
                len: len as u32,
            });
        }
        Ok(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_refuses_writes() {
        let shared = Box::new(SharedState::new());
        let mut volume = ImageVolume::new(&shared, Direction::Export);

        assert_eq!(volume.write_block(0, &[0u8; VOLUME_BLOCK_SIZE]), Err(Error::WriteProtected));
        assert!(!shared.is_dirty());
    }

    #[test]
    fn test_read_block_maps_to_image() {
        let shared = Box::new(SharedState::new());
        shared.write_byte(VOLUME_BLOCK_SIZE * 3 + 7, 0xC3);

        let volume = ImageVolume::new(&shared, Direction::Export);
        let mut buf = [0u8; VOLUME_BLOCK_SIZE];
        volume.read_block(3, &mut buf).unwrap();
        assert_eq!(buf[7], 0xC3);

        assert!(matches!(
            volume.read_block(VOLUME_BLOCKS as u32, &mut buf),
            Err(Error::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_import_completes_once() {
        let shared = Box::new(SharedState::new());
        let mut volume = ImageVolume::new(&shared, Direction::Import);
        let block = [0x11u8; VOLUME_BLOCK_SIZE];

        // Out of order and with a rewrite, like a host with a cache would do
        for lba in (1..VOLUME_BLOCKS as u32).rev() {
            assert_eq!(volume.write_block(lba, &block), Ok(WriteProgress::Partial));
        }
        assert_eq!(volume.write_block(5, &block), Ok(WriteProgress::Partial));
        assert!(!volume.is_complete());

        assert_eq!(volume.write_block(0, &block), Ok(WriteProgress::Complete));
        assert_eq!(volume.write_block(0, &block), Ok(WriteProgress::Partial));
        assert_eq!(shared.read_byte(IMAGE_SIZE - 1), 0x11);
    }
}
