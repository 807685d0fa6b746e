//! Error type shared by the persistence, volume and orchestrator layers.

use thiserror::Error;

/// Result type for cartridge operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Cartridge error types.
///
/// Every store error is treated as fatal by the orchestrator; the others
/// are reported back to whoever issued the request.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The store reported a failed erase
    #[error("flash erase failed at {offset:#x}")]
    EraseFailed { offset: u32 },

    /// The store reported a failed program
    #[error("flash program failed at {offset:#x}")]
    ProgramFailed { offset: u32 },

    /// The store could not be read
    #[error("flash read failed at {offset:#x}")]
    ReadFailed { offset: u32 },

    /// Range does not respect erase or program granularity
    #[error("range {offset:#x}+{len:#x} is not aligned to the store granularity")]
    Misaligned { offset: u32, len: u32 },

    /// Range lies outside the store or volume
    #[error("range {offset:#x}+{len:#x} is out of bounds")]
    OutOfBounds { offset: u32, len: u32 },

    /// The slot array does not fit into the store
    #[error("slot layout needs {required:#x} bytes, store has {capacity:#x}")]
    LayoutDoesNotFit { required: u32, capacity: u32 },

    /// Write attempted on an export-only volume
    #[error("volume is write protected")]
    WriteProtected,
}

impl Error {
    /// True for failures reported by the persistence medium itself.
    pub fn is_medium_failure(&self) -> bool {
        matches!(
            self,
            Error::EraseFailed { .. } | Error::ProgramFailed { .. } | Error::ReadFailed { .. }
        )
    }
}
