//! # mempak - Controller Memory Cartridge Emulator Core
//!
//! A `no_std` core that makes a dual-core microcontroller behave like the
//! battery-backed SRAM cartridge a console expects in its controller port.
//! All hardware access is abstracted through the traits in [`hal`], which
//! the platform binary implements for a concrete board.
//!
//! ## Components
//!
//! - [`bus`] - Real-time bus emulation loop (runs alone on the second core)
//! - [`persist`] - Debounced write-back of the image and the slot index
//! - [`gesture`] - Single-button press sequence recognizer
//! - [`orchestrator`] - Top-level mode machine tying everything together
//! - [`volume`] - Block view of the image for the USB mass-storage transport
//!
//! ## Usage
//!
//! ```ignore
//! use mempak::{Config, Orchestrator, SharedState, SlotLayout};
//!
//! static SHARED: SharedState = SharedState::new();
//!
//! let layout = SlotLayout::for_store(&store)?;
//! let mut orch = Orchestrator::new(&SHARED, board, layout, Config::DEFAULT);
//! orch.boot(|| spawn_bus_engine(&SHARED))?;
//!
//! loop {
//!     if orch.step().is_terminal() {
//!         reset();
//!     }
//! }
//! ```

#![cfg_attr(not(test), no_std)]
#![allow(clippy::new_without_default)]

pub mod bus;
pub mod config;
pub mod error;
pub mod gesture;
pub mod hal;
pub mod layout;
pub mod orchestrator;
pub mod persist;
pub mod shared;
pub mod status;
pub mod volume;

// Re-exports for convenience
pub use bus::{BusEngine, BusOp, Control};
pub use config::Config;
pub use error::{Error, Result};
pub use gesture::{GestureAction, GestureRecognizer, PressKind};
pub use hal::{Board, BusPort, Clock, DetectLine, NvStore, Platform, PressButton, StatusLed, Transport};
pub use layout::{SlotIndex, SlotLayout};
pub use orchestrator::{BootPath, Mode, Orchestrator};
pub use persist::{IndexDebounce, WriteBack};
pub use shared::SharedState;
pub use status::Rgb;
pub use volume::{Direction, ImageVolume, WriteProgress};
