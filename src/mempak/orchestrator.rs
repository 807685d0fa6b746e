//! Mode orchestrator
//!
//! The control loop running on core 0. One `step()` is one iteration:
//!
//! 1. Service the image write-back (may block for whole quiet windows)
//! 2. Sample the button and feed the gesture recognizer
//! 3. Act on the decoded gesture (slot switch or USB handoff)
//! 4. Persist the slot index once switching has settled
//!
//! Once the USB transport has been attached the loop only services the
//! transport. Transport mode, a completed import and fatal errors can only be
//! left by resetting the chip; they show up as terminal [`Mode`]s that the
//! platform turns into a reset.

use log::{error, info};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::gesture::{GestureAction, GestureRecognizer};
use crate::hal::{Board, Clock, DetectLine, PressButton, Platform, Transport};
use crate::layout::{SlotIndex, SlotLayout};
use crate::persist::{IndexDebounce, WriteBack};
use crate::shared::SharedState;
use crate::status;
use crate::volume::{Direction, ImageVolume};

// =============================================================================
// Boot Path
// =============================================================================

/// Decision taken once, before anything else runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootPath {
    /// Button held at power-up: hand over to the ROM USB bootloader
    Bootloader,
    /// Regular cartridge emulation
    Normal,
}

impl BootPath {
    /// Sample the button exactly once.
    pub fn select<B: PressButton>(button: &mut B) -> Self {
        if button.is_pressed() {
            BootPath::Bootloader
        } else {
            BootPath::Normal
        }
    }
}

// =============================================================================
// Mode
// =============================================================================

/// Top-level device mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Emulating the cartridge and watching the button
    Normal,
    /// Image handed to the USB transport
    Transport(Direction),
    /// Import finished and persisted; the chip must be reset
    Restart,
    /// The store failed; the chip must be reset
    FatalRestart(Error),
}

impl Mode {
    /// Only a chip reset leaves a terminal mode.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Mode::Restart | Mode::FatalRestart(_))
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Control loop state for one device.
pub struct Orchestrator<'s, P: Platform> {
    shared: &'s SharedState,
    board: Board<P>,
    config: Config,
    slot: SlotIndex,
    mode: Mode,
    write_back: WriteBack,
    index_debounce: IndexDebounce,
    gesture: GestureRecognizer,
    volume: Option<ImageVolume<'s>>,
}

impl<'s, P: Platform> Orchestrator<'s, P> {
    pub fn new(shared: &'s SharedState, board: Board<P>, layout: SlotLayout, config: Config) -> Self {
        Self {
            shared,
            board,
            config,
            slot: SlotIndex::FIRST,
            mode: Mode::Normal,
            write_back: WriteBack::new(layout, config.flush_quiet_ms),
            index_debounce: IndexDebounce::new(config.index_quiet_ms),
            gesture: GestureRecognizer::new(config.long_press_ms, config.max_pause_ms),
            volume: None,
        }
    }

    /// Restore the persisted slot, start the bus engine and announce the slot.
    ///
    /// `start_engine` must launch the bus engine on the other core. The
    /// settling delay afterwards keeps the first button sample (which may
    /// briefly take the flash offline) away from the engine start-up.
    pub fn boot<F: FnOnce()>(&mut self, start_engine: F) -> Result<()> {
        let board = &mut self.board;

        self.slot = self.write_back.read_index(&mut board.store)?;
        self.write_back.load_slot(self.shared, self.slot, &mut board.store)?;
        info!("booting with slot {}", self.slot.number());

        start_engine();

        status::blink(&mut board.led, &mut board.clock, self.slot.number(), self.config.blink_interval_ms);
        board.clock.delay_ms(self.config.engine_settle_ms);
        Ok(())
    }

    /// Run one loop iteration and return the resulting mode.
    pub fn step(&mut self) -> Mode {
        let result = match self.mode {
            Mode::Normal => self.step_normal(),
            Mode::Transport(_) => self.step_transport(),
            Mode::Restart | Mode::FatalRestart(_) => Ok(()),
        };

        if let Err(err) = result {
            error!("fatal: {}", err);
            self.mode = Mode::FatalRestart(err);
        }
        self.mode
    }

    fn step_normal(&mut self) -> Result<()> {
        {
            let board = &mut self.board;
            self.write_back.service(
                self.shared,
                self.slot,
                &mut board.clock,
                &mut board.store,
                &mut board.led,
            )?;
        }

        let pressed = self.board.button.is_pressed();
        match self.gesture.poll(pressed, self.board.clock.now_ms()) {
            GestureAction::NextSlot => self.switch_slot()?,
            GestureAction::ExportViaUsb => return self.enter_transport(Direction::Export),
            GestureAction::ImportViaUsb => return self.enter_transport(Direction::Import),
            GestureAction::None => {}
        }

        if let Some(slot) = self.index_debounce.due(self.board.clock.now_ms()) {
            self.write_back.persist_index(&mut self.board.store, slot)?;
        }

        self.board.clock.delay_ms(self.config.poll_interval_ms);
        Ok(())
    }

    /// Advance to the next slot and make the console re-read the cartridge.
    fn switch_slot(&mut self) -> Result<()> {
        let board = &mut self.board;

        self.slot = self.slot.next();
        self.write_back.load_slot(self.shared, self.slot, &mut board.store)?;
        info!("switched to slot {}", self.slot.number());

        status::blink(&mut board.led, &mut board.clock, self.slot.number(), self.config.blink_interval_ms);
        self.index_debounce.arm(self.slot, board.clock.now_ms());

        // Simulate pulling the cartridge out and plugging it back in
        board.detect.set_present(false);
        board.clock.delay_ms(self.config.detect_pulse_ms);
        board.detect.set_present(true);
        Ok(())
    }

    fn enter_transport(&mut self, direction: Direction) -> Result<()> {
        // The transport never returns to normal mode, so a pending index
        // would otherwise be lost.
        if self.index_debounce.is_pending() {
            self.index_debounce = IndexDebounce::new(self.config.index_quiet_ms);
            self.write_back.persist_index(&mut self.board.store, self.slot)?;
        }

        info!("handing slot {} to USB ({:?})", self.slot.number(), direction);
        self.board.transport.attach(direction);
        self.volume = Some(ImageVolume::new(self.shared, direction));
        self.mode = Mode::Transport(direction);
        Ok(())
    }

    fn step_transport(&mut self) -> Result<()> {
        let Some(volume) = self.volume.as_mut() else {
            return Ok(());
        };
        let board = &mut self.board;

        board.transport.poll(volume);

        if volume.is_complete() && volume.completed_at().is_none() {
            self.write_back.flush_now(self.shared, self.slot, &mut board.store)?;
            volume.mark_completed(board.clock.now_ms());
        }

        if let Some(done) = volume.completed_at() {
            if board.clock.elapsed_ms(done) > self.config.eject_settle_ms as u64 {
                info!("import settled, restarting");
                self.mode = Mode::Restart;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[inline]
    pub fn slot(&self) -> SlotIndex {
        self.slot
    }

    #[inline]
    pub fn shared(&self) -> &'s SharedState {
        self.shared
    }

    #[inline]
    pub fn board(&self) -> &Board<P> {
        &self.board
    }

    #[inline]
    pub fn board_mut(&mut self) -> &mut Board<P> {
        &mut self.board
    }

    #[inline]
    pub fn write_back(&self) -> &WriteBack {
        &self.write_back
    }
}
