//! Button gesture recognizer
//!
//! The device has one button, so every operator command is a short sequence
//! of presses. A press held longer than the long-press threshold is Long,
//! anything else is Short. A sequence ends once the button has stayed
//! released for the maximum pause; it is then evaluated exactly once.
//!
//! | Sequence       | Action         |
//! |----------------|----------------|
//! | Short          | NextSlot       |
//! | Long           | ExportViaUsb   |
//! | Long, Long     | ImportViaUsb   |
//! | anything else  | None           |

use log::debug;

/// Presses kept per sequence. Further presses still count, which makes the
/// sequence invalid.
pub const MAX_SEQUENCE: usize = 2;

/// Classification of one press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressKind {
    Short,
    Long,
}

impl PressKind {
    /// Classify a press by how long it was held.
    #[inline]
    pub fn classify(held_ms: u64, long_press_ms: u32) -> Self {
        if held_ms > long_press_ms as u64 {
            PressKind::Long
        } else {
            PressKind::Short
        }
    }
}

/// Operator command decoded from a completed sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureAction {
    None,
    /// Switch to the next virtual cartridge
    NextSlot,
    /// Present the image read-only over USB
    ExportViaUsb,
    /// Accept a new image over USB
    ImportViaUsb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Pressed { since: u64 },
    AwaitingSequenceEnd { last_release: u64 },
}

/// Sampled state machine turning button levels into actions.
pub struct GestureRecognizer {
    long_press_ms: u32,
    max_pause_ms: u32,
    phase: Phase,
    records: [PressKind; MAX_SEQUENCE],
    /// Presses in the current sequence, may exceed `MAX_SEQUENCE`
    presses: u8,
}

impl GestureRecognizer {
    pub const fn new(long_press_ms: u32, max_pause_ms: u32) -> Self {
        Self {
            long_press_ms,
            max_pause_ms,
            phase: Phase::Idle,
            records: [PressKind::Short; MAX_SEQUENCE],
            presses: 0,
        }
    }

    /// Feed one button sample taken at `now_ms`.
    ///
    /// Returns an action only on the sample that ends a sequence; every other
    /// sample yields `GestureAction::None`.
    pub fn poll(&mut self, pressed: bool, now_ms: u64) -> GestureAction {
        match (self.phase, pressed) {
            (Phase::Pressed { .. }, true) => GestureAction::None,
            (_, true) => {
                self.phase = Phase::Pressed { since: now_ms };
                GestureAction::None
            }
            (Phase::Pressed { since }, false) => {
                let kind = PressKind::classify(now_ms.saturating_sub(since), self.long_press_ms);
                if (self.presses as usize) < MAX_SEQUENCE {
                    self.records[self.presses as usize] = kind;
                }
                self.presses = self.presses.saturating_add(1);
                self.phase = Phase::AwaitingSequenceEnd { last_release: now_ms };
                GestureAction::None
            }
            (Phase::AwaitingSequenceEnd { last_release }, false)
                if now_ms.saturating_sub(last_release) >= self.max_pause_ms as u64 =>
            {
                let action = self.evaluate();
                debug!("gesture of {} press(es) -> {:?}", self.presses, action);
                self.reset();
                action
            }
            _ => GestureAction::None,
        }
    }

    /// True while a press is held or a sequence is waiting for its pause.
    #[inline]
    pub fn is_busy(&self) -> bool {
        self.phase != Phase::Idle
    }

    fn evaluate(&self) -> GestureAction {
        match (self.presses, self.records) {
            (1, [PressKind::Short, _]) => GestureAction::NextSlot,
            (1, [PressKind::Long, _]) => GestureAction::ExportViaUsb,
            (2, [PressKind::Long, PressKind::Long]) => GestureAction::ImportViaUsb,
            _ => GestureAction::None,
        }
    }

    fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.presses = 0;
    }
}
