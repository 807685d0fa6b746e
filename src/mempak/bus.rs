//! Bus emulation engine
//!
//! Mimics the SRAM chip inside a physical memory cartridge. Every iteration
//! takes one snapshot of all GPIO inputs and decodes the control lines the
//! way the real part does: /WE low means write regardless of /OE.
//!
//! | /CE | /WE  | /OE  | Operation                        |
//! |-----|------|------|----------------------------------|
//! | low | low  | any  | WRITE: latch data into the image |
//! | low | high | low  | READ: drive image byte on data   |
//! | -   | -    | -    | anything else: release data lines, no access |

use bitflags::bitflags;

use crate::config::pins;
use crate::hal::BusPort;
use crate::shared::SharedState;

bitflags! {
    /// Control lines in a bus snapshot. A set bit means the line is HIGH
    /// (deasserted, since all three are active low).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Control: u32 {
        const NCE = 1 << pins::NCE;
        const NOE = 1 << pins::NOE;
        const NWE = 1 << pins::NWE;
    }
}

// Compile-time masks: `decode` runs from RAM on core 1 and must not call
// into flash.
const NCE: u32 = Control::NCE.bits();
const NOE: u32 = Control::NOE.bits();
const NWE: u32 = Control::NWE.bits();
const CTRL_MASK: u32 = NCE | NOE | NWE;

/// Decoded bus operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusOp {
    /// Store `data` at `addr`
    Write { addr: u16, data: u8 },
    /// Drive the byte at `addr`
    Read { addr: u16 },
    /// Tri-state the data lines
    Idle,
}

impl BusOp {
    /// Decode a GPIO snapshot.
    #[inline(always)]
    pub fn decode(snapshot: u32) -> Self {
        let ctrl = snapshot & CTRL_MASK;
        let addr = (snapshot & pins::ADDR_MASK) as u16;

        if ctrl == 0 || ctrl == NOE {
            let data = ((snapshot & pins::DATA_MASK) >> pins::DATA_SHIFT) as u8;
            BusOp::Write { addr, data }
        } else if ctrl == NWE {
            BusOp::Read { addr }
        } else {
            BusOp::Idle
        }
    }
}

/// The real-time loop serving the console.
pub struct BusEngine<'a> {
    shared: &'a SharedState,
}

impl<'a> BusEngine<'a> {
    pub const fn new(shared: &'a SharedState) -> Self {
        Self { shared }
    }

    /// Sample the bus once and serve the decoded operation.
    #[inline(always)]
    pub fn step<P: BusPort>(&self, port: &mut P) -> BusOp {
        let op = BusOp::decode(port.sample());

        match op {
            BusOp::Write { addr, data } => {
                port.release_data();
                self.shared.write_byte(addr as usize, data);
            }
            BusOp::Read { addr } => {
                port.drive_data(self.shared.read_byte(addr as usize));
            }
            BusOp::Idle => port.release_data(),
        }

        op
    }

    /// Serve the bus forever. Never allocates, never blocks.
    #[inline(always)]
    pub fn run<P: BusPort>(&self, port: &mut P) -> ! {
        loop {
            self.step(port);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(addr: u16, data: u8, nce: bool, noe: bool, nwe: bool) -> u32 {
        let mut bits = addr as u32 | ((data as u32) << pins::DATA_SHIFT);
        if nce {
            bits |= Control::NCE.bits();
        }
        if noe {
            bits |= Control::NOE.bits();
        }
        if nwe {
            bits |= Control::NWE.bits();
        }
        bits
    }

    #[test]
    fn test_write_ignores_output_enable() {
        assert_eq!(
            BusOp::decode(snapshot(0x0100, 0x5A, false, false, false)),
            BusOp::Write { addr: 0x0100, data: 0x5A }
        );
        assert_eq!(
            BusOp::decode(snapshot(0x0100, 0x5A, false, true, false)),
            BusOp::Write { addr: 0x0100, data: 0x5A }
        );
    }

    #[test]
    fn test_read() {
        assert_eq!(
            BusOp::decode(snapshot(0x7FFF, 0x00, false, false, true)),
            BusOp::Read { addr: 0x7FFF }
        );
    }

    #[test]
    fn test_idle_combinations() {
        // Both strobes high
        assert_eq!(BusOp::decode(snapshot(0x10, 0x00, false, true, true)), BusOp::Idle);
        // Chip not selected
        assert_eq!(BusOp::decode(snapshot(0x10, 0x00, true, false, false)), BusOp::Idle);
        assert_eq!(BusOp::decode(snapshot(0x10, 0x00, true, false, true)), BusOp::Idle);
        assert_eq!(BusOp::decode(snapshot(0x10, 0x00, true, true, true)), BusOp::Idle);
    }

    #[test]
    fn test_unrelated_pins_do_not_affect_decode() {
        // Detect, LED and button lines toggling must not change the operation
        let noise = (1 << pins::DETECT) | (1 << pins::LED) | (1 << pins::BUTTON);
        assert_eq!(
            BusOp::decode(snapshot(0x0042, 0x99, false, true, false) | noise),
            BusOp::Write { addr: 0x0042, data: 0x99 }
        );
    }

    #[test]
    fn test_control_masks_match_flags() {
        assert_eq!(CTRL_MASK, Control::all().bits());

        // Every control combination decodes the same as the flag set says
        for bits in 0..8u32 {
            let ctrl = Control::from_bits_truncate(
                (if bits & 1 != 0 { NCE } else { 0 })
                    | (if bits & 2 != 0 { NOE } else { 0 })
                    | (if bits & 4 != 0 { NWE } else { 0 }),
            );
            let expected = if ctrl.is_empty() || ctrl == Control::NOE {
                BusOp::Write { addr: 0x0321, data: 0xC3 }
            } else if ctrl == Control::NWE {
                BusOp::Read { addr: 0x0321 }
            } else {
                BusOp::Idle
            };
            let snapshot = 0x0321 | (0xC3 << pins::DATA_SHIFT) | ctrl.bits();
            assert_eq!(BusOp::decode(snapshot), expected, "control {:?}", ctrl);
        }
    }
}
