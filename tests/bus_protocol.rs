//! Console-side view of the bus engine: what the console writes it must be
//! able to read back, and the engine must never fight the console for the
//! data lines.

mod common;

use common::SimBusPort;
use mempak::config::{IMAGE_SIZE, pins};
use mempak::{BusEngine, BusOp, Control, SharedState};
use proptest::prelude::*;

fn lines(addr: u16, data: u8, ctrl: Control) -> u32 {
    (addr as u32 & pins::ADDR_MASK) | ((data as u32) << pins::DATA_SHIFT) | ctrl.bits()
}

fn console_write(engine: &BusEngine<'_>, port: &mut SimBusPort, addr: u16, data: u8) -> BusOp {
    port.lines = lines(addr, data, Control::NOE);
    let op = engine.step(port);
    port.lines = lines(0, 0, Control::all());
    engine.step(port);
    op
}

fn console_read(engine: &BusEngine<'_>, port: &mut SimBusPort, addr: u16) -> Option<u8> {
    port.lines = lines(addr, 0, Control::NWE);
    engine.step(port);
    let driven = port.driven;
    port.lines = lines(0, 0, Control::all());
    engine.step(port);
    driven
}

#[test]
fn test_write_then_read_back() {
    let shared = Box::new(SharedState::new());
    let engine = BusEngine::new(&shared);
    let mut port = SimBusPort::new();

    assert_eq!(console_write(&engine, &mut port, 0x1234, 0x5A), BusOp::Write { addr: 0x1234, data: 0x5A });
    assert!(shared.is_dirty());
    assert_eq!(console_read(&engine, &mut port, 0x1234), Some(0x5A));
    assert_eq!(port.driven, None);
}

#[test]
fn test_last_address_is_reachable() {
    let shared = Box::new(SharedState::new());
    let engine = BusEngine::new(&shared);
    let mut port = SimBusPort::new();

    let last = (IMAGE_SIZE - 1) as u16;
    console_write(&engine, &mut port, last, 0xEE);
    assert_eq!(shared.read_byte(IMAGE_SIZE - 1), 0xEE);
    assert_eq!(console_read(&engine, &mut port, last), Some(0xEE));
}

#[test]
fn test_deselected_chip_ignores_bus() {
    let shared = Box::new(SharedState::new());
    let engine = BusEngine::new(&shared);
    let mut port = SimBusPort::new();

    // /CE high with a write pattern on the other lines
    port.lines = lines(0x10, 0x99, Control::NCE | Control::NOE);
    assert_eq!(engine.step(&mut port), BusOp::Idle);
    assert_eq!(shared.read_byte(0x10), 0);
    assert!(!shared.is_dirty());

    // /CE high with a read pattern
    port.lines = lines(0x10, 0, Control::NCE | Control::NWE);
    assert_eq!(engine.step(&mut port), BusOp::Idle);
    assert_eq!(port.driven, None);
}

#[test]
fn test_data_released_when_read_ends() {
    let shared = Box::new(SharedState::new());
    shared.write_byte(3, 0x42);
    let engine = BusEngine::new(&shared);
    let mut port = SimBusPort::new();

    port.lines = lines(3, 0, Control::NWE);
    engine.step(&mut port);
    assert_eq!(port.driven, Some(0x42));

    // Console switches straight from reading to writing
    port.lines = lines(3, 0x24, Control::empty());
    assert_eq!(engine.step(&mut port), BusOp::Write { addr: 3, data: 0x24 });
    assert_eq!(port.driven, None);
    assert_eq!(shared.read_byte(3), 0x24);
}

proptest! {
    #[test]
    fn prop_image_matches_last_write(writes in prop::collection::vec((0u16..IMAGE_SIZE as u16, any::<u8>()), 1..64)) {
        let shared = Box::new(SharedState::new());
        let engine = BusEngine::new(&shared);
        let mut port = SimBusPort::new();
        let mut model = vec![0u8; IMAGE_SIZE];

        for &(addr, data) in &writes {
            console_write(&engine, &mut port, addr, data);
            model[addr as usize] = data;
        }

        for &(addr, _) in &writes {
            prop_assert_eq!(console_read(&engine, &mut port, addr), Some(model[addr as usize]));
        }
    }

    #[test]
    fn prop_pulled_up_strobes_leave_image_alone(floating in any::<u32>(), samples in 1usize..16) {
        // Nothing plugged in: strobes sit at their pull-ups, address and data float
        let shared = Box::new(SharedState::new());
        let engine = BusEngine::new(&shared);
        let mut port = SimBusPort::new();

        for i in 0..samples {
            let jitter = floating.rotate_left(i as u32) & (pins::ADDR_MASK | pins::DATA_MASK);
            port.lines = jitter | Control::all().bits();
            prop_assert_eq!(engine.step(&mut port), BusOp::Idle);
            prop_assert_eq!(port.driven, None);
        }
        prop_assert!(!shared.is_dirty());
    }

    #[test]
    fn prop_noise_on_unrelated_pins_is_ignored(addr in 0u16..IMAGE_SIZE as u16, data in any::<u8>(), noise in any::<u32>()) {
        let known = pins::ADDR_MASK | pins::DATA_MASK | Control::all().bits();
        let clean = lines(addr, data, Control::NOE);
        prop_assert_eq!(BusOp::decode(clean | (noise & !known)), BusOp::decode(clean));
    }
}
