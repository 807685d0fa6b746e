//! Simulated board for the integration tests.
//!
//! Every peripheral shares one `World`: a millisecond clock that only moves
//! when someone sleeps, a 2 MiB flash array, scripted button presses, bus
//! writes scheduled at fixed times and a log of everything the firmware did.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use mempak::config::{IMAGE_SIZE, VOLUME_BLOCK_SIZE};
use mempak::{
    Board, BusPort, Clock, DetectLine, Direction, Error, ImageVolume, NvStore, Platform, PressButton, Result, Rgb,
    SharedState, SlotIndex, SlotLayout, StatusLed, Transport, WriteProgress,
};

pub const FLASH_SIZE: u32 = 2 * 1024 * 1024;
pub const ERASE_UNIT: u32 = 4096;
pub const PROGRAM_UNIT: u32 = 256;

// =============================================================================
// World
// =============================================================================

/// Something the firmware did, stamped with the simulated time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Led(Rgb),
    Detect(bool),
    Erase { offset: u32, len: u32 },
    Program { offset: u32, len: u32 },
    Attach(Direction),
    EngineStarted,
}

/// Host request replayed by the simulated USB transport.
#[derive(Debug, Clone, Copy)]
pub enum HostOp {
    Read(u32),
    Write(u32, u8),
}

pub struct World {
    pub shared: &'static SharedState,
    now: Cell<u64>,
    flash: RefCell<Vec<u8>>,
    presses: RefCell<Vec<(u64, u64)>>,
    bus_writes: RefCell<VecDeque<(u64, usize, u8)>>,
    events: RefCell<Vec<(u64, Event)>>,
    host_ops: RefCell<VecDeque<HostOp>>,
    host_results: RefCell<Vec<core::result::Result<Vec<u8>, Error>>>,
    pub fail_program: Cell<bool>,
}

impl World {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            shared: Box::leak(Box::new(SharedState::new())),
            now: Cell::new(0),
            flash: RefCell::new(vec![0xFF; FLASH_SIZE as usize]),
            presses: RefCell::new(Vec::new()),
            bus_writes: RefCell::new(VecDeque::new()),
            events: RefCell::new(Vec::new()),
            host_ops: RefCell::new(VecDeque::new()),
            host_results: RefCell::new(Vec::new()),
            fail_program: Cell::new(false),
        })
    }

    pub fn layout() -> SlotLayout {
        SlotLayout::new(FLASH_SIZE, ERASE_UNIT, PROGRAM_UNIT).unwrap()
    }

    pub fn now(&self) -> u64 {
        self.now.get()
    }

    /// Move time forward, landing every scheduled bus write on the way.
    pub fn advance(&self, ms: u64) {
        let target = self.now.get() + ms;
        loop {
            let next = self.bus_writes.borrow().front().copied();
            match next {
                Some((at, addr, value)) if at <= target => {
                    self.bus_writes.borrow_mut().pop_front();
                    self.now.set(self.now.get().max(at));
                    self.shared.write_byte(addr, value);
                }
                _ => break,
            }
        }
        self.now.set(target);
    }

    /// Queue a console write at an absolute time (must be in order).
    pub fn schedule_write(&self, at: u64, addr: usize, value: u8) {
        self.bus_writes.borrow_mut().push_back((at, addr, value));
    }

    /// Hold the button from `start` for `duration` ms.
    pub fn press_at(&self, start: u64, duration: u64) {
        self.presses.borrow_mut().push((start, start + duration));
    }

    /// Hold the button shortly after the current time.
    pub fn press_soon(&self, duration: u64) {
        let start = self.now() + 20;
        self.press_at(start, duration);
    }

    pub fn record(&self, event: Event) {
        self.events.borrow_mut().push((self.now(), event));
    }

    pub fn events(&self) -> Vec<(u64, Event)> {
        self.events.borrow().clone()
    }

    pub fn flash(&self, offset: u32, len: usize) -> Vec<u8> {
        self.flash.borrow()[offset as usize..offset as usize + len].to_vec()
    }

    /// Put an image into a slot as if it had been flushed earlier.
    pub fn preload_slot(&self, slot: u8, fill: u8) {
        let offset = Self::layout().slot_offset(SlotIndex::new(slot).unwrap()) as usize;
        self.flash.borrow_mut()[offset..offset + IMAGE_SIZE].fill(fill);
    }

    pub fn preload_index(&self, raw: u8) {
        let offset = Self::layout().index_offset() as usize;
        self.flash.borrow_mut()[offset] = raw;
    }

    pub fn persisted_index(&self) -> u8 {
        self.flash(Self::layout().index_offset(), 1)[0]
    }

    pub fn slot_image(&self, slot: u8) -> Vec<u8> {
        let offset = Self::layout().slot_offset(SlotIndex::new(slot).unwrap());
        self.flash(offset, IMAGE_SIZE)
    }

    pub fn programs_at(&self, offset: u32) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|(t, e)| match e {
                Event::Program { offset: o, .. } if o == offset => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn queue_host(&self, ops: impl IntoIterator<Item = HostOp>) {
        self.host_ops.borrow_mut().extend(ops);
    }

    pub fn host_results(&self) -> Vec<core::result::Result<Vec<u8>, Error>> {
        self.host_results.borrow().clone()
    }
}

// =============================================================================
// Peripherals
// =============================================================================

pub struct SimClock(pub Rc<World>);

impl Clock for SimClock {
    fn now_ms(&self) -> u64 {
        self.0.now()
    }

    fn delay_ms(&mut self, ms: u32) {
        self.0.advance(ms as u64);
    }
}

pub struct SimStore(pub Rc<World>);

impl SimStore {
    fn check(&self, offset: u32, len: u32, unit: u32) -> Result<()> {
        if offset % unit != 0 || len % unit != 0 {
            return Err(Error::Misaligned { offset, len });
        }
        if offset as u64 + len as u64 > FLASH_SIZE as u64 {
            return Err(Error::OutOfBounds { offset, len });
        }
        Ok(())
    }
}

impl NvStore for SimStore {
    fn capacity(&self) -> u32 {
        FLASH_SIZE
    }

    fn erase_unit(&self) -> u32 {
        ERASE_UNIT
    }

    fn program_unit(&self) -> u32 {
        PROGRAM_UNIT
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<()> {
        if offset as usize + buf.len() > FLASH_SIZE as usize {
            return Err(Error::OutOfBounds { offset, len: buf.len() as u32 });
        }
        buf.copy_from_slice(&self.0.flash(offset, buf.len()));
        Ok(())
    }

    fn erase(&mut self, offset: u32, len: u32) -> Result<()> {
        self.check(offset, len, ERASE_UNIT)?;
        self.0.flash.borrow_mut()[offset as usize..(offset + len) as usize].fill(0xFF);
        self.0.record(Event::Erase { offset, len });
        Ok(())
    }

    fn program(&mut self, offset: u32, data: &[u8]) -> Result<()> {
        self.check(offset, data.len() as u32, PROGRAM_UNIT)?;
        if self.0.fail_program.get() {
            return Err(Error::ProgramFailed { offset });
        }
        // NOR flash can only clear bits
        let mut flash = self.0.flash.borrow_mut();
        for (cell, byte) in flash[offset as usize..].iter_mut().zip(data) {
            *cell &= *byte;
        }
        drop(flash);
        self.0.record(Event::Program { offset, len: data.len() as u32 });
        Ok(())
    }
}

pub struct SimButton(pub Rc<World>);

impl PressButton for SimButton {
    fn is_pressed(&mut self) -> bool {
        let now = self.0.now();
        self.0.presses.borrow().iter().any(|&(start, end)| now >= start && now < end)
    }
}

pub struct SimLed(pub Rc<World>);

impl StatusLed for SimLed {
    fn set(&mut self, color: Rgb) {
        self.0.record(Event::Led(color));
    }
}

pub struct SimDetect(pub Rc<World>);

impl DetectLine for SimDetect {
    fn set_present(&mut self, present: bool) {
        self.0.record(Event::Detect(present));
    }
}

/// Replays one queued host request per poll; each poll takes 1 ms.
pub struct SimTransport(pub Rc<World>);

impl Transport for SimTransport {
    fn attach(&mut self, direction: Direction) {
        self.0.record(Event::Attach(direction));
    }

    fn poll(&mut self, volume: &mut ImageVolume<'_>) {
        self.0.advance(1);

        let op = self.0.host_ops.borrow_mut().pop_front();
        let result = match op {
            Some(HostOp::Read(lba)) => {
                let mut buf = vec![0u8; VOLUME_BLOCK_SIZE];
                volume.read_block(lba, &mut buf).map(|_| buf)
            }
            Some(HostOp::Write(lba, fill)) => volume
                .write_block(lba, &[fill; VOLUME_BLOCK_SIZE])
                .map(|progress| vec![(progress == WriteProgress::Complete) as u8]),
            None => return,
        };
        self.0.host_results.borrow_mut().push(result);
    }
}

/// Port driven by a test: set `lines`, read back what the engine drove.
pub struct SimBusPort {
    pub lines: u32,
    pub driven: Option<u8>,
}

impl SimBusPort {
    pub fn new() -> Self {
        Self { lines: 0, driven: None }
    }
}

impl BusPort for SimBusPort {
    fn sample(&self) -> u32 {
        self.lines
    }

    fn release_data(&mut self) {
        self.driven = None;
    }

    fn drive_data(&mut self, byte: u8) {
        self.driven = Some(byte);
    }
}

// =============================================================================
// Platform
// =============================================================================

pub struct Sim;

impl Platform for Sim {
    type Clock = SimClock;
    type Store = SimStore;
    type Led = SimLed;
    type Button = SimButton;
    type Detect = SimDetect;
    type Transport = SimTransport;
}

pub fn sim_board(world: &Rc<World>) -> Board<Sim> {
    Board {
        clock: SimClock(world.clone()),
        store: SimStore(world.clone()),
        led: SimLed(world.clone()),
        button: SimButton(world.clone()),
        detect: SimDetect(world.clone()),
        transport: SimTransport(world.clone()),
    }
}
