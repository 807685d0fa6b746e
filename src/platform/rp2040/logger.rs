//! RAM ring-buffer logger (feature `debug_log`).
//!
//! Every GPIO is taken by the cartridge connector, so there is no UART to
//! print to. Records are formatted into a fixed ring in RAM instead; attach a
//! debugger and dump `MEMPAK_LOG` to read them. Oldest text is overwritten.

use core::cell::RefCell;
use core::fmt::Write;

use critical_section::Mutex;
use log::{LevelFilter, Log, Metadata, Record};

const LOG_SIZE: usize = 4096;

struct Ring {
    buf: [u8; LOG_SIZE],
    /// Next byte to write
    head: usize,
    /// Total bytes ever written, so a reader can tell if it wrapped
    written: u32,
}

impl Ring {
    const fn new() -> Self {
        Self {
            buf: [0; LOG_SIZE],
            head: 0,
            written: 0,
        }
    }
}

impl Write for Ring {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for &byte in s.as_bytes() {
            self.buf[self.head] = byte;
            self.head = (self.head + 1) % LOG_SIZE;
            self.written = self.written.wrapping_add(1);
        }
        Ok(())
    }
}

#[unsafe(no_mangle)]
static MEMPAK_LOG: Mutex<RefCell<Ring>> = Mutex::new(RefCell::new(Ring::new()));

struct RingLogger;

static LOGGER: RingLogger = RingLogger;

impl Log for RingLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        critical_section::with(|cs| {
            let mut ring = MEMPAK_LOG.borrow_ref_mut(cs);
            let _ = writeln!(ring, "[{}] {}", record.level(), record.args());
        });
    }

    fn flush(&self) {}
}

/// Install the ring logger. Call once, on core 0, before anything logs.
pub fn init() {
    // No compare-and-swap on ARMv6-M, so only the racy setters exist
    unsafe {
        let _ = log::set_logger_racy(&LOGGER);
        log::set_max_level_racy(LevelFilter::Debug);
    }
}
