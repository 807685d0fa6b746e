//! USB mass-storage transport for the image volume.
//!
//! The device only appears on the bus once the orchestrator attaches the
//! transport; from then on every `poll` runs the USB stack and answers SCSI
//! commands from the [`ImageVolume`]. Transfers arrive in packet-sized
//! chunks, so each command keeps a byte cursor across callbacks and blocks
//! are staged in a 512 byte buffer.

use log::{info, warn};
use rp2040_hal as hal;
use usb_device::bus::UsbBusAllocator;
use usb_device::device::{StringDescriptors, UsbDevice, UsbDeviceBuilder, UsbDeviceState, UsbVidPid};
use usbd_storage::subclass::Command;
use usbd_storage::subclass::scsi::{Scsi, ScsiCommand};
use usbd_storage::transport::TransportError;
use usbd_storage::transport::bbb::{BulkOnly, BulkOnlyError};

use mempak::config::VOLUME_BLOCK_SIZE;
use mempak::{Direction, Error, ImageVolume, Transport};

type Bus = hal::usb::UsbBus;
type ScsiClass = Scsi<BulkOnly<'static, Bus, [u8; TRANSPORT_BUF]>>;
type ScsiCmd<'a> = Command<'a, ScsiCommand, ScsiClass>;
type CmdResult = Result<(), TransportError<BulkOnlyError>>;

const USB_PACKET_SIZE: u16 = 64;
const TRANSPORT_BUF: usize = 512;
const MAX_LUN: u8 = 0;

/// Shared test VID/PID, as used by the usbd-storage demos.
const VID_PID: UsbVidPid = UsbVidPid(0x16c0, 0x27dd);

// =============================================================================
// Sense Data
// =============================================================================

/// Sense key / additional sense code reported by REQUEST SENSE.
#[derive(Clone, Copy, PartialEq, Eq)]
struct Sense {
    key: u8,
    asc: u8,
}

impl Sense {
    const NONE: Self = Self { key: 0x00, asc: 0x00 };
    const WRITE_PROTECTED: Self = Self { key: 0x07, asc: 0x27 };
    const LBA_OUT_OF_RANGE: Self = Self { key: 0x05, asc: 0x21 };
    const INVALID_COMMAND: Self = Self { key: 0x05, asc: 0x20 };

    fn from_error(err: Error) -> Self {
        match err {
            Error::WriteProtected => Sense::WRITE_PROTECTED,
            _ => Sense::LBA_OUT_OF_RANGE,
        }
    }

    fn fixed_format(self) -> [u8; 18] {
        let mut data = [0u8; 18];
        data[0] = 0x70;
        data[2] = self.key;
        data[7] = 10;
        data[12] = self.asc;
        data
    }
}

// =============================================================================
// Command Handling
// =============================================================================

/// Per-command transfer state.
struct Session {
    /// Bytes moved so far for the current READ/WRITE
    cursor: usize,
    block: [u8; VOLUME_BLOCK_SIZE],
    sense: Sense,
}

impl Session {
    const fn new() -> Self {
        Self {
            cursor: 0,
            block: [0; VOLUME_BLOCK_SIZE],
            sense: Sense::NONE,
        }
    }

    fn fail(&mut self, mut command: ScsiCmd<'_>, sense: Sense) {
        self.cursor = 0;
        self.sense = sense;
        command.fail();
    }

    fn process(&mut self, mut command: ScsiCmd<'_>, volume: &mut ImageVolume<'_>) -> CmdResult {
        let block_count = volume.block_count() as u32;
        let block_size = volume.block_size() as u32;

        match command.kind {
            ScsiCommand::TestUnitReady { .. } | ScsiCommand::PreventAllowMediumRemoval { .. } => {
                command.pass();
            }
            ScsiCommand::Inquiry { .. } => {
                let mut data = [0u8; 36];
                data[1] = 0x80; // removable
                data[2] = 0x04; // SPC-2
                data[3] = 0x02;
                data[4] = 31;
                data[8..16].copy_from_slice(b"MEMPAK  ");
                data[16..32].copy_from_slice(b"Virtual Cart    ");
                data[32..36].copy_from_slice(b"1.0 ");
                command.try_write_data_all(&data)?;
                command.pass();
            }
            ScsiCommand::RequestSense { .. } => {
                command.try_write_data_all(&self.sense.fixed_format())?;
                self.sense = Sense::NONE;
                command.pass();
            }
            ScsiCommand::ReadCapacity10 { .. } => {
                let mut data = [0u8; 8];
                data[0..4].copy_from_slice(&(block_count - 1).to_be_bytes());
                data[4..8].copy_from_slice(&block_size.to_be_bytes());
                command.try_write_data_all(&data)?;
                command.pass();
            }
            ScsiCommand::ReadCapacity16 { .. } => {
                let mut data = [0u8; 32];
                data[0..8].copy_from_slice(&((block_count - 1) as u64).to_be_bytes());
                data[8..12].copy_from_slice(&block_size.to_be_bytes());
                command.try_write_data_all(&data)?;
                command.pass();
            }
            ScsiCommand::ReadFormatCapacities { .. } => {
                let mut data = [0u8; 12];
                data[3] = 8;
                data[4..8].copy_from_slice(&block_count.to_be_bytes());
                data[8] = 0x02; // formatted media
                data[9..12].copy_from_slice(&block_size.to_be_bytes()[1..]);
                command.try_write_data_all(&data)?;
                command.pass();
            }
            ScsiCommand::ModeSense6 { .. } => {
                let wp = if volume.is_writable() { 0x00 } else { 0x80 };
                command.try_write_data_all(&[0x03, 0x00, wp, 0x00])?;
                command.pass();
            }
            ScsiCommand::ModeSense10 { .. } => {
                let wp = if volume.is_writable() { 0x00 } else { 0x80 };
                command.try_write_data_all(&[0x00, 0x06, 0x00, wp, 0x00, 0x00, 0x00, 0x00])?;
                command.pass();
            }
            ScsiCommand::Read { lba, len } => {
                let total = len as usize * VOLUME_BLOCK_SIZE;
                if self.cursor >= total {
                    self.cursor = 0;
                    command.pass();
                    return Ok(());
                }
                let current = lba as u32 + (self.cursor / VOLUME_BLOCK_SIZE) as u32;
                let within = self.cursor % VOLUME_BLOCK_SIZE;
                if let Err(err) = volume.read_block(current, &mut self.block) {
                    self.fail(command, Sense::from_error(err));
                    return Ok(());
                }
                self.cursor += command.write_data(&self.block[within..])?;
            }
            ScsiCommand::Write { lba, len } => {
                if !volume.is_writable() {
                    self.fail(command, Sense::WRITE_PROTECTED);
                    return Ok(());
                }
                let total = len as usize * VOLUME_BLOCK_SIZE;
                if self.cursor < total {
                    let within = self.cursor % VOLUME_BLOCK_SIZE;
                    let count = command.read_data(&mut self.block[within..])?;
                    self.cursor += count;

                    if within + count == VOLUME_BLOCK_SIZE {
                        let current = lba as u32 + (self.cursor / VOLUME_BLOCK_SIZE) as u32 - 1;
                        if let Err(err) = volume.write_block(current, &self.block) {
                            self.fail(command, Sense::from_error(err));
                            return Ok(());
                        }
                    }
                }
                if self.cursor >= total {
                    self.cursor = 0;
                    command.pass();
                }
            }
            _ => {
                warn!("unsupported SCSI command");
                self.fail(command, Sense::INVALID_COMMAND);
            }
        }
        Ok(())
    }
}

// =============================================================================
// Transport
// =============================================================================

struct Attached {
    device: UsbDevice<'static, Bus>,
    scsi: ScsiClass,
}

/// Mass-storage transport, idle until attached.
pub struct UsbTransport {
    bus: &'static UsbBusAllocator<Bus>,
    attached: Option<Attached>,
    session: Session,
    configured: bool,
}

impl UsbTransport {
    pub fn new(bus: &'static UsbBusAllocator<Bus>) -> Self {
        Self {
            bus,
            attached: None,
            session: Session::new(),
            configured: false,
        }
    }
}

impl Transport for UsbTransport {
    fn attach(&mut self, direction: Direction) {
        if self.attached.is_some() {
            return;
        }

        let scsi = match Scsi::new(self.bus, USB_PACKET_SIZE, MAX_LUN, [0u8; TRANSPORT_BUF]) {
            Ok(scsi) => scsi,
            Err(_) => {
                warn!("mass storage class unavailable");
                return;
            }
        };

        let product = match direction {
            Direction::Export => "Mempak (read only)",
            Direction::Import => "Mempak (write image)",
        };
        let strings = StringDescriptors::default()
            .manufacturer("Mempak")
            .product(product)
            .serial_number("0001");

        let device = match UsbDeviceBuilder::new(self.bus, VID_PID)
            .strings(&[strings])
            .and_then(|b| b.max_packet_size_0(USB_PACKET_SIZE as u8))
        {
            Ok(builder) => builder.self_powered(false).build(),
            Err(err) => {
                warn!("USB device setup failed: {:?}", err);
                return;
            }
        };

        self.attached = Some(Attached { device, scsi });
    }

    fn poll(&mut self, volume: &mut ImageVolume<'_>) {
        let Some(Attached { device, scsi }) = self.attached.as_mut() else {
            return;
        };

        device.poll(&mut [&mut *scsi]);

        if !self.configured && device.state() == UsbDeviceState::Configured {
            self.configured = true;
            info!("USB host mounted the volume");
        }

        let session = &mut self.session;
        let _ = scsi.poll(|command| session.process(command, volume));
    }
}
