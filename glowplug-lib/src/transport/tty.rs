//! # Serial Transport
//!
//! Opens a serial device in raw binary mode at a fixed line speed for
//! microcontroller-backed displays.
//!
//! ## Port Configuration
//!
//! - 115200 baud, 8 data bits, 2 stop bits, no parity
//! - no flow control
//! - writes give up after [`WRITE_TIMEOUT`]

use std::io::{self, Write};
use std::time::Duration;

use log::debug;
use serialport::{DataBits, ErrorKind, FlowControl, Parity, SerialPort, StopBits};

use super::Connect;
use crate::error::{DriverError, Result};

/// Line speed used by the display firmware.
pub const BAUD_RATE: u32 = 115_200;

pub const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Opens device paths as raw serial ports.
#[derive(Debug, Default, Clone, Copy)]
pub struct TtyConnector;

impl Connect for TtyConnector {
    type Link = Tty;

    fn connect(&mut self, id: &str) -> Result<Tty> {
        Tty::open(id)
    }
}

pub struct Tty {
    port: Box<dyn SerialPort>,
}

impl std::fmt::Debug for Tty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tty")
            .field("name", &self.port.name())
            .finish()
    }
}

impl Tty {
    pub fn open(path: &str) -> Result<Self> {
        let port = serialport::new(path, BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::Two)
            .flow_control(FlowControl::None)
            .timeout(WRITE_TIMEOUT)
            .open()
            .map_err(|e| match e.kind() {
                ErrorKind::NoDevice | ErrorKind::Io(_) => DriverError::TransportOpen {
                    id: path.to_string(),
                    source: io::Error::from(e),
                },
                _ => DriverError::config(path, e.to_string()),
            })?;
        debug!("TTY \"{}\" opened at {} baud", path, BAUD_RATE);
        Ok(Tty { port })
    }
}

impl Write for Tty {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}
