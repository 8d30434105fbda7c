//! # Transport Layer
//!
//! Raw byte movers, one per physical medium:
//!
//! - [`spi`]: Linux spidev character devices
//! - [`tty`]: serial ports in raw mode, used with [`FramedLink`]
//! - [`usb`]: libusb control/bulk transfers and bus enumeration
//! - [`udp`]: connected UDP sockets for network nodes
//! - [`null`]: discards everything
//!
//! ## Blocking and timeouts
//!
//! All transports block the calling thread. USB transfers, TTY writes and
//! UDP sends are bounded by a timeout; SPI messages have none and can stall
//! for as long as the kernel driver does.

pub mod null;
pub mod spi;
pub mod tty;
pub mod udp;
pub mod usb;

#[cfg(test)]
pub(crate) mod mock;

use std::io::{self, Write};

use log::trace;

use crate::encode::packet_header;
use crate::error::{DriverError, Result};

/// Opens the stream link a backend writes to, e.g. a TTY for a device path.
pub trait Connect: Send {
    type Link: Write + Send;

    fn connect(&mut self, id: &str) -> Result<Self::Link>;
}

/// Writes all of `bytes`, continuing after short writes.
///
/// Interrupted writes are retried; a zero-length write or any other error
/// aborts the transfer with [`DriverError::TransportWrite`].
pub fn write_fully<W: Write + ?Sized>(link: &mut W, bytes: &[u8]) -> Result<()> {
    let mut remaining = bytes;
    while !remaining.is_empty() {
        match link.write(remaining) {
            Ok(0) => {
                return Err(DriverError::TransportWrite(io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("{} bytes left unwritten", remaining.len()),
                )));
            }
            Ok(n) => {
                if n < remaining.len() {
                    trace!("Short write: {} of {} bytes", n, remaining.len());
                }
                remaining = &remaining[n..];
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(DriverError::TransportWrite(e)),
        }
    }
    Ok(())
}

/// Opcode/length/payload packets over a stream without message boundaries.
#[derive(Debug)]
pub struct FramedLink<L: Write> {
    link: L,
}

impl<L: Write> FramedLink<L> {
    pub fn new(link: L) -> Self {
        FramedLink { link }
    }

    /// Sends `[opcode, payload.len(), payload...]`.
    pub fn send_packet(&mut self, opcode: u8, payload: &[u8]) -> Result<()> {
        let [opcode, len] = packet_header(opcode, payload.len())?;
        trace!("Packet 0x{:02x}: {} bytes", opcode, len);
        write_fully(&mut self.link, &[opcode])?;
        write_fully(&mut self.link, &[len])?;
        write_fully(&mut self.link, payload)?;
        self.link.flush().map_err(DriverError::TransportWrite)
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockLink;
    use super::*;

    #[test]
    fn test_write_fully_retries_short_writes() {
        let link = MockLink::new();
        link.script_short_writes(&[3, 1]);
        write_fully(&mut link.clone(), &[1, 2, 3, 4, 5, 6, 7]).unwrap();

        assert_eq!(
            link.writes(),
            vec![vec![1, 2, 3], vec![4], vec![5, 6, 7]]
        );
    }

    #[test]
    fn test_write_fully_zero_write_aborts() {
        let link = MockLink::new();
        link.script_short_writes(&[2, 0]);
        let result = write_fully(&mut link.clone(), &[1, 2, 3, 4]);
        assert!(matches!(result, Err(DriverError::TransportWrite(_))));
        assert_eq!(link.bytes(), vec![1, 2]);
    }

    #[test]
    fn test_write_fully_error_aborts() {
        let link = MockLink::new();
        link.fail_writes();
        let result = write_fully(&mut link.clone(), &[1]);
        assert!(matches!(result, Err(DriverError::TransportWrite(_))));
        assert!(link.bytes().is_empty());
    }

    #[test]
    fn test_framed_packet_layout() {
        let link = MockLink::new();
        let mut framed = FramedLink::new(link.clone());
        framed.send_packet(b'U', &[0xAA, 0xBB, 0xCC]).unwrap();

        assert_eq!(link.bytes(), vec![b'U', 3, 0xAA, 0xBB, 0xCC]);
        assert_eq!(link.flushes(), 1);
    }

    #[test]
    fn test_framed_packet_short_payload_write_is_continued() {
        let payload: Vec<u8> = (0..10).collect();
        let link = MockLink::new();
        // opcode and length go through whole, the payload write stops after 4
        link.script_short_writes(&[1, 1, 4]);
        let mut framed = FramedLink::new(link.clone());
        framed.send_packet(b'U', &payload).unwrap();

        let writes = link.writes();
        assert_eq!(writes.len(), 4);
        assert_eq!(writes[2], payload[..4].to_vec());
        assert_eq!(writes[3], payload[4..].to_vec());

        let bytes = link.bytes();
        assert_eq!(bytes.len(), 2 + payload.len());
        assert_eq!(&bytes[..2], &[b'U', 10]);
        assert_eq!(&bytes[2..], payload.as_slice());
    }

    #[test]
    fn test_framed_packet_empty_payload() {
        let link = MockLink::new();
        FramedLink::new(link.clone()).send_packet(b'L', &[]).unwrap();
        assert_eq!(link.bytes(), vec![b'L', 0]);
    }

    #[test]
    fn test_framed_packet_too_long() {
        let link = MockLink::new();
        let result = FramedLink::new(link.clone()).send_packet(b'U', &[0; 300]);
        assert!(matches!(result, Err(DriverError::Validation(_))));
        assert!(link.bytes().is_empty());
    }
}
