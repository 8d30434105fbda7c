//! # USB Transport
//!
//! libusb access through `rusb`: bus snapshots filtered by vendor/product id,
//! host-to-device control requests and bulk OUT transfers on interface 0.
//!
//! Every transfer is bounded by the timeout passed in by the caller.

use std::io;
use std::time::Duration;

use log::{debug, warn};
use rusb::{Device, DeviceHandle, GlobalContext, UsbContext};

use crate::discovery::{Candidate, DeviceLink};
use crate::error::{DriverError, Result};

pub const INTERFACE: u8 = 0;

/// String descriptor index of the serial number in the device firmware.
pub const SERIAL_STRING_INDEX: u8 = 3;

/// A claimed USB device that can take control and bulk writes.
pub trait UsbLink: DeviceLink + Send {
    fn write_control(
        &mut self,
        request_type: u8,
        request: u8,
        payload: &[u8],
        timeout: Duration,
    ) -> io::Result<usize>;

    fn write_bulk(&mut self, endpoint: u8, payload: &[u8], timeout: Duration) -> io::Result<usize>;
}

/// Takes snapshots of the devices a backend may drive.
pub trait UsbBus: Send {
    type Link: UsbLink;
    type Candidate: Candidate<Link = Self::Link>;

    fn scan(&mut self) -> Result<Vec<Self::Candidate>>;
}

fn usb_error(e: rusb::Error) -> io::Error {
    let kind = match e {
        rusb::Error::Timeout => io::ErrorKind::TimedOut,
        rusb::Error::Access => io::ErrorKind::PermissionDenied,
        rusb::Error::NoDevice | rusb::Error::NotFound => io::ErrorKind::NotFound,
        rusb::Error::Interrupted => io::ErrorKind::Interrupted,
        _ => io::ErrorKind::Other,
    };
    io::Error::new(kind, e)
}

/// Devices with one vendor/product id pair on all buses.
#[derive(Debug, Clone, Copy)]
pub struct RusbBus {
    vendor_id: u16,
    product_id: u16,
}

impl RusbBus {
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        RusbBus {
            vendor_id,
            product_id,
        }
    }
}

impl UsbBus for RusbBus {
    type Link = RusbLink;
    type Candidate = RusbCandidate;

    fn scan(&mut self) -> Result<Vec<RusbCandidate>> {
        let devices = GlobalContext::default()
            .devices()
            .map_err(|e| DriverError::TransportOpen {
                id: "usb".to_string(),
                source: usb_error(e),
            })?;

        let mut found = Vec::new();
        for device in devices.iter() {
            let descriptor = match device.device_descriptor() {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    debug!(
                        "Unreadable descriptor on bus {:03} device {:03}: {}",
                        device.bus_number(),
                        device.address(),
                        e
                    );
                    continue;
                }
            };
            if descriptor.vendor_id() == self.vendor_id
                && descriptor.product_id() == self.product_id
            {
                found.push(RusbCandidate { device });
            }
        }
        debug!(
            "Found {} device(s) with id {:04x}:{:04x}",
            found.len(),
            self.vendor_id,
            self.product_id
        );
        Ok(found)
    }
}

pub struct RusbCandidate {
    device: Device<GlobalContext>,
}

impl Candidate for RusbCandidate {
    type Link = RusbLink;

    fn describe(&self) -> String {
        format!(
            "USB bus {:03} device {:03}",
            self.device.bus_number(),
            self.device.address()
        )
    }

    fn open(&self) -> io::Result<RusbLink> {
        let handle = self.device.open().map_err(usb_error)?;
        // kernel driver queries are unsupported on some platforms; treat those as free
        if handle.kernel_driver_active(INTERFACE).unwrap_or(false) {
            return Err(io::Error::other("interface is bound to a kernel driver"));
        }
        Ok(RusbLink {
            handle,
            claimed: false,
        })
    }
}

pub struct RusbLink {
    handle: DeviceHandle<GlobalContext>,
    claimed: bool,
}

impl DeviceLink for RusbLink {
    fn reset(&mut self) -> io::Result<()> {
        self.handle.reset().map_err(usb_error)
    }

    fn claim(&mut self) -> io::Result<()> {
        self.handle.claim_interface(INTERFACE).map_err(usb_error)?;
        self.claimed = true;
        Ok(())
    }

    fn release(&mut self) {
        if !self.claimed {
            return;
        }
        if let Err(e) = self.handle.release_interface(INTERFACE) {
            warn!("Failed to release USB interface: {}", e);
        }
        self.claimed = false;
    }

    fn serial(&mut self) -> io::Result<String> {
        self.handle
            .read_string_descriptor_ascii(SERIAL_STRING_INDEX)
            .map_err(usb_error)
    }
}

impl UsbLink for RusbLink {
    fn write_control(
        &mut self,
        request_type: u8,
        request: u8,
        payload: &[u8],
        timeout: Duration,
    ) -> io::Result<usize> {
        self.handle
            .write_control(request_type, request, 0, 0, payload, timeout)
            .map_err(usb_error)
    }

    fn write_bulk(&mut self, endpoint: u8, payload: &[u8], timeout: Duration) -> io::Result<usize> {
        self.handle
            .write_bulk(endpoint, payload, timeout)
            .map_err(usb_error)
    }
}

impl Drop for RusbLink {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(usb_error(rusb::Error::Timeout).kind(), io::ErrorKind::TimedOut);
        assert_eq!(usb_error(rusb::Error::Busy).kind(), io::ErrorKind::Other);
        assert_eq!(usb_error(rusb::Error::NoDevice).kind(), io::ErrorKind::NotFound);
    }
}
