//! # Device Discovery
//!
//! Resolves a requested identifier against a snapshot of an enumerable bus.
//!
//! Candidates are tried in bus order. A candidate that cannot be opened, reset
//! or claimed is skipped without aborting the scan. A claimed candidate is
//! asked for its serial string; the first one whose serial matches the request
//! (or any serial, for the wildcard) is kept claimed and returned. Every other
//! candidate that got opened is released and closed before [`select_device`]
//! returns.

use std::io;

use log::{debug, info, warn};

use crate::error::{DriverError, Result};

/// Identifier that accepts the first device found.
pub const WILDCARD: &str = "*";

/// True for `"*"` and for an empty identifier.
pub fn is_wildcard(id: &str) -> bool {
    id.is_empty() || id == WILDCARD
}

/// A device seen on the bus, not yet opened.
pub trait Candidate {
    type Link: DeviceLink;

    /// Human-readable bus position for log messages.
    fn describe(&self) -> String;

    /// Opens the device. Fails when it is busy or already claimed.
    fn open(&self) -> io::Result<Self::Link>;
}

/// An opened device. Dropping it closes the handle.
pub trait DeviceLink {
    fn reset(&mut self) -> io::Result<()>;

    fn claim(&mut self) -> io::Result<()>;

    /// Releases a claimed interface. Best effort.
    fn release(&mut self);

    fn serial(&mut self) -> io::Result<String>;
}

/// The accepted device, still claimed.
#[derive(Debug)]
pub struct Selected<L> {
    pub link: L,
    pub serial: String,
}

pub fn select_device<C: Candidate>(candidates: &[C], requested: &str) -> Result<Selected<C::Link>> {
    for candidate in candidates {
        let name = candidate.describe();

        let mut link = match candidate.open() {
            Ok(link) => link,
            Err(e) => {
                debug!("Skipping {}: {}", name, e);
                continue;
            }
        };
        // some controllers refuse a reset yet work once claimed
        if let Err(e) = link.reset() {
            warn!("Resetting {} failed, claiming anyway: {}", name, e);
        }
        if let Err(e) = link.claim() {
            debug!("Skipping {}: claiming interface failed: {}", name, e);
            continue;
        }

        let serial = match link.serial() {
            Ok(serial) => serial,
            Err(e) => {
                debug!("Skipping {}: reading serial failed: {}", name, e);
                link.release();
                continue;
            }
        };

        if is_wildcard(requested) || serial == requested {
            info!("Selected {} (serial \"{}\")", name, serial);
            return Ok(Selected { link, serial });
        }

        debug!("{} has serial \"{}\", not \"{}\"", name, serial, requested);
        link.release();
    }

    Err(DriverError::DeviceNotFound(requested.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{MockBus, MockDevice};

    fn three_device_bus() -> MockBus {
        MockBus::new(vec![
            MockDevice::new("A", "Z").claimed(),
            MockDevice::new("B", "X"),
            MockDevice::new("C", "Y"),
        ])
    }

    #[test]
    fn test_explicit_serial_selects_match() {
        let bus = three_device_bus();
        let selected = select_device(bus.candidates(), "X").unwrap();
        assert_eq!(selected.serial, "X");
        assert_eq!(selected.link.name(), "B");

        // A never opened, C not reached
        assert!(bus.opened("B"));
        assert!(bus.is_claimed("B"));
        assert!(!bus.opened("A"));
        assert!(!bus.opened("C"));
    }

    #[test]
    fn test_rejected_devices_are_released() {
        let bus = three_device_bus();
        let selected = select_device(bus.candidates(), "Y").unwrap();
        assert_eq!(selected.link.name(), "C");

        assert!(bus.opened("B"));
        assert!(!bus.is_claimed("B"));
        assert!(bus.is_closed("B"));
        assert!(bus.is_claimed("C"));
        assert!(!bus.is_closed("C"));
    }

    #[test]
    fn test_wildcard_takes_first_usable() {
        let bus = three_device_bus();
        let selected = select_device(bus.candidates(), WILDCARD).unwrap();
        assert_eq!(selected.serial, "X");

        let selected = select_device(
            MockBus::new(vec![MockDevice::new("D", "Q")]).candidates(),
            "",
        )
        .unwrap();
        assert_eq!(selected.serial, "Q");
    }

    #[test]
    fn test_no_match() {
        let bus = three_device_bus();
        let result = select_device(bus.candidates(), "nope");
        assert!(matches!(result, Err(DriverError::DeviceNotFound(ref id)) if id == "nope"));

        for name in ["B", "C"] {
            assert!(!bus.is_claimed(name));
            assert!(bus.is_closed(name));
        }
    }

    #[test]
    fn test_failing_reset_still_claims() {
        let bus = MockBus::new(vec![MockDevice::new("A", "X").failing_reset()]);
        let selected = select_device(bus.candidates(), "X").unwrap();
        assert_eq!(selected.link.name(), "A");
        assert!(bus.is_claimed("A"));
    }

    #[test]
    fn test_failing_claim_and_serial_are_skipped() {
        let bus = MockBus::new(vec![
            MockDevice::new("A", "X").failing_claim(),
            MockDevice::new("B", "X").failing_serial(),
            MockDevice::new("C", "X"),
        ]);
        let selected = select_device(bus.candidates(), "X").unwrap();
        assert_eq!(selected.link.name(), "C");
        assert!(bus.is_closed("A"));
        assert!(!bus.is_claimed("B"));
        assert!(bus.is_closed("B"));
    }
}
