//! Test doubles for the transport traits.

use std::collections::{HashMap, VecDeque};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::spi::{SpiBus, SpiConfig, SpiDevice};
use super::usb::{UsbBus, UsbLink};
use super::Connect;
use crate::discovery::{Candidate, DeviceLink};
use crate::error::{DriverError, Result};

#[derive(Debug, Default)]
struct LinkState {
    writes: Vec<Vec<u8>>,
    script: VecDeque<usize>,
    fail: bool,
    flushes: usize,
    configs: Vec<SpiConfig>,
}

/// Records every accepted write. Clones share the recording.
#[derive(Debug, Clone, Default)]
pub struct MockLink {
    state: Arc<Mutex<LinkState>>,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next writes accept at most these many bytes each, in order.
    pub fn script_short_writes(&self, accepts: &[usize]) {
        self.state.lock().unwrap().script.extend(accepts);
    }

    pub fn fail_writes(&self) {
        self.state.lock().unwrap().fail = true;
    }

    /// Accepted chunks, one per successful `write` call.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.writes().concat()
    }

    pub fn clear(&self) {
        self.state.lock().unwrap().writes.clear();
    }

    pub fn flushes(&self) -> usize {
        self.state.lock().unwrap().flushes
    }

    pub fn configs(&self) -> Vec<SpiConfig> {
        self.state.lock().unwrap().configs.clone()
    }
}

impl Write for MockLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        if state.fail {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock write failure"));
        }
        let accepted = match state.script.pop_front() {
            Some(limit) => limit.min(buf.len()),
            None => buf.len(),
        };
        if accepted > 0 {
            state.writes.push(buf[..accepted].to_vec());
        }
        Ok(accepted)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.state.lock().unwrap().flushes += 1;
        Ok(())
    }
}

impl SpiDevice for MockLink {
    fn configure(&mut self, config: &SpiConfig) -> Result<()> {
        self.state.lock().unwrap().configs.push(*config);
        Ok(())
    }
}

/// Hands out clones of one [`MockLink`] for every path it is asked to open.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    pub link: MockLink,
    opened: Arc<Mutex<Vec<String>>>,
    fail_open: bool,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        MockConnector {
            fail_open: true,
            ..Self::default()
        }
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    fn open_link(&self, id: &str) -> Result<MockLink> {
        if self.fail_open {
            return Err(DriverError::TransportOpen {
                id: id.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "mock open failure"),
            });
        }
        self.opened.lock().unwrap().push(id.to_string());
        Ok(self.link.clone())
    }
}

impl Connect for MockConnector {
    type Link = MockLink;

    fn connect(&mut self, id: &str) -> Result<MockLink> {
        self.open_link(id)
    }
}

impl SpiBus for MockConnector {
    type Device = MockLink;

    fn open(&mut self, path: &str, config: &SpiConfig) -> Result<MockLink> {
        let mut link = self.open_link(path)?;
        link.configure(config)?;
        Ok(link)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlTransfer {
    pub request_type: u8,
    pub request: u8,
    pub payload: Vec<u8>,
}

#[derive(Debug, Default)]
struct DeviceState {
    opened: bool,
    claimed: bool,
    closed: bool,
    controls: Vec<ControlTransfer>,
    bulk: Vec<(u8, Vec<u8>)>,
    timeouts: Vec<Duration>,
}

type SharedDevices = Arc<Mutex<HashMap<String, DeviceState>>>;

/// A simulated bus device.
#[derive(Debug, Clone)]
pub struct MockDevice {
    name: String,
    serial: String,
    busy: bool,
    fail_reset: bool,
    fail_claim: bool,
    fail_serial: bool,
    devices: SharedDevices,
}

impl MockDevice {
    pub fn new(name: &str, serial: &str) -> Self {
        MockDevice {
            name: name.to_string(),
            serial: serial.to_string(),
            busy: false,
            fail_reset: false,
            fail_claim: false,
            fail_serial: false,
            devices: SharedDevices::default(),
        }
    }

    /// Already claimed by someone else; opening fails.
    pub fn claimed(mut self) -> Self {
        self.busy = true;
        self
    }

    pub fn failing_reset(mut self) -> Self {
        self.fail_reset = true;
        self
    }

    pub fn failing_claim(mut self) -> Self {
        self.fail_claim = true;
        self
    }

    pub fn failing_serial(mut self) -> Self {
        self.fail_serial = true;
        self
    }
}

impl Candidate for MockDevice {
    type Link = MockUsbLink;

    fn describe(&self) -> String {
        format!("mock device {}", self.name)
    }

    fn open(&self) -> io::Result<MockUsbLink> {
        if self.busy {
            return Err(io::Error::other("device busy"));
        }
        let mut devices = self.devices.lock().unwrap();
        let state = devices.entry(self.name.clone()).or_default();
        state.opened = true;
        state.closed = false;
        Ok(MockUsbLink {
            device: self.clone(),
            fail_transfers: Arc::default(),
        })
    }
}

pub struct MockUsbLink {
    device: MockDevice,
    fail_transfers: Arc<Mutex<bool>>,
}

impl MockUsbLink {
    pub fn name(&self) -> &str {
        &self.device.name
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut DeviceState) -> T) -> T {
        let mut devices = self.device.devices.lock().unwrap();
        f(devices.entry(self.device.name.clone()).or_default())
    }

    fn check_transfer(&self) -> io::Result<()> {
        if *self.fail_transfers.lock().unwrap() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "mock transfer timeout"));
        }
        Ok(())
    }
}

impl DeviceLink for MockUsbLink {
    fn reset(&mut self) -> io::Result<()> {
        if self.device.fail_reset {
            return Err(io::Error::other("reset refused"));
        }
        Ok(())
    }

    fn claim(&mut self) -> io::Result<()> {
        if self.device.fail_claim {
            return Err(io::Error::other("claim refused"));
        }
        self.with_state(|s| s.claimed = true);
        Ok(())
    }

    fn release(&mut self) {
        self.with_state(|s| s.claimed = false);
    }

    fn serial(&mut self) -> io::Result<String> {
        if self.device.fail_serial {
            return Err(io::Error::other("no serial string"));
        }
        Ok(self.device.serial.clone())
    }
}

impl UsbLink for MockUsbLink {
    fn write_control(
        &mut self,
        request_type: u8,
        request: u8,
        payload: &[u8],
        timeout: Duration,
    ) -> io::Result<usize> {
        self.check_transfer()?;
        self.with_state(|s| {
            s.timeouts.push(timeout);
            s.controls.push(ControlTransfer {
                request_type,
                request,
                payload: payload.to_vec(),
            })
        });
        Ok(payload.len())
    }

    fn write_bulk(&mut self, endpoint: u8, payload: &[u8], timeout: Duration) -> io::Result<usize> {
        self.check_transfer()?;
        self.with_state(|s| {
            s.timeouts.push(timeout);
            s.bulk.push((endpoint, payload.to_vec()))
        });
        Ok(payload.len())
    }
}

impl Drop for MockUsbLink {
    fn drop(&mut self) {
        self.with_state(|s| {
            s.claimed = false;
            s.closed = true;
        });
    }
}

/// A bus snapshot over [`MockDevice`]s sharing one recording.
#[derive(Debug, Clone)]
pub struct MockBus {
    devices: Vec<MockDevice>,
    state: SharedDevices,
    fail_transfers: Arc<Mutex<bool>>,
}

impl MockBus {
    pub fn new(devices: Vec<MockDevice>) -> Self {
        let state = SharedDevices::default();
        let devices = devices
            .into_iter()
            .map(|mut device| {
                device.devices = state.clone();
                device
            })
            .collect();
        MockBus {
            devices,
            state,
            fail_transfers: Arc::default(),
        }
    }

    pub fn candidates(&self) -> &[MockDevice] {
        &self.devices
    }

    /// Makes every transfer on links opened from a scan time out.
    pub fn fail_transfers(&self) {
        *self.fail_transfers.lock().unwrap() = true;
    }

    fn read<T>(&self, name: &str, f: impl FnOnce(&DeviceState) -> T) -> T {
        let devices = self.state.lock().unwrap();
        match devices.get(name) {
            Some(state) => f(state),
            None => f(&DeviceState::default()),
        }
    }

    pub fn opened(&self, name: &str) -> bool {
        self.read(name, |s| s.opened)
    }

    pub fn is_claimed(&self, name: &str) -> bool {
        self.read(name, |s| s.claimed)
    }

    pub fn is_closed(&self, name: &str) -> bool {
        self.read(name, |s| s.closed)
    }

    pub fn controls(&self, name: &str) -> Vec<ControlTransfer> {
        self.read(name, |s| s.controls.clone())
    }

    pub fn bulk(&self, name: &str) -> Vec<(u8, Vec<u8>)> {
        self.read(name, |s| s.bulk.clone())
    }

    pub fn timeouts(&self, name: &str) -> Vec<Duration> {
        self.read(name, |s| s.timeouts.clone())
    }
}

/// Candidate wrapper carrying the bus-wide transfer failure switch.
#[derive(Debug, Clone)]
pub struct ScannedDevice {
    device: MockDevice,
    fail_transfers: Arc<Mutex<bool>>,
}

impl Candidate for ScannedDevice {
    type Link = MockUsbLink;

    fn describe(&self) -> String {
        self.device.describe()
    }

    fn open(&self) -> io::Result<MockUsbLink> {
        let mut link = self.device.open()?;
        link.fail_transfers = self.fail_transfers.clone();
        Ok(link)
    }
}

impl UsbBus for MockBus {
    type Link = MockUsbLink;
    type Candidate = ScannedDevice;

    fn scan(&mut self) -> Result<Vec<ScannedDevice>> {
        Ok(self
            .devices
            .iter()
            .map(|device| ScannedDevice {
                device: device.clone(),
                fail_transfers: self.fail_transfers.clone(),
            })
            .collect())
    }
}
