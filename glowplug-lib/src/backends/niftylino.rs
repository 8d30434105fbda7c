//! niftylino USB LED controllers.
//!
//! Controllers are found by enumerating the USB bus and matching the serial
//! string against the requested id (see [`crate::discovery`]). Pixel data goes
//! out as bulk transfers on endpoint 1; configuration and the latch are
//! control requests. Every transfer is bounded by the `usb_timeout`
//! property.

use std::io::{self, Write};
use std::time::Duration;

use log::{debug, error, info, trace};

use super::{require_format, AUTHOR, LICENSE, URL};
use crate::chain::{ChainView, PixelFormat};
use crate::discovery::select_device;
use crate::driver::{Descriptor, Driver, Version, API_VERSION};
use crate::error::{DriverError, Result};
use crate::param::{Param, ParamValue, GAIN_MAX};
use crate::property::{
    int_in_range, Property, PropertyRegistry, PropertyTable, PropertyType, PropertyValue,
};
use crate::transport::usb::{RusbBus, UsbBus, UsbLink};
use crate::transport::write_fully;

pub const DESCRIPTOR: Descriptor = Descriptor {
    family: "niftylino",
    version: Version::new(0, 1, 0),
    api_version: API_VERSION,
    license: LICENSE,
    author: AUTHOR,
    description: "niftylino USB LED controllers",
    url: URL,
    id_example: "\"112441352785892847210780677\" or \"*\"",
    create,
};

pub const VENDOR_ID: u16 = 0x16c0;
pub const PRODUCT_ID: u16 = 0x05dc;

/// Host-to-device, standard, endpoint recipient.
pub const REQUEST_TYPE: u8 = 0x04;
pub const BULK_ENDPOINT: u8 = 1;
pub const LEDS_PER_CHIP: usize = 16;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2500);

/// Control request ids understood by the firmware.
pub mod request {
    pub const LATCH: u8 = 10;
    pub const SET_CHAINLENGTH: u8 = 11;
    pub const SET_INPUT_BITWIDTH: u8 = 14;
    pub const SET_GAIN_NO_PROPAGATE: u8 = 15;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub usb_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            usb_timeout: DEFAULT_TIMEOUT,
        }
    }
}

fn get_timeout(s: &Settings) -> PropertyValue {
    PropertyValue::Int(s.usb_timeout.as_millis() as i64)
}

fn set_timeout(s: &mut Settings, value: PropertyValue) -> Result<()> {
    let ms = int_in_range("usb_timeout", &value, 1..=i64::from(u32::MAX))?;
    s.usb_timeout = Duration::from_millis(ms as u64);
    Ok(())
}

const PROPERTIES: &[Property<Settings>] = &[Property {
    name: "usb_timeout",
    kind: PropertyType::Int,
    get: get_timeout,
    set: set_timeout,
}];

pub const PROPERTY_TABLE: PropertyTable<Settings> = PropertyTable::new(PROPERTIES);

fn create() -> Box<dyn Driver> {
    Box::new(Niftylino::new(RusbBus::new(VENDOR_ID, PRODUCT_ID)))
}

/// `SET_CHAINLENGTH` payload.
pub fn chain_length_payload(led_count: usize) -> Result<[u8; 4]> {
    let leds = u32::try_from(led_count)
        .map_err(|_| DriverError::validation(format!("ledcount {} too large", led_count)))?;
    Ok(leds.to_le_bytes())
}

/// `SET_GAIN_NO_PROPAGATE` payload: chip index, 8 bit gain, padding.
pub fn chip_gain_payload(led: usize, gain: u16) -> Result<[u8; 8]> {
    let chip = u32::try_from(led / LEDS_PER_CHIP)
        .map_err(|_| DriverError::validation(format!("LED {} out of range", led)))?;
    let scaled = (u32::from(gain) * 255 / u32::from(GAIN_MAX)) as u8;

    let mut payload = [0u8; 8];
    payload[..4].copy_from_slice(&chip.to_le_bytes());
    payload[4] = scaled;
    Ok(payload)
}

/// Bulk OUT endpoint as a [`Write`], so short transfers get continued.
struct BulkWriter<'a, L> {
    link: &'a mut L,
    timeout: Duration,
}

impl<L: UsbLink> Write for BulkWriter<'_, L> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.link.write_bulk(BULK_ENDPOINT, buf, self.timeout)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct Niftylino<B: UsbBus> {
    bus: B,
    id: String,
    led_count: usize,
    settings: Settings,
    link: Option<B::Link>,
}

impl<B: UsbBus> Niftylino<B> {
    pub fn new(bus: B) -> Self {
        Niftylino {
            bus,
            id: String::new(),
            led_count: 0,
            settings: Settings::default(),
            link: None,
        }
    }

    fn control(link: &mut B::Link, timeout: Duration, request: u8, payload: &[u8]) -> Result<()> {
        let sent = link
            .write_control(REQUEST_TYPE, request, payload, timeout)
            .map_err(DriverError::TransportWrite)?;
        if sent != payload.len() {
            return Err(DriverError::TransportWrite(io::Error::new(
                io::ErrorKind::WriteZero,
                format!(
                    "control request {} sent {} of {} bytes",
                    request,
                    sent,
                    payload.len()
                ),
            )));
        }
        Ok(())
    }

    fn send_control(&mut self, request: u8, payload: &[u8]) -> Result<()> {
        let timeout = self.settings.usb_timeout;
        let link = self
            .link
            .as_mut()
            .ok_or(DriverError::NotReady("niftylino is not open"))?;
        Self::control(link, timeout, request, payload)
    }

    fn set_led_count(&mut self, led_count: usize) -> Result<()> {
        self.send_control(request::SET_CHAINLENGTH, &chain_length_payload(led_count)?)?;
        debug!("Setting \"{}\" to ledcount: {}", self.id, led_count);
        self.led_count = led_count;
        Ok(())
    }

    fn set_gain(&mut self, led: usize, gain: u16) -> Result<()> {
        // one gain register per chip; only its first LED addresses it
        if led % LEDS_PER_CHIP != 0 {
            return Ok(());
        }
        self.send_control(request::SET_GAIN_NO_PROPAGATE, &chip_gain_payload(led, gain)?)
    }
}

impl<B: UsbBus> Driver for Niftylino<B> {
    fn init(&mut self, registry: &mut dyn PropertyRegistry) -> Result<()> {
        self.settings = Settings::default();
        PROPERTY_TABLE.register_all(registry)
    }

    fn deinit(&mut self, registry: &mut dyn PropertyRegistry) {
        PROPERTY_TABLE.unregister_all(registry);
    }

    fn hw_init(&mut self, id: &str, format: &PixelFormat) -> Result<()> {
        require_format(format, &[1, 2], None)?;
        let bitwidth = (format.bytes_per_component() * 8) as u32;

        let candidates = self.bus.scan()?;
        let mut selected = select_device(&candidates, id)?;
        debug!("Setting bitwidth to {} bit", bitwidth);
        Self::control(
            &mut selected.link,
            self.settings.usb_timeout,
            request::SET_INPUT_BITWIDTH,
            &bitwidth.to_le_bytes(),
        )?;

        info!("niftylino \"{}\" ready", selected.serial);
        self.id = selected.serial;
        self.link = Some(selected.link);
        Ok(())
    }

    fn hw_deinit(&mut self) {
        if self.link.take().is_some() {
            debug!("Released niftylino \"{}\"", self.id);
        }
    }

    fn get(&self, param: &Param) -> Result<ParamValue> {
        match param {
            Param::Id => Ok(ParamValue::Id(self.id.clone())),
            Param::LedCount => Ok(ParamValue::LedCount(self.led_count)),
            Param::Custom(name) => PROPERTY_TABLE
                .get(&self.settings, name)
                .map(ParamValue::Custom),
            Param::Gain(_) => {
                error!("Request to get unhandled {} from niftylino", param);
                Err(DriverError::UnhandledParameter(param.to_string()))
            }
        }
    }

    fn set(&mut self, param: &Param, value: ParamValue) -> Result<()> {
        match param {
            Param::Id => self.id = value.into_id()?,
            Param::LedCount => self.set_led_count(value.into_led_count()?)?,
            Param::Gain(led) => self.set_gain(*led, value.into_gain()?)?,
            Param::Custom(name) => {
                PROPERTY_TABLE.set(&mut self.settings, name, value.into_custom()?)?
            }
        }
        Ok(())
    }

    fn send(&mut self, chain: &ChainView<'_>, count: usize, offset: usize) -> Result<()> {
        // bulk data carries no position; the controller fills from the first LED
        if offset != 0 {
            return Err(DriverError::validation(format!(
                "bulk transfer must start at LED 0, got offset {}",
                offset
            )));
        }
        let leds = chain.leds(offset, count)?;
        trace!("Sending {} LEDs (offset: {})", count, offset);
        let timeout = self.settings.usb_timeout;
        let link = self
            .link
            .as_mut()
            .ok_or(DriverError::NotReady("niftylino is not open"))?;
        write_fully(&mut BulkWriter { link, timeout }, leds)
    }

    fn show(&mut self) -> Result<()> {
        self.send_control(request::LATCH, &[])
    }
}
