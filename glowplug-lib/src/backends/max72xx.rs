//! MAX7219/MAX7221 LED matrix drivers behind an Arduino on a serial port.
//!
//! The firmware speaks opcode/length/payload packets (see
//! [`FramedLink`]). Pixels are monochrome: each greyscale component is
//! compared against the `threshold` property and uploaded as one bit.
//!
//! | Opcode | Payload                          |
//! |--------|----------------------------------|
//! | `U`    | packed bits from LED 0, MSB first|
//! | `L`    | none; shows the uploaded bits    |
//! | `S`    | scan limit (`0..=7`)             |
//! | `C`    | number of chained chips          |
//! | `G`    | intensity (`0..=15`)             |
//!
//! Serial writes have no timeout.

use log::{debug, error, info, trace};

use super::{require_format, resolve_id, AUTHOR, LICENSE, URL};
use crate::chain::{ChainView, PixelFormat};
use crate::driver::{Descriptor, Driver, Version, API_VERSION};
use crate::encode::Encoding;
use crate::error::{DriverError, Result};
use crate::param::{Param, ParamValue, GAIN_MAX};
use crate::property::{
    int_in_range, Property, PropertyRegistry, PropertyTable, PropertyType, PropertyValue,
};
use crate::transport::tty::TtyConnector;
use crate::transport::{Connect, FramedLink};

pub const DESCRIPTOR: Descriptor = Descriptor {
    family: "arduino-max72xx",
    version: Version::new(0, 1, 0),
    api_version: API_VERSION,
    license: LICENSE,
    author: AUTHOR,
    description: "MAX7219/MAX7221 LED matrices driven by an Arduino on a serial port",
    url: URL,
    id_example: "/dev/ttyUSB0",
    create,
};

pub const DEFAULT_DEVICE: &str = "/dev/ttyUSB0";

pub const OP_UPLOAD: u8 = b'U';
pub const OP_LATCH: u8 = b'L';
pub const OP_SET_SCANLIMIT: u8 = b'S';
pub const OP_SET_CHIPCOUNT: u8 = b'C';
pub const OP_SET_GAIN: u8 = b'G';

pub const MAX_LED_COUNT: usize = 512;
/// An 8x8 matrix per chip.
pub const LEDS_PER_CHIP: usize = 64;
pub const MAX_INTENSITY: u8 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub threshold: u8,
    pub scan_limit: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            threshold: 128,
            scan_limit: 7,
        }
    }
}

fn get_threshold(s: &Settings) -> PropertyValue {
    PropertyValue::Int(s.threshold.into())
}

fn set_threshold(s: &mut Settings, value: PropertyValue) -> Result<()> {
    s.threshold = int_in_range("threshold", &value, 0..=255)? as u8;
    Ok(())
}

fn get_scan_limit(s: &Settings) -> PropertyValue {
    PropertyValue::Int(s.scan_limit.into())
}

fn set_scan_limit(s: &mut Settings, value: PropertyValue) -> Result<()> {
    s.scan_limit = int_in_range("scan_limit", &value, 0..=7)? as u8;
    Ok(())
}

const PROPERTIES: &[Property<Settings>] = &[
    Property {
        name: "threshold",
        kind: PropertyType::Int,
        get: get_threshold,
        set: set_threshold,
    },
    Property {
        name: "scan_limit",
        kind: PropertyType::Int,
        get: get_scan_limit,
        set: set_scan_limit,
    },
];

pub const PROPERTY_TABLE: PropertyTable<Settings> = PropertyTable::new(PROPERTIES);

fn create() -> Box<dyn Driver> {
    Box::new(Max72xx::new(TtyConnector))
}

/// Chips needed for `led_count` LEDs.
pub fn chip_count(led_count: usize) -> u8 {
    led_count.div_ceil(LEDS_PER_CHIP) as u8
}

/// Scales a gain of `0..=GAIN_MAX` to the chip's 16 intensity steps.
pub fn intensity(gain: u16) -> u8 {
    (u32::from(gain) * u32::from(MAX_INTENSITY) / u32::from(GAIN_MAX)) as u8
}

pub struct Max72xx<C: Connect> {
    connector: C,
    id: String,
    led_count: usize,
    gain: u16,
    settings: Settings,
    link: Option<FramedLink<C::Link>>,
}

impl<C: Connect> Max72xx<C> {
    pub fn new(connector: C) -> Self {
        Max72xx {
            connector,
            id: String::new(),
            led_count: 0,
            gain: 0,
            settings: Settings::default(),
            link: None,
        }
    }

    fn link(&mut self) -> Result<&mut FramedLink<C::Link>> {
        self.link
            .as_mut()
            .ok_or(DriverError::NotReady("serial port is not open"))
    }

    fn set_led_count(&mut self, led_count: usize) -> Result<()> {
        if led_count > MAX_LED_COUNT {
            return Err(DriverError::validation(format!(
                "ledcount {} outside range (0-{})",
                led_count, MAX_LED_COUNT
            )));
        }
        let chips = chip_count(led_count);
        self.link()?.send_packet(OP_SET_CHIPCOUNT, &[chips])?;
        debug!("\"{}\": {} LEDs on {} chip(s)", self.id, led_count, chips);
        self.led_count = led_count;
        Ok(())
    }

    fn set_gain(&mut self, gain: u16) -> Result<()> {
        let level = intensity(gain);
        self.link()?.send_packet(OP_SET_GAIN, &[level])?;
        debug!("\"{}\": intensity {}", self.id, level);
        self.gain = gain;
        Ok(())
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<()> {
        let mut settings = self.settings;
        PROPERTY_TABLE.set(&mut settings, name, value)?;
        if settings.scan_limit != self.settings.scan_limit {
            if let Some(link) = self.link.as_mut() {
                link.send_packet(OP_SET_SCANLIMIT, &[settings.scan_limit])?;
            }
        }
        self.settings = settings;
        Ok(())
    }
}

impl<C: Connect> Driver for Max72xx<C> {
    fn init(&mut self, registry: &mut dyn PropertyRegistry) -> Result<()> {
        self.settings = Settings::default();
        PROPERTY_TABLE.register_all(registry)
    }

    fn deinit(&mut self, registry: &mut dyn PropertyRegistry) {
        PROPERTY_TABLE.unregister_all(registry);
    }

    fn hw_init(&mut self, id: &str, format: &PixelFormat) -> Result<()> {
        require_format(format, &[1], Some(1))?;

        let path = resolve_id(DESCRIPTOR.family, id, DEFAULT_DEVICE).to_string();
        let mut link = FramedLink::new(self.connector.connect(&path)?);
        // the firmware keeps no settings across resets
        link.send_packet(OP_SET_SCANLIMIT, &[self.settings.scan_limit])?;

        info!("MAX72xx on \"{}\" ready", path);
        self.id = path;
        self.link = Some(link);
        Ok(())
    }

    fn hw_deinit(&mut self) {
        if self.link.take().is_some() {
            debug!("Closed serial port \"{}\"", self.id);
        }
    }

    fn get(&self, param: &Param) -> Result<ParamValue> {
        match param {
            Param::Id => Ok(ParamValue::Id(self.id.clone())),
            Param::LedCount => Ok(ParamValue::LedCount(self.led_count)),
            Param::Gain(_) => Ok(ParamValue::Gain(self.gain)),
            Param::Custom(name) => PROPERTY_TABLE
                .get(&self.settings, name)
                .map(ParamValue::Custom),
        }
    }

    fn set(&mut self, param: &Param, value: ParamValue) -> Result<()> {
        let result = match param {
            Param::Id => value.into_id().map(|id| self.id = id),
            Param::LedCount => value
                .into_led_count()
                .and_then(|count| self.set_led_count(count)),
            Param::Gain(_) => value.into_gain().and_then(|gain| self.set_gain(gain)),
            Param::Custom(name) => value
                .into_custom()
                .and_then(|value| self.set_property(name, value)),
        };
        result.inspect_err(|e| error!("Failed to set {}: {}", param, e))
    }

    fn send(&mut self, chain: &ChainView<'_>, count: usize, offset: usize) -> Result<()> {
        // an upload carries no position, the firmware always fills from LED 0
        if offset != 0 {
            return Err(DriverError::validation(format!(
                "upload must start at LED 0, got offset {}",
                offset
            )));
        }
        let leds = chain.leds(offset, count)?;
        let packed = Encoding::Threshold(self.settings.threshold).encode(leds)?;
        trace!("Uploading {} LEDs as {} bytes", count, packed.len());
        self.link()?.send_packet(OP_UPLOAD, &packed)
    }

    fn show(&mut self) -> Result<()> {
        self.link()?.send_packet(OP_LATCH, &[])
    }
}
