//! LPD8806 RGB strips on a Linux spidev port.
//!
//! The strip shifts data straight through its chips, so `send` clocks out
//! the LED range as one SPI message and `show` latches it with a single zero
//! byte. SPI transfers have no timeout.

use log::{debug, error, info, trace};

use super::{require_format, resolve_id, AUTHOR, LICENSE, URL};
use crate::chain::{ChainView, PixelFormat};
use crate::driver::{Descriptor, Driver, Version, API_VERSION};
use crate::error::{DriverError, Result};
use crate::param::{Param, ParamValue};
use crate::property::{
    int_in_range, Property, PropertyRegistry, PropertyTable, PropertyType, PropertyValue,
};
use crate::transport::spi::{SpiBus, SpiConfig, SpiDevice, SpidevBus};
use crate::transport::write_fully;

pub const DESCRIPTOR: Descriptor = Descriptor {
    family: "lpd8806-spi",
    version: Version::new(0, 1, 0),
    api_version: API_VERSION,
    license: LICENSE,
    author: AUTHOR,
    description: "LPD8806 LED strips connected to a Linux SPI port",
    url: URL,
    id_example: "/dev/spidev0.0",
    create,
};

pub const DEFAULT_DEVICE: &str = "/dev/spidev0.0";

const LATCH: [u8; 1] = [0x00];

fn get_speed(config: &SpiConfig) -> PropertyValue {
    PropertyValue::Int(config.speed_hz.into())
}

fn set_speed(config: &mut SpiConfig, value: PropertyValue) -> Result<()> {
    config.speed_hz = int_in_range("spi_speed", &value, 1..=i64::from(u32::MAX))? as u32;
    Ok(())
}

fn get_delay(config: &SpiConfig) -> PropertyValue {
    PropertyValue::Int(config.delay_usecs.into())
}

fn set_delay(config: &mut SpiConfig, value: PropertyValue) -> Result<()> {
    config.delay_usecs = int_in_range("spi_delay", &value, 0..=i64::from(u16::MAX))? as u16;
    Ok(())
}

const PROPERTIES: &[Property<SpiConfig>] = &[
    Property {
        name: "spi_speed",
        kind: PropertyType::Int,
        get: get_speed,
        set: set_speed,
    },
    Property {
        name: "spi_delay",
        kind: PropertyType::Int,
        get: get_delay,
        set: set_delay,
    },
];

pub const PROPERTY_TABLE: PropertyTable<SpiConfig> = PropertyTable::new(PROPERTIES);

fn create() -> Box<dyn Driver> {
    Box::new(Lpd8806::new(SpidevBus))
}

pub struct Lpd8806<B: SpiBus> {
    bus: B,
    id: String,
    led_count: usize,
    config: SpiConfig,
    device: Option<B::Device>,
}

impl<B: SpiBus> Lpd8806<B> {
    pub fn new(bus: B) -> Self {
        Lpd8806 {
            bus,
            id: String::new(),
            led_count: 0,
            config: SpiConfig::default(),
            device: None,
        }
    }

    fn device(&mut self) -> Result<&mut B::Device> {
        self.device
            .as_mut()
            .ok_or(DriverError::NotReady("SPI port is not open"))
    }
}

impl<B: SpiBus> Driver for Lpd8806<B> {
    fn init(&mut self, registry: &mut dyn PropertyRegistry) -> Result<()> {
        debug!("Initializing LPD8806 backend");
        self.config = SpiConfig::default();
        PROPERTY_TABLE.register_all(registry)
    }

    fn deinit(&mut self, registry: &mut dyn PropertyRegistry) {
        debug!("Deinitializing LPD8806 backend");
        PROPERTY_TABLE.unregister_all(registry);
    }

    fn hw_init(&mut self, id: &str, format: &PixelFormat) -> Result<()> {
        require_format(format, &[1], None)?;
        debug!("Using \"{}\" as pixel format", format);

        let path = resolve_id(DESCRIPTOR.family, id, DEFAULT_DEVICE).to_string();
        let device = self.bus.open(&path, &self.config)?;
        info!("LPD8806 on \"{}\" ready", path);
        self.id = path;
        self.device = Some(device);
        Ok(())
    }

    fn hw_deinit(&mut self) {
        if self.device.take().is_some() {
            debug!("Closed SPI port \"{}\"", self.id);
        }
    }

    fn get(&self, param: &Param) -> Result<ParamValue> {
        match param {
            Param::Id => Ok(ParamValue::Id(self.id.clone())),
            Param::LedCount => Ok(ParamValue::LedCount(self.led_count)),
            Param::Gain(_) => Ok(ParamValue::Gain(0)),
            Param::Custom(name) => PROPERTY_TABLE.get(&self.config, name).map(ParamValue::Custom),
        }
    }

    fn set(&mut self, param: &Param, value: ParamValue) -> Result<()> {
        match param {
            Param::Id => self.id = value.into_id()?,
            Param::LedCount => self.led_count = value.into_led_count()?,
            Param::Gain(pos) => {
                let gain = value.into_gain()?;
                trace!("LPD8806 has no gain control, ignoring {} for LED {}", gain, pos);
            }
            Param::Custom(name) => {
                let mut config = self.config;
                PROPERTY_TABLE
                    .set(&mut config, name, value.into_custom()?)
                    .inspect_err(|e| error!("Rejected \"{}\": {}", name, e))?;
                if let Some(device) = self.device.as_mut() {
                    device.configure(&config)?;
                }
                debug!("Set \"{}\" of \"{}\"", name, self.id);
                self.config = config;
            }
        }
        Ok(())
    }

    fn send(&mut self, chain: &ChainView<'_>, count: usize, offset: usize) -> Result<()> {
        let leds = chain.leds(offset, count)?;
        trace!("Sending {} LPD8806 LEDs at offset {}", count, offset);
        write_fully(self.device()?, leds)
    }

    fn show(&mut self) -> Result<()> {
        trace!("Latching LPD8806 data");
        write_fully(self.device()?, &LATCH)
    }
}
