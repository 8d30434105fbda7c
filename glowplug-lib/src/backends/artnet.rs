//! Art-Net nodes over UDP.
//!
//! `send` only stages LED values in a local frame; `show` transmits the whole
//! frame as ArtDmx packets, 512 channels per universe, starting at the
//! `universe` property and counting up. Sends are bounded by the socket's
//! write timeout.

use bytes::{BufMut, BytesMut};
use log::{debug, info, trace};

use super::{require_format, resolve_id, AUTHOR, LICENSE, URL};
use crate::chain::{ChainView, PixelFormat};
use crate::driver::{Descriptor, Driver, Version, API_VERSION};
use crate::error::{DriverError, Result};
use crate::param::{Param, ParamValue};
use crate::property::{
    int_in_range, Property, PropertyRegistry, PropertyTable, PropertyType, PropertyValue,
};
use crate::transport::udp::UdpLink;

pub const DESCRIPTOR: Descriptor = Descriptor {
    family: "udp-artnet",
    version: Version::new(0, 1, 0),
    api_version: API_VERSION,
    license: LICENSE,
    author: AUTHOR,
    description: "Art-Net nodes reached over UDP",
    url: URL,
    id_example: "127.0.0.1",
    create,
};

/// Broadcast to the local network.
pub const DEFAULT_ADDRESS: &str = "255.255.255.255";
pub const DEFAULT_PORT: u16 = 6454;

pub const ARTNET_ID: &[u8; 8] = b"Art-Net\0";
pub const OP_DMX: u16 = 0x5000;
pub const PROTOCOL_VERSION: u16 = 14;
pub const CHANNELS_PER_UNIVERSE: usize = 512;
pub const MAX_UNIVERSE: u16 = 0x7fff;
pub const HEADER_LEN: usize = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub port: u16,
    pub universe: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            port: DEFAULT_PORT,
            universe: 0,
        }
    }
}

fn get_port(s: &Settings) -> PropertyValue {
    PropertyValue::Int(s.port.into())
}

fn set_port(s: &mut Settings, value: PropertyValue) -> Result<()> {
    s.port = int_in_range("port", &value, 1..=i64::from(u16::MAX))? as u16;
    Ok(())
}

fn get_universe(s: &Settings) -> PropertyValue {
    PropertyValue::Int(s.universe.into())
}

fn set_universe(s: &mut Settings, value: PropertyValue) -> Result<()> {
    s.universe = int_in_range("universe", &value, 0..=i64::from(MAX_UNIVERSE))? as u16;
    Ok(())
}

const PROPERTIES: &[Property<Settings>] = &[
    Property {
        name: "port",
        kind: PropertyType::Int,
        get: get_port,
        set: set_port,
    },
    Property {
        name: "universe",
        kind: PropertyType::Int,
        get: get_universe,
        set: set_universe,
    },
];

pub const PROPERTY_TABLE: PropertyTable<Settings> = PropertyTable::new(PROPERTIES);

fn create() -> Box<dyn Driver> {
    Box::<Artnet>::default()
}

/// Builds one ArtDmx packet. `data` is padded to an even length.
pub fn art_dmx(sequence: u8, universe: u16, data: &[u8]) -> Result<BytesMut> {
    if data.len() > CHANNELS_PER_UNIVERSE {
        return Err(DriverError::validation(format!(
            "{} channels exceed one universe",
            data.len()
        )));
    }
    if universe > MAX_UNIVERSE {
        return Err(DriverError::validation(format!(
            "universe {} outside range (0-{})",
            universe, MAX_UNIVERSE
        )));
    }
    let length = data.len() + data.len() % 2;

    let mut packet = BytesMut::with_capacity(HEADER_LEN + length);
    packet.extend_from_slice(ARTNET_ID);
    packet.put_u16_le(OP_DMX);
    packet.put_u16(PROTOCOL_VERSION);
    packet.put_u8(sequence);
    packet.put_u8(0); // physical port
    packet.put_u16_le(universe);
    packet.put_u16(length as u16);
    packet.extend_from_slice(data);
    packet.resize(HEADER_LEN + length, 0);
    Ok(packet)
}

/// Fails unless a frame of `channels` bytes starting at universe `first`
/// ends at or below [`MAX_UNIVERSE`].
pub fn check_universes(first: u16, channels: usize) -> Result<()> {
    let universes = channels.div_ceil(CHANNELS_PER_UNIVERSE).max(1);
    let last = usize::from(first) + universes - 1;
    if last > usize::from(MAX_UNIVERSE) {
        return Err(DriverError::validation(format!(
            "{} universe(s) from {} run past universe {}",
            universes, first, MAX_UNIVERSE
        )));
    }
    Ok(())
}

/// Counts 1..=255; receivers treat a zero sequence as "sequencing disabled".
fn next_sequence(current: u8) -> u8 {
    current.checked_add(1).unwrap_or(1)
}

#[derive(Debug, Default)]
pub struct Artnet {
    id: String,
    led_count: usize,
    settings: Settings,
    bytes_per_component: usize,
    frame: Vec<u8>,
    sequence: u8,
    link: Option<UdpLink>,
}

impl Artnet {
    fn resize_frame(&mut self, led_count: usize, bytes_per_component: usize) -> Result<()> {
        let len = led_count * bytes_per_component;
        if len > self.frame.len() {
            self.frame.try_reserve_exact(len - self.frame.len())?;
        }
        self.frame.resize(len, 0);
        Ok(())
    }
}

impl Driver for Artnet {
    fn init(&mut self, registry: &mut dyn PropertyRegistry) -> Result<()> {
        self.settings = Settings::default();
        self.bytes_per_component = 1;
        PROPERTY_TABLE.register_all(registry)
    }

    fn deinit(&mut self, registry: &mut dyn PropertyRegistry) {
        PROPERTY_TABLE.unregister_all(registry);
    }

    fn hw_init(&mut self, id: &str, format: &PixelFormat) -> Result<()> {
        require_format(format, &[1], None)?;
        let host = resolve_id(DESCRIPTOR.family, id, DEFAULT_ADDRESS).to_string();
        check_universes(
            self.settings.universe,
            self.led_count * format.bytes_per_component(),
        )?;

        let link = UdpLink::connect(&host, self.settings.port)?;
        self.resize_frame(self.led_count, format.bytes_per_component())?;
        info!("Art-Net output to {} ready", link.peer());

        self.bytes_per_component = format.bytes_per_component();
        self.id = host;
        self.link = Some(link);
        Ok(())
    }

    fn hw_deinit(&mut self) {
        if self.link.take().is_some() {
            debug!("Closed Art-Net output to \"{}\"", self.id);
        }
    }

    fn get(&self, param: &Param) -> Result<ParamValue> {
        match param {
            Param::Id => Ok(ParamValue::Id(self.id.clone())),
            Param::LedCount => Ok(ParamValue::LedCount(self.led_count)),
            Param::Gain(_) => Ok(ParamValue::Gain(0)),
            Param::Custom(name) => PROPERTY_TABLE
                .get(&self.settings, name)
                .map(ParamValue::Custom),
        }
    }

    fn set(&mut self, param: &Param, value: ParamValue) -> Result<()> {
        match param {
            Param::Id => self.id = value.into_id()?,
            Param::LedCount => {
                let led_count = value.into_led_count()?;
                check_universes(
                    self.settings.universe,
                    led_count * self.bytes_per_component,
                )?;
                self.resize_frame(led_count, self.bytes_per_component)?;
                self.led_count = led_count;
            }
            Param::Gain(pos) => {
                let gain = value.into_gain()?;
                trace!("Art-Net has no gain control, ignoring {} for LED {}", gain, pos);
            }
            Param::Custom(name) => {
                let mut settings = self.settings;
                PROPERTY_TABLE.set(&mut settings, name, value.into_custom()?)?;
                check_universes(settings.universe, self.frame.len())?;
                self.settings = settings;
                if name == "port" && self.link.is_some() {
                    info!("New Art-Net port applies from the next hw_init");
                }
            }
        }
        Ok(())
    }

    fn send(&mut self, chain: &ChainView<'_>, count: usize, offset: usize) -> Result<()> {
        if self.link.is_none() {
            return Err(DriverError::NotReady("Art-Net socket is not open"));
        }
        let leds = chain.leds(offset, count)?;
        let start = offset * self.bytes_per_component;
        let staged = self
            .frame
            .get_mut(start..start + leds.len())
            .ok_or_else(|| {
                DriverError::validation(format!(
                    "LED range {}+{} exceeds ledcount {}",
                    offset, count, self.led_count
                ))
            })?;
        staged.copy_from_slice(leds);
        trace!("Staged {} LEDs at offset {}", count, offset);
        Ok(())
    }

    fn show(&mut self) -> Result<()> {
        let link = self
            .link
            .as_ref()
            .ok_or(DriverError::NotReady("Art-Net socket is not open"))?;
        // a frame goes out whole or not at all
        check_universes(self.settings.universe, self.frame.len())?;
        self.sequence = next_sequence(self.sequence);
        let sequence = self.sequence;
        for (index, channels) in self.frame.chunks(CHANNELS_PER_UNIVERSE).enumerate() {
            let universe = self.settings.universe + index as u16;
            let packet = art_dmx(sequence, universe, channels)?;
            link.send_datagram(&packet)?;
        }
        trace!(
            "Sent frame {} ({} channels) to {}",
            sequence,
            self.frame.len(),
            link.peer()
        );
        Ok(())
    }
}
