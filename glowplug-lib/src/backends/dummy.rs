//! A backend without hardware. Accepts any pixel format and discards all data,
//! tracing it as hex. Useful to exercise a host setup end to end.

use std::io::Write;

use log::{debug, info, trace, warn};

use super::{AUTHOR, LICENSE, URL};
use crate::chain::{ChainView, PixelFormat};
use crate::driver::{Descriptor, Driver, Version, API_VERSION};
use crate::error::{DriverError, Result};
use crate::param::{Param, ParamValue};
use crate::property::{
    Property, PropertyRegistry, PropertyTable, PropertyType, PropertyValue,
};
use crate::transport::null::NullLink;

pub const DESCRIPTOR: Descriptor = Descriptor {
    family: "dummy",
    version: Version::new(0, 1, 0),
    api_version: API_VERSION,
    license: LICENSE,
    author: AUTHOR,
    description: "Hardware-less backend that discards everything it is sent",
    url: URL,
    id_example: "any printable string",
    create: Dummy::create,
};

/// Longest value kept for the `foo` property, in bytes.
pub const FOO_MAX_LEN: usize = 63;

#[derive(Debug)]
pub struct Dummy {
    id: String,
    led_count: usize,
    foo: String,
    bar: i64,
    baz: f64,
    link: Option<NullLink>,
}

impl Default for Dummy {
    fn default() -> Self {
        Dummy {
            id: String::new(),
            led_count: 0,
            foo: "default".to_string(),
            bar: 42,
            baz: 0.5,
            link: None,
        }
    }
}

fn get_foo(d: &Dummy) -> PropertyValue {
    PropertyValue::String(d.foo.clone())
}

fn set_foo(d: &mut Dummy, value: PropertyValue) -> Result<()> {
    let mut foo = value.as_str().unwrap_or_default().to_string();
    if foo.len() > FOO_MAX_LEN {
        warn!("Value of \"foo\" truncated to {} bytes", FOO_MAX_LEN);
        let mut end = FOO_MAX_LEN;
        while !foo.is_char_boundary(end) {
            end -= 1;
        }
        foo.truncate(end);
    }
    info!("Set \"foo\" to \"{}\"", foo);
    d.foo = foo;
    Ok(())
}

fn get_bar(d: &Dummy) -> PropertyValue {
    PropertyValue::Int(d.bar)
}

fn set_bar(d: &mut Dummy, value: PropertyValue) -> Result<()> {
    d.bar = value.as_int().unwrap_or_default();
    info!("Set \"bar\" to {}", d.bar);
    Ok(())
}

fn get_baz(d: &Dummy) -> PropertyValue {
    PropertyValue::Float(d.baz)
}

fn set_baz(d: &mut Dummy, value: PropertyValue) -> Result<()> {
    d.baz = value.as_float().unwrap_or_default();
    info!("Set \"baz\" to {}", d.baz);
    Ok(())
}

const PROPERTIES: &[Property<Dummy>] = &[
    Property {
        name: "foo",
        kind: PropertyType::String,
        get: get_foo,
        set: set_foo,
    },
    Property {
        name: "bar",
        kind: PropertyType::Int,
        get: get_bar,
        set: set_bar,
    },
    Property {
        name: "baz",
        kind: PropertyType::Float,
        get: get_baz,
        set: set_baz,
    },
];

pub const PROPERTY_TABLE: PropertyTable<Dummy> = PropertyTable::new(PROPERTIES);

impl Dummy {
    fn create() -> Box<dyn Driver> {
        Box::<Dummy>::default()
    }

    fn link(&mut self) -> Result<&mut NullLink> {
        self.link
            .as_mut()
            .ok_or(DriverError::NotReady("dummy hardware is not initialized"))
    }
}

impl Driver for Dummy {
    fn init(&mut self, registry: &mut dyn PropertyRegistry) -> Result<()> {
        info!("Initializing dummy backend");
        PROPERTY_TABLE.register_all(registry)
    }

    fn deinit(&mut self, registry: &mut dyn PropertyRegistry) {
        info!("Deinitializing dummy backend");
        PROPERTY_TABLE.unregister_all(registry);
    }

    fn hw_init(&mut self, id: &str, format: &PixelFormat) -> Result<()> {
        debug!("Initializing dummy hardware \"{}\" ({})", id, format);
        self.id = id.to_string();
        self.link = Some(NullLink::new());
        Ok(())
    }

    fn hw_deinit(&mut self) {
        if let Some(link) = self.link.take() {
            debug!(
                "Deinitializing dummy hardware ({} bytes discarded)",
                link.bytes_written()
            );
        }
    }

    fn get(&self, param: &Param) -> Result<ParamValue> {
        match param {
            Param::Id => Ok(ParamValue::Id(self.id.clone())),
            Param::LedCount => Ok(ParamValue::LedCount(self.led_count)),
            Param::Gain(_) => Ok(ParamValue::Gain(0)),
            Param::Custom(name) => PROPERTY_TABLE.get(self, name).map(ParamValue::Custom),
        }
    }

    fn set(&mut self, param: &Param, value: ParamValue) -> Result<()> {
        match param {
            Param::Id => self.id = value.into_id()?,
            Param::LedCount => self.led_count = value.into_led_count()?,
            Param::Gain(pos) => {
                let gain = value.into_gain()?;
                trace!("Ignoring gain {} for LED {}", gain, pos);
            }
            Param::Custom(name) => PROPERTY_TABLE.set(self, name, value.into_custom()?)?,
        }
        Ok(())
    }

    fn send(&mut self, chain: &ChainView<'_>, count: usize, offset: usize) -> Result<()> {
        let leds = chain.leds(offset, count)?;
        trace!("Dummy data at LED {}: {}", offset, hex::encode(leds));
        let link = self.link()?;
        link.write_all(leds).map_err(DriverError::TransportWrite)?;
        debug!("Sent {} LED values to dummy hardware", count);
        Ok(())
    }

    fn show(&mut self) -> Result<()> {
        self.link()?;
        debug!("Showing dummy data");
        Ok(())
    }
}
