//! Parameter kinds and values of the generic get/set protocol.

use std::fmt::{Display, Formatter};

use crate::error::{DriverError, Result};
use crate::property::PropertyValue;

/// Largest gain value; backends scale it to their native resolution.
pub const GAIN_MAX: u16 = u16::MAX;

/// What a `get`/`set` call addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Param {
    Id,
    LedCount,
    /// Gain of the LED at this position.
    Gain(usize),
    Custom(String),
}

impl Param {
    pub fn custom(name: &str) -> Self {
        Param::Custom(name.to_string())
    }
}

impl Display for Param {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Param::Id => write!(f, "id"),
            Param::LedCount => write!(f, "ledcount"),
            Param::Gain(pos) => write!(f, "gain of LED {}", pos),
            Param::Custom(name) => write!(f, "custom property \"{}\"", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Id(String),
    LedCount(usize),
    Gain(u16),
    Custom(PropertyValue),
}

impl ParamValue {
    fn mismatch(&self, expected: &str) -> DriverError {
        DriverError::validation(format!("expected {} value, got {:?}", expected, self))
    }

    pub fn into_id(self) -> Result<String> {
        match self {
            ParamValue::Id(id) => Ok(id),
            other => Err(other.mismatch("id")),
        }
    }

    pub fn into_led_count(self) -> Result<usize> {
        match self {
            ParamValue::LedCount(count) => Ok(count),
            other => Err(other.mismatch("ledcount")),
        }
    }

    pub fn into_gain(self) -> Result<u16> {
        match self {
            ParamValue::Gain(gain) => Ok(gain),
            other => Err(other.mismatch("gain")),
        }
    }

    pub fn into_custom(self) -> Result<PropertyValue> {
        match self {
            ParamValue::Custom(value) => Ok(value),
            other => Err(other.mismatch("custom property")),
        }
    }
}
