//! Borrowed views of the host's pixel chain.
//!
//! The host owns the chain buffer and its pixel format. Drivers only ever see
//! a [`ChainView`], and only read from it through [`ChainView::leds`], so a
//! transfer never reaches outside the LED range it was asked to send.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DriverError, Result};

/// Component layout and depth of the host's pixel chain, e.g. `"RGB u8"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PixelFormat {
    layout: String,
    bytes_per_component: usize,
}

impl PixelFormat {
    pub fn new(layout: &str, bytes_per_component: usize) -> Result<Self> {
        if layout.is_empty() || !layout.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(DriverError::validation(format!(
                "invalid component layout \"{}\"",
                layout
            )));
        }
        if !matches!(bytes_per_component, 1 | 2) {
            return Err(DriverError::validation(format!(
                "unsupported component depth of {} bytes",
                bytes_per_component
            )));
        }
        Ok(PixelFormat {
            layout: layout.to_ascii_uppercase(),
            bytes_per_component,
        })
    }

    pub fn components_per_pixel(&self) -> usize {
        self.layout.len()
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.components_per_pixel() * self.bytes_per_component
    }

    pub fn bytes_per_component(&self) -> usize {
        self.bytes_per_component
    }
}

impl Display for PixelFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} u{}", self.layout, self.bytes_per_component * 8)
    }
}

impl FromStr for PixelFormat {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let (Some(layout), Some(depth), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(DriverError::validation(format!(
                "pixel format \"{}\" is not of the form \"<components> u8|u16\"",
                s
            )));
        };
        let bytes_per_component = match depth {
            "u8" => 1,
            "u16" => 2,
            _ => {
                return Err(DriverError::validation(format!(
                    "unknown component type \"{}\"",
                    depth
                )))
            }
        };
        PixelFormat::new(layout, bytes_per_component)
    }
}

impl TryFrom<String> for PixelFormat {
    type Error = DriverError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<PixelFormat> for String {
    fn from(format: PixelFormat) -> Self {
        format.to_string()
    }
}

/// A borrowed view of a chain buffer. One LED is one component value.
#[derive(Debug, Clone, Copy)]
pub struct ChainView<'a> {
    buffer: &'a [u8],
    led_count: usize,
    format: &'a PixelFormat,
}

impl<'a> ChainView<'a> {
    /// Creates a view; the buffer must hold exactly `led_count` components.
    pub fn new(buffer: &'a [u8], led_count: usize, format: &'a PixelFormat) -> Result<Self> {
        let expected = led_count * format.bytes_per_component();
        if buffer.len() != expected {
            return Err(DriverError::validation(format!(
                "chain buffer holds {} bytes, {} LEDs of {} need {}",
                buffer.len(),
                led_count,
                format,
                expected
            )));
        }
        Ok(ChainView {
            buffer,
            led_count,
            format,
        })
    }

    pub fn led_count(&self) -> usize {
        self.led_count
    }

    pub fn format(&self) -> &PixelFormat {
        self.format
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    /// The bytes of LEDs `[offset, offset + count)`.
    pub fn leds(&self, offset: usize, count: usize) -> Result<&'a [u8]> {
        let end = offset
            .checked_add(count)
            .filter(|end| *end <= self.led_count)
            .ok_or_else(|| {
                DriverError::validation(format!(
                    "LED range {}+{} exceeds chain of {} LEDs",
                    offset, count, self.led_count
                ))
            })?;
        let bpc = self.format.bytes_per_component();
        Ok(&self.buffer[offset * bpc..end * bpc])
    }
}
