//! Pixel range → wire bytes.
//!
//! Backends either hand the host's component bytes to the transport as they
//! are, or pack them into one bit per LED. Stream transports wrap the result
//! in an opcode/length frame, see [`packet_header`].

use std::borrow::Cow;

use crate::error::{DriverError, Result};

/// Largest payload a framed packet can carry; the length is a single byte.
pub const MAX_PACKET_PAYLOAD: usize = u8::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Wire depth equals the pixel-format depth.
    Passthrough,
    /// One bit per LED, set when the component is at or above the threshold.
    Threshold(u8),
}

impl Encoding {
    pub fn encode<'a>(&self, leds: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        match self {
            Encoding::Passthrough => Ok(Cow::Borrowed(leds)),
            Encoding::Threshold(threshold) => pack_threshold(leds, *threshold).map(Cow::Owned),
        }
    }
}

/// Packs one bit per component, MSB first, 8 LEDs per byte.
///
/// The last byte is padded with zero bits when the LED count is not a
/// multiple of 8.
pub fn pack_threshold(components: &[u8], threshold: u8) -> Result<Vec<u8>> {
    let mut packed = Vec::new();
    packed.try_reserve_exact(components.len().div_ceil(8))?;
    for group in components.chunks(8) {
        let byte = group
            .iter()
            .enumerate()
            .filter(|(_, c)| **c >= threshold)
            .fold(0u8, |acc, (bit, _)| acc | (0x80 >> bit));
        packed.push(byte);
    }
    Ok(packed)
}

/// The `[opcode, length]` header preceding a framed payload.
pub fn packet_header(opcode: u8, payload_len: usize) -> Result<[u8; 2]> {
    let len = u8::try_from(payload_len).map_err(|_| {
        DriverError::validation(format!(
            "packet payload of {} bytes exceeds {} bytes",
            payload_len, MAX_PACKET_PAYLOAD
        ))
    })?;
    Ok([opcode, len])
}
