//! # Backends
//!
//! One [`Driver`](crate::driver::Driver) per family of output hardware:
//!
//! | Family            | Medium          | Wire encoding                    |
//! |-------------------|-----------------|----------------------------------|
//! | `dummy`           | none            | discarded                        |
//! | `lpd8806-spi`     | Linux spidev    | passthrough, `0x00` latch        |
//! | `arduino-max72xx` | serial TTY      | threshold bits in framed packets |
//! | `niftylino`       | USB             | passthrough bulk, control latch  |
//! | `udp-artnet`      | UDP broadcast   | ArtDmx universes                 |

pub mod artnet;
pub mod dummy;
pub mod lpd8806;
pub mod max72xx;
pub mod niftylino;

use log::debug;

use crate::chain::PixelFormat;
use crate::discovery::is_wildcard;
use crate::driver::Descriptor;
use crate::error::{DriverError, Result};

pub(crate) const LICENSE: &str = env!("CARGO_PKG_LICENSE");
pub(crate) const AUTHOR: &str = "glowplug developers";
pub(crate) const URL: &str = env!("CARGO_PKG_REPOSITORY");

pub const DESCRIPTORS: &[Descriptor] = &[
    dummy::DESCRIPTOR,
    lpd8806::DESCRIPTOR,
    max72xx::DESCRIPTOR,
    niftylino::DESCRIPTOR,
    artnet::DESCRIPTOR,
];

/// Replaces the wildcard with the backend's default device.
pub(crate) fn resolve_id<'a>(family: &str, id: &'a str, default: &'a str) -> &'a str {
    if is_wildcard(id) {
        debug!("{}: using default device \"{}\"", family, default);
        default
    } else {
        id
    }
}

/// Rejects formats whose components are not `bytes_per_component` wide, or
/// (with `components`) whose pixels do not have exactly that many components.
pub(crate) fn require_format(
    format: &PixelFormat,
    bytes_per_component: &[usize],
    components: Option<usize>,
) -> Result<()> {
    if !bytes_per_component.contains(&format.bytes_per_component()) {
        return Err(DriverError::unsupported_format(
            format,
            format!(
                "{} byte(s) per component, supported: {:?}",
                format.bytes_per_component(),
                bytes_per_component
            ),
        ));
    }
    if let Some(components) = components {
        if format.components_per_pixel() != components {
            return Err(DriverError::unsupported_format(
                format,
                format!(
                    "{} components per pixel, supported: {}",
                    format.components_per_pixel(),
                    components
                ),
            ));
        }
    }
    Ok(())
}
