//! # Glowplug Library for LED Output Drivers
//!
//! `glowplug-lib` defines the contract between a pixel-chain host and the
//! drivers that push pixel data to LED hardware, and ships backends for a
//! handful of real devices.
//!
//! A driver moves through a fixed lifecycle. It is loaded and registers its
//! custom properties, bound to a device and pixel format, fed LED ranges with
//! `send`, latched with `show`, and finally torn down in reverse order. The
//! [`Hardware`] handle enforces that lifecycle for any [`Driver`].
//!
//! ## Backends
//!
//! - `dummy`: no hardware, traces everything it is sent
//! - `arduino-max72xx`: monochrome MAX72xx matrices behind an Arduino on a serial line
//! - `lpd8806-spi`: LPD8806 strips on a Linux spidev port
//! - `niftylino`: Niftylino USB LED controllers
//! - `udp-artnet`: Art-Net DMX nodes over UDP
//!
//! ## Example
//!
//! ```no_run
//! use glowplug_lib::{ChainView, DriverRegistry, Hardware, Param, ParamValue, PixelFormat};
//!
//! fn main() -> glowplug_lib::Result<()> {
//!     let registry = DriverRegistry::builtin();
//!     let descriptor = registry.get("dummy").expect("dummy backend is built in");
//!
//!     let format: PixelFormat = "RGB u8".parse()?;
//!     let mut hw = Hardware::load("strip", descriptor)?;
//!     hw.hw_init("*", &format)?;
//!     hw.set(&Param::LedCount, ParamValue::LedCount(30))?;
//!
//!     let buffer = vec![0x80u8; 30];
//!     let chain = ChainView::new(&buffer, 30, &format)?;
//!     hw.send(&chain, 30, 0)?;
//!     hw.show()?;
//!     Ok(())
//! }
//! ```
//!
//! ## License
//!
//! This project is dual-licensed under the MIT License and the Apache License, Version 2.0.
//! You may choose to use either license, depending on your project needs.

pub mod backends;
pub mod chain;
pub mod discovery;
pub mod driver;
pub mod encode;
pub mod error;
pub mod param;
pub mod property;
pub mod transport;

pub use chain::{ChainView, PixelFormat};
pub use driver::{Descriptor, Driver, DriverRegistry, Hardware, LifecycleState, Version};
pub use error::{DriverError, Result};
pub use param::{Param, ParamValue};
pub use property::{PropertyType, PropertyValue};
