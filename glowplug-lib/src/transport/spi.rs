//! # SPI Transport
//!
//! Talks to Linux `spidev` character devices (`/dev/spidevB.C`). Each
//! `write` becomes one SPI message with the receive side ignored. Other
//! platforms fail to open any device.
//!
//! Transfers carry no timeout: a message blocks until the controller has
//! clocked out all of it.

use std::io::{self, Write};

use log::debug;

use crate::error::{DriverError, Result};

/// Largest message the spidev driver accepts by default (`bufsiz`).
pub const SPIDEV_BUFSIZ: usize = 4096;

/// Clock polarity 0, clock phase 0.
pub const SPI_MODE_0: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiConfig {
    pub mode: u8,
    pub bits_per_word: u8,
    pub speed_hz: u32,
    /// Delay after each message before the chip select is released.
    pub delay_usecs: u16,
}

impl Default for SpiConfig {
    fn default() -> Self {
        SpiConfig {
            mode: SPI_MODE_0,
            bits_per_word: 8,
            speed_hz: 500_000,
            delay_usecs: 0,
        }
    }
}

/// Opens SPI devices by path.
pub trait SpiBus: Send {
    type Device: SpiDevice;

    fn open(&mut self, path: &str, config: &SpiConfig) -> Result<Self::Device>;
}

/// An open SPI device. Writes may be split into several messages.
pub trait SpiDevice: Write + Send {
    /// Applies mode, word size and clock speed to the open device.
    fn configure(&mut self, config: &SpiConfig) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SpidevBus;

impl SpiBus for SpidevBus {
    type Device = Spidev;

    fn open(&mut self, path: &str, config: &SpiConfig) -> Result<Spidev> {
        let handle = sys::Handle::open(path).map_err(|source| DriverError::TransportOpen {
            id: path.to_string(),
            source,
        })?;
        let mut device = Spidev {
            handle,
            path: path.to_string(),
            config: *config,
        };
        device.configure(config)?;
        Ok(device)
    }
}

pub struct Spidev {
    handle: sys::Handle,
    path: String,
    config: SpiConfig,
}

impl std::fmt::Debug for Spidev {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spidev")
            .field("path", &self.path)
            .field("config", &self.config)
            .finish()
    }
}

impl SpiDevice for Spidev {
    fn configure(&mut self, config: &SpiConfig) -> Result<()> {
        self.handle
            .configure(config)
            .map_err(|e| DriverError::config(&self.path, e.to_string()))?;
        debug!(
            "SPI \"{}\" initialized (mode: {}, bits-per-word: {}, speed-hz: {})",
            self.path, config.mode, config.bits_per_word, config.speed_hz
        );
        self.config = *config;
        Ok(())
    }
}

impl Write for Spidev {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let message = &buf[..buf.len().min(SPIDEV_BUFSIZ)];
        self.handle.transfer(&self.config, message)?;
        Ok(message.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(target_os = "linux")]
mod sys {
    use std::io;

    use spidev::{SpiModeFlags, SpidevOptions, SpidevTransfer};

    use super::SpiConfig;

    pub(super) struct Handle(spidev::Spidev);

    impl Handle {
        pub(super) fn open(path: &str) -> io::Result<Handle> {
            spidev::Spidev::open(path).map(Handle)
        }

        pub(super) fn configure(&mut self, config: &SpiConfig) -> io::Result<()> {
            let options = SpidevOptions::new()
                .mode(SpiModeFlags::from_bits_truncate(u32::from(config.mode)))
                .bits_per_word(config.bits_per_word)
                .max_speed_hz(config.speed_hz)
                .build();
            self.0.configure(&options)
        }

        pub(super) fn transfer(&mut self, config: &SpiConfig, tx: &[u8]) -> io::Result<()> {
            let mut message = SpidevTransfer::write(tx);
            message.speed_hz = config.speed_hz;
            message.delay_usecs = config.delay_usecs;
            message.bits_per_word = config.bits_per_word;
            self.0.transfer(&mut message)
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod sys {
    use std::io;

    use super::SpiConfig;

    pub(super) enum Handle {}

    fn unsupported() -> io::Error {
        io::Error::new(io::ErrorKind::Unsupported, "spidev is only available on Linux")
    }

    impl Handle {
        pub(super) fn open(_path: &str) -> io::Result<Handle> {
            Err(unsupported())
        }

        pub(super) fn configure(&mut self, _config: &SpiConfig) -> io::Result<()> {
            match *self {}
        }

        pub(super) fn transfer(&mut self, _config: &SpiConfig, _tx: &[u8]) -> io::Result<()> {
            match *self {}
        }
    }
}
