//! # Driver Contract
//!
//! Every backend implements [`Driver`] and publishes one constant
//! [`Descriptor`]. The host only ever holds a `Box<dyn Driver>` and drives it
//! through the lifecycle
//!
//! ```text
//! init -> hw_init -> (send | show | get | set)* -> hw_deinit -> deinit
//! ```
//!
//! [`Hardware`] enforces that ordering on the host side.
//!
//! ## Threading
//!
//! Calls into one instance never overlap; the host serializes them. Distinct
//! instances may live on different threads, hence `Driver: Send`. Backends
//! keep no state outside their instance.

pub mod hardware;
pub mod registry;

use std::fmt::{Display, Formatter};

use derivative::Derivative;
use serde::Serialize;

use crate::chain::{ChainView, PixelFormat};
use crate::error::Result;
use crate::param::{Param, ParamValue};
use crate::property::PropertyRegistry;

pub use hardware::{Hardware, LifecycleState};
pub use registry::DriverRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub micro: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, micro: u32) -> Self {
        Version {
            major,
            minor,
            micro,
        }
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)
    }
}

/// Version of the driver contract implemented by this crate.
pub const API_VERSION: Version = Version::new(0, 0, 1);

/// Immutable per-backend record handed to the [`DriverRegistry`].
#[derive(Derivative)]
#[derivative(Debug, PartialEq)]
#[derive(Clone, Copy, Serialize)]
pub struct Descriptor {
    pub family: &'static str,
    pub version: Version,
    pub api_version: Version,
    pub license: &'static str,
    pub author: &'static str,
    pub description: &'static str,
    pub url: &'static str,
    /// What an identifier for this family looks like.
    pub id_example: &'static str,

    #[derivative(Debug = "ignore", PartialEq = "ignore")]
    #[serde(skip)]
    pub create: fn() -> Box<dyn Driver>,
}

impl Descriptor {
    /// A fresh, uninitialized instance of this backend.
    pub fn instantiate(&self) -> Box<dyn Driver> {
        (self.create)()
    }
}

/// The function set every backend provides.
pub trait Driver: Send {
    /// Sets defaults and registers this backend's custom properties.
    fn init(&mut self, registry: &mut dyn PropertyRegistry) -> Result<()>;

    /// Unregisters custom properties. Never fails.
    fn deinit(&mut self, registry: &mut dyn PropertyRegistry);

    /// Checks the pixel format, resolves `id` and opens the transport.
    fn hw_init(&mut self, id: &str, format: &PixelFormat) -> Result<()>;

    /// Closes the transport. Never fails.
    fn hw_deinit(&mut self);

    fn get(&self, param: &Param) -> Result<ParamValue>;

    fn set(&mut self, param: &Param, value: ParamValue) -> Result<()>;

    /// Transfers LEDs `[offset, offset + count)` without making them visible.
    fn send(&mut self, chain: &ChainView<'_>, count: usize, offset: usize) -> Result<()>;

    /// Makes previously sent data visible.
    fn show(&mut self) -> Result<()>;
}
