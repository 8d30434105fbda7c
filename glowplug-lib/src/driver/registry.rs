use std::collections::BTreeMap;

use log::warn;

use super::Descriptor;
use crate::backends;

/// Family name → descriptor lookup, assembled once by the host.
#[derive(Debug, Default, Clone)]
pub struct DriverRegistry {
    descriptors: BTreeMap<&'static str, Descriptor>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All backends compiled into this crate.
    pub fn builtin() -> Self {
        let mut registry = DriverRegistry::new();
        for descriptor in backends::DESCRIPTORS {
            registry.register(*descriptor);
        }
        registry
    }

    /// Adds a descriptor; a later one for the same family replaces the earlier.
    pub fn register(&mut self, descriptor: Descriptor) {
        if let Some(previous) = self.descriptors.insert(descriptor.family, descriptor) {
            warn!(
                "Driver family \"{}\" {} replaced by {}",
                previous.family, previous.version, descriptor.version
            );
        }
    }

    pub fn get(&self, family: &str) -> Option<&Descriptor> {
        self.descriptors.get(family)
    }

    /// Descriptors ordered by family name.
    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.descriptors.values()
    }

    pub fn families(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.descriptors.keys().copied()
    }
}
