//! Custom properties.
//!
//! A backend describes its tunables once, as a static [`PropertyTable`] of
//! name, type, getter and setter. The same table drives registration with the
//! host in `init`, unregistration in `deinit`, and every custom-property
//! `get`/`set`, so the three can never drift apart.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{DriverError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    Int,
    Float,
    String,
}

impl Display for PropertyType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PropertyType::Int => "int",
            PropertyType::Float => "float",
            PropertyType::String => "string",
        };
        write!(f, "{}", name)
    }
}

/// Current value of a custom property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Int(i64),
    Float(f64),
    String(String),
}

impl PropertyValue {
    pub fn property_type(&self) -> PropertyType {
        match self {
            PropertyValue::Int(_) => PropertyType::Int,
            PropertyValue::Float(_) => PropertyType::Float,
            PropertyValue::String(_) => PropertyType::String,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(v) => Some(v),
            _ => None,
        }
    }
}

impl Display for PropertyValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyValue::Int(v) => write!(f, "{}", v),
            PropertyValue::Float(v) => write!(f, "{}", v),
            PropertyValue::String(v) => write!(f, "\"{}\"", v),
        }
    }
}

/// Host-side registry that drivers announce their custom properties to.
///
/// Every successful `register` must be matched by exactly one `unregister`.
pub trait PropertyRegistry {
    fn register(&mut self, name: &str, kind: PropertyType) -> Result<()>;

    fn unregister(&mut self, name: &str);
}

/// The default in-memory [`PropertyRegistry`] kept by a hardware handle.
#[derive(Debug, Default, Clone)]
pub struct PropertyBook {
    entries: BTreeMap<String, PropertyType>,
}

impl PropertyBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn property_type(&self, name: &str) -> Option<PropertyType> {
        self.entries.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Registered properties in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, PropertyType)> {
        self.entries.iter().map(|(name, kind)| (name.as_str(), *kind))
    }
}

impl PropertyRegistry for PropertyBook {
    fn register(&mut self, name: &str, kind: PropertyType) -> Result<()> {
        if name.is_empty() {
            return Err(DriverError::PropertyRegistration {
                name: name.to_string(),
                reason: "empty property name".to_string(),
            });
        }
        if self.entries.contains_key(name) {
            return Err(DriverError::PropertyRegistration {
                name: name.to_string(),
                reason: "already registered".to_string(),
            });
        }
        debug!("Registered property \"{}\" ({})", name, kind);
        self.entries.insert(name.to_string(), kind);
        Ok(())
    }

    fn unregister(&mut self, name: &str) {
        if self.entries.remove(name).is_none() {
            warn!("Unregistering unknown property \"{}\"", name);
        }
    }
}

pub type Getter<S> = fn(&S) -> PropertyValue;
pub type Setter<S> = fn(&mut S, PropertyValue) -> Result<()>;

/// One row of a [`PropertyTable`].
pub struct Property<S: 'static> {
    pub(crate) name: &'static str,
    pub(crate) kind: PropertyType,
    pub(crate) get: Getter<S>,
    pub(crate) set: Setter<S>,
}

impl<S> Property<S> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> PropertyType {
        self.kind
    }
}

/// Static name → (type, getter, setter) table for a backend state `S`.
pub struct PropertyTable<S: 'static> {
    properties: &'static [Property<S>],
}

impl<S> PropertyTable<S> {
    pub const fn new(properties: &'static [Property<S>]) -> Self {
        PropertyTable { properties }
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static Property<S>> {
        self.properties.iter()
    }

    fn lookup(&self, name: &str) -> Result<&'static Property<S>> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| DriverError::UnhandledParameter(format!("custom property \"{}\"", name)))
    }

    pub fn get(&self, state: &S, name: &str) -> Result<PropertyValue> {
        let property = self.lookup(name)?;
        Ok((property.get)(state))
    }

    /// Type-checks `value` against the declared type, then runs the setter.
    pub fn set(&self, state: &mut S, name: &str, value: PropertyValue) -> Result<()> {
        let property = self.lookup(name)?;
        if value.property_type() != property.kind {
            return Err(DriverError::validation(format!(
                "property \"{}\" expects {}, got {}",
                name,
                property.kind,
                value.property_type()
            )));
        }
        (property.set)(state, value)
    }

    /// Registers every property; on failure the ones already registered are
    /// unregistered again before the error is returned.
    pub fn register_all(&self, registry: &mut dyn PropertyRegistry) -> Result<()> {
        for (index, property) in self.properties.iter().enumerate() {
            if let Err(e) = registry.register(property.name, property.kind) {
                for registered in &self.properties[..index] {
                    registry.unregister(registered.name);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    pub fn unregister_all(&self, registry: &mut dyn PropertyRegistry) {
        for property in self.properties {
            registry.unregister(property.name);
        }
    }
}

/// Extracts an integer property value and checks it against `range`.
pub(crate) fn int_in_range(
    name: &str,
    value: &PropertyValue,
    range: std::ops::RangeInclusive<i64>,
) -> Result<i64> {
    let v = value
        .as_int()
        .ok_or_else(|| DriverError::validation(format!("\"{}\" must be an int", name)))?;
    if !range.contains(&v) {
        return Err(DriverError::validation(format!(
            "\"{}\" {} outside range ({}-{})",
            name,
            v,
            range.start(),
            range.end()
        )));
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct State {
        level: i64,
        label: String,
    }

    fn get_level(s: &State) -> PropertyValue {
        PropertyValue::Int(s.level)
    }

    fn set_level(s: &mut State, v: PropertyValue) -> Result<()> {
        s.level = int_in_range("level", &v, 0..=10)?;
        Ok(())
    }

    fn get_label(s: &State) -> PropertyValue {
        PropertyValue::String(s.label.clone())
    }

    fn set_label(s: &mut State, v: PropertyValue) -> Result<()> {
        s.label = v.as_str().unwrap_or_default().to_string();
        Ok(())
    }

    const PROPERTIES: &[Property<State>] = &[
        Property {
            name: "level",
            kind: PropertyType::Int,
            get: get_level,
            set: set_level,
        },
        Property {
            name: "label",
            kind: PropertyType::String,
            get: get_label,
            set: set_label,
        },
    ];

    const TABLE: PropertyTable<State> = PropertyTable::new(PROPERTIES);

    #[test]
    fn test_round_trip() {
        let mut state = State::default();
        TABLE.set(&mut state, "level", PropertyValue::Int(7)).unwrap();
        TABLE
            .set(&mut state, "label", PropertyValue::String("desk".into()))
            .unwrap();

        assert_eq!(TABLE.get(&state, "level").unwrap(), PropertyValue::Int(7));
        assert_eq!(
            TABLE.get(&state, "label").unwrap(),
            PropertyValue::String("desk".into())
        );
    }

    #[test]
    fn test_unknown_name_is_unhandled() {
        let mut state = State::default();
        assert!(matches!(
            TABLE.get(&state, "nope"),
            Err(DriverError::UnhandledParameter(_))
        ));
        assert!(matches!(
            TABLE.set(&mut state, "nope", PropertyValue::Int(1)),
            Err(DriverError::UnhandledParameter(_))
        ));
    }

    #[test]
    fn test_type_and_range_checks() {
        let mut state = State::default();
        assert!(matches!(
            TABLE.set(&mut state, "level", PropertyValue::Float(1.0)),
            Err(DriverError::Validation(_))
        ));
        assert!(matches!(
            TABLE.set(&mut state, "level", PropertyValue::Int(11)),
            Err(DriverError::Validation(_))
        ));
        assert_eq!(state.level, 0);
    }

    #[test]
    fn test_register_all_is_symmetric() {
        let mut book = PropertyBook::new();
        TABLE.register_all(&mut book).unwrap();
        assert_eq!(book.len(), 2);
        assert_eq!(book.property_type("label"), Some(PropertyType::String));

        TABLE.unregister_all(&mut book);
        assert!(book.is_empty());
    }

    #[test]
    fn test_failed_registration_rolls_back() {
        let mut book = PropertyBook::new();
        book.register("label", PropertyType::Int).unwrap();

        let result = TABLE.register_all(&mut book);
        assert!(matches!(
            result,
            Err(DriverError::PropertyRegistration { .. })
        ));
        // "level" was registered before the clash and must be gone again
        assert!(!book.contains("level"));
        assert!(book.contains("label"));
    }
}
