//! # Error Types
//!
//! Every driver operation reports failures through [`DriverError`]. The
//! variants mirror the failure classes a host has to tell apart: setup
//! problems (allocation, property registration, pixel format), device
//! resolution, transport I/O and parameter handling.

use std::collections::TryReserveError;
use std::io;

use thiserror::Error;

/// Result alias used throughout the driver contract.
pub type Result<T> = std::result::Result<T, DriverError>;

#[derive(Debug, Error)]
pub enum DriverError {
    /// Instance state could not be allocated.
    #[error("allocation failed: {0}")]
    Allocation(#[from] TryReserveError),

    /// The host-side registry refused a custom property.
    #[error("failed to register property \"{name}\": {reason}")]
    PropertyRegistration { name: String, reason: String },

    /// The pixel format bound to the chain is not supported by this backend.
    #[error("unsupported pixel format {format}: {reason}")]
    FormatUnsupported { format: String, reason: String },

    /// No device matched the requested identifier.
    #[error("no device found for \"{0}\"")]
    DeviceNotFound(String),

    /// The transport handle could not be opened.
    #[error("failed to open \"{id}\": {source}")]
    TransportOpen {
        id: String,
        #[source]
        source: io::Error,
    },

    /// The transport was opened but could not be configured.
    #[error("failed to configure \"{id}\": {detail}")]
    TransportConfig { id: String, detail: String },

    /// A write was not fully consumed by the transport.
    #[error("transport write failed: {0}")]
    TransportWrite(#[source] io::Error),

    /// The parameter kind or custom property is not handled by this backend.
    #[error("unhandled parameter: {0}")]
    UnhandledParameter(String),

    /// The value was rejected by the backend's range or type checks.
    #[error("invalid value: {0}")]
    Validation(String),

    /// The call needs an open transport, which this instance does not have.
    #[error("hardware not ready: {0}")]
    NotReady(&'static str),
}

impl DriverError {
    pub(crate) fn validation(detail: impl Into<String>) -> Self {
        DriverError::Validation(detail.into())
    }

    pub(crate) fn unsupported_format(format: impl ToString, reason: impl Into<String>) -> Self {
        DriverError::FormatUnsupported {
            format: format.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn config(id: &str, detail: impl Into<String>) -> Self {
        DriverError::TransportConfig {
            id: id.to_string(),
            detail: detail.into(),
        }
    }
}
