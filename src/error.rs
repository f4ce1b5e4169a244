use std::io;
use std::str::Utf8Error;
use thiserror::Error;
use btleplug;
use serde_json;

use crate::device::types::ErrorKind;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to determine path to config file")]
    NoConfigPath,

    #[error("Failed to acquire file lock on config file: {source}")]
    CanNotLock { source: io::Error },

    #[error("Failed to encode/decode config as utf-8: {source}")]
    Utf8Error { #[from] source: Utf8Error },

    #[error("Failed to read/write config file: {source}")]
    IOError { #[from] source: io::Error },

    #[error("Failed to parse/build config file: {source}")]
    JsonError { #[from] source: serde_json::Error },
}

impl ConfigError {
    pub fn is_file_not_found_error(&self) -> bool {
        match self {
            ConfigError::IOError { source } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Precondition failures of link commands. These are the only errors a host sees
/// synchronously; everything the connector reports goes through the event stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("Peripheral identifier must not be empty")]
    EmptyPeripheralId,

    #[error("Not connected to printer")]
    NotConnected,

    #[error("Payload to write must not be empty")]
    EmptyPayload,
}

#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("Error communicating with printer (btleplug): {source}")]
    Btle { #[from] source: btleplug::Error },

    #[error("No bluetooth adapter is available")]
    NoAdapter,

    #[error("Printer {0} was not found while scanning")]
    PeripheralNotFound(String),

    #[error("A required bluetooth characteristic is not available")]
    MissingCharacteristic,
}

impl ConnectorError {
    /// Maps a transport error onto the kind reported in `Event::Error`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConnectorError::Btle { source } => match source {
                btleplug::Error::PermissionDenied => ErrorKind::PermissionDenied,
                btleplug::Error::DeviceNotFound => ErrorKind::PeripheralNotFound,
                btleplug::Error::NotSupported(_) => ErrorKind::ConnectorUnavailable,
                _ => ErrorKind::ConnectionFailed,
            },
            ConnectorError::NoAdapter => ErrorKind::ConnectorUnavailable,
            ConnectorError::PeripheralNotFound(_) => ErrorKind::PeripheralNotFound,
            ConnectorError::MissingCharacteristic => ErrorKind::ConnectionFailed,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppRunError {
    #[error("Failed to start print bridge (config): {source}")]
    ConfigError { #[from] source: ConfigError },

    #[error("Failed to start print bridge (io): {source}")]
    IOError { #[from] source: io::Error },

    #[error("Print bridge command rejected: {source}")]
    Link { #[from] source: LinkError },

    #[error("Failed to encode event: {source}")]
    Json { #[from] source: serde_json::Error },
}
