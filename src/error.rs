use std::io;
use thiserror::Error;
use msgbox::IconType;
use std::fmt::Display;
use std::str::Utf8Error;
use btleplug;
use iced;
use serde_json;

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

#[derive(Error, Debug)]
pub enum AppRunError {
    #[error("Failed to start application (iced): {source}")]
    Iced { #[from] source: iced::Error },

    #[error("Failed to start application (config): {source}")]
    ConfigError { #[from] source: ConfigError },

    #[error("Failed to start application (bluetooth): {source}")]
    Device { #[from] source: DeviceError },

    #[error("{source}")]
    Session { #[from] source: SessionError },
}

/// Errors reported by the BLE backend.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Error communicating with device (btleplug): {source}")]
    Btle { #[from] source: btleplug::Error },

    #[error("No bluetooth adapter is available")]
    NoAdapter,

    #[error("No peripheral with id {id:?} has been seen by the adapter")]
    UnknownPeripheral { id: String },

    #[error("No characteristic {uuid} on the connected peripheral")]
    UnknownCharacteristic { uuid: uuid::Uuid },

    #[error("The adapter stopped reporting scan events")]
    ScanInterrupted,

    #[error("The bluetooth backend has been released")]
    Released,
}

impl DeviceError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, DeviceError::Btle { source: btleplug::Error::PermissionDenied })
    }
}

/// Failures of the session operations, grouped by how they are surfaced to the user.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Bluetooth permissions not granted")]
    PermissionDenied,

    #[error("Scan failed: {source}")]
    ScanTransport { source: DeviceError },

    #[error("Could not connect to device: {source}")]
    ConnectionFailure { source: DeviceError },

    #[error("Failed to receive notification: {source}")]
    NotificationDelivery { source: DeviceError },
}

impl SessionError {
    /// The text of the alert shown for this error, `None` for errors that are only logged.
    pub fn notice(&self) -> Option<String> {
        match self {
            SessionError::PermissionDenied => Some("Bluetooth permissions not granted".to_string()),
            SessionError::ConnectionFailure { .. } => Some(
                "Connection failed\n\nCould not connect to device. Check the address and try again.".to_string()
            ),
            SessionError::ScanTransport { .. } => None,
            SessionError::NotificationDelivery { .. } => None,
        }
    }
}

pub fn error_msgbox<T: Display>(message: &'static str, error: &T) {
    let message = format!("{}: {}", message, error);
    eprintln!("{}", &message);
    if let Err(err) = msgbox::create(concat!("BLE Monitor ", env!("CARGO_PKG_VERSION")), &message, IconType::Error) {
        eprintln!("Failed to create msgbox: {:?}", err);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn only_blocking_errors_have_a_notice() {
        assert!(SessionError::PermissionDenied.notice().is_some());
        assert!(SessionError::ConnectionFailure { source: DeviceError::NoAdapter }.notice().is_some());
        assert!(SessionError::ScanTransport { source: DeviceError::NoAdapter }.notice().is_none());
        assert!(SessionError::NotificationDelivery { source: DeviceError::Released }.notice().is_none());
    }

    #[test]
    fn detects_permission_denied_from_btleplug() {
        let err = DeviceError::from(btleplug::Error::PermissionDenied);
        assert!(err.is_permission_denied());
        assert!(!DeviceError::NoAdapter.is_permission_denied());
    }
}
