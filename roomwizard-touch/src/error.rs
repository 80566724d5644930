//! Error types for touch pipeline operations

use std::path::PathBuf;
use thiserror::Error;

use crate::calibration::CalibrationError;

/// Result type alias for touch pipeline operations
pub type Result<T> = std::result::Result<T, TouchError>;

/// Errors that can occur while driving the touch pipeline
#[derive(Debug, Error)]
pub enum TouchError {
    /// The input device could not be opened
    #[error("Touch device {path} unavailable: {source}")]
    DeviceUnavailable {
        /// Device node that failed to open
        path: PathBuf,
        /// Underlying open error
        #[source]
        source: std::io::Error,
    },

    /// Calibration file could not be read or parsed
    #[error("Calibration error: {0}")]
    Calibration(#[from] CalibrationError),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Configuration file could not be parsed
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Configuration serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TouchError {
    /// Whether this error means the touch device is missing or inaccessible
    ///
    /// Callers typically disable touch features instead of exiting when this
    /// returns `true`.
    #[must_use]
    pub fn is_device_unavailable(&self) -> bool {
        matches!(self, Self::DeviceUnavailable { .. })
    }
}
