//! Device error types
//!
//! Every variant except [`DeviceError::UnsupportedConfiguration`] is
//! allocation-free so it can be returned from the real-time I/O path.

use thiserror::Error;

/// Result type alias for device operations
pub type Result<T> = std::result::Result<T, DeviceError>;

/// Broad error category reported to the host as a status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Allocation or buffer mapping failure
    ResourceExhaustion,
    /// Operation attempted outside the state it requires
    InvalidState,
    /// Unrecognized format, rate or setting
    UnsupportedConfiguration,
}

/// Errors that can occur during device operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    #[error("Resource exhausted: {what}")]
    ResourceExhaustion { what: &'static str },

    #[error("Invalid state for {operation}: {reason}")]
    InvalidState {
        operation: &'static str,
        reason: &'static str,
    },

    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    #[error("Device work queue is no longer running")]
    WorkQueueClosed,
}

impl DeviceError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeviceError::ResourceExhaustion { .. } => ErrorKind::ResourceExhaustion,
            DeviceError::InvalidState { .. } | DeviceError::WorkQueueClosed => {
                ErrorKind::InvalidState
            }
            DeviceError::UnsupportedConfiguration(_) => ErrorKind::UnsupportedConfiguration,
        }
    }
}
