//! In-memory multi-instance byte-stream devices
//!
//! A control endpoint creates and destroys data endpoints on demand. Every
//! data endpoint owns a bounded circular byte buffer with blocking and
//! non-blocking read/write.

pub mod control;
pub mod core;
pub mod hot_path;
pub mod infrastructure;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use control::{ControlCommand, ControlService, ControlSession};
pub use crate::core::{Endpoint, EndpointId, EndpointTable, IdentitySet, CONTROL_ENDPOINT_ID};
pub use hot_path::{Interest, Interrupt, Interrupter, OpenMode, Readiness, RingBuffer, Session};
pub use infrastructure::config::{Config, ConfigError, DeviceConfig, LoggingConfig};

use thiserror::Error;

/// Main error type for device operations
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("another control operation is in flight")]
    Busy,

    #[error("no free endpoint identifier")]
    ResourceExhausted,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("endpoint {0} not found")]
    NotFound(u32),

    #[error("operation would block")]
    WouldBlock,

    #[error("blocking operation interrupted")]
    Interrupted,

    #[error("endpoint {0} was revoked")]
    EndpointRevoked(u32),

    #[error("{0} is not supported on a stream endpoint")]
    NotSupported(&'static str),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl DeviceError {
    /// POSIX errno the equivalent character-device call would fail with
    pub fn errno(&self) -> i32 {
        match self {
            DeviceError::Busy => 16,               // EBUSY
            DeviceError::ResourceExhausted => 12,  // ENOMEM
            DeviceError::InvalidArgument(_) => 22, // EINVAL
            DeviceError::NotFound(_) => 2,         // ENOENT
            DeviceError::WouldBlock => 11,         // EAGAIN
            DeviceError::Interrupted => 4,         // EINTR
            DeviceError::EndpointRevoked(_) => 19, // ENODEV
            DeviceError::NotSupported(_) => 29,    // ESPIPE
            DeviceError::Config(_) => 22,
        }
    }

    /// Whether the error belongs to the invalid-argument family
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            DeviceError::InvalidArgument(_) | DeviceError::NotSupported(_)
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, DeviceError>;
