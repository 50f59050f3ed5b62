//! Error types for the HEYKUBE BLE client

use heykube_core::HeykubeError;
use thiserror::Error;
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Failures reported by a transport implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("BLE adapter not available")]
    AdapterNotAvailable,

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to connect: {0}")]
    ConnectionFailed(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Characteristic not found: {0}")]
    CharacteristicNotFound(Uuid),

    #[error("Failed to read characteristic: {0}")]
    ReadFailed(String),

    #[error("Failed to write to characteristic: {0}")]
    WriteFailed(String),

    #[error("Failed to subscribe to notifications: {0}")]
    SubscriptionFailed(String),

    #[error("Failed to get notifications stream: {0}")]
    NotificationStreamFailed(String),

    #[error("Transport error: {0}")]
    Backend(String),
}

/// Errors surfaced by the HEYKUBE client
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HeykubeBleError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Gave up after {attempts} consecutive connection failures")]
    TooManyRetries { attempts: u32 },

    #[error("{command} timed out after {timeout_ms}ms")]
    CommandTimeout {
        command: &'static str,
        timeout_ms: u64,
    },

    #[error("Session closed")]
    SessionClosed,

    #[error("Not connected to a HEYKUBE")]
    NotConnected,

    #[error("Already connected; disconnect first")]
    AlreadyConnected,

    #[error("No device matching '{prefix}' found")]
    NoDeviceFound { prefix: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] HeykubeError),
}

impl HeykubeBleError {
    /// Wraps any core decode or payload error
    pub fn core(error: impl Into<HeykubeError>) -> Self {
        HeykubeBleError::Core(error.into())
    }
}

pub type Result<T> = std::result::Result<T, HeykubeBleError>;
