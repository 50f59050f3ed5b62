//! Client configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::HeykubeBleError;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for a HEYKUBE session
///
/// Durations are written in TOML as integer milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeykubeConfig {
    /// How long a scan listens for advertisements
    #[serde(with = "millis")]
    pub scan_timeout: Duration,
    /// Maximum time for one transport connect attempt
    #[serde(with = "millis")]
    pub connection_timeout: Duration,
    /// How long a caller waits for a queued command to complete
    #[serde(with = "millis")]
    pub command_timeout: Duration,
    /// Default wait for a notification before falling back to a state read
    #[serde(with = "millis")]
    pub notify_timeout: Duration,
    /// Consecutive connect failures tolerated before giving up
    pub max_connect_attempts: u32,
    /// Pause between connect attempts
    #[serde(with = "millis")]
    pub retry_delay: Duration,
    /// Advertised name prefix identifying a HEYKUBE
    pub device_name_prefix: String,
    /// Capacity of the command queue
    pub command_queue_size: usize,
    /// Capacity of the notification queue
    pub notification_queue_size: usize,
}

impl Default for HeykubeConfig {
    fn default() -> Self {
        Self {
            scan_timeout: Duration::from_secs(5),
            connection_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(5),
            notify_timeout: Duration::from_secs(10),
            max_connect_attempts: 3,
            retry_delay: Duration::from_millis(500),
            device_name_prefix: "HEYKUBE".to_string(),
            command_queue_size: 32,
            notification_queue_size: 64,
        }
    }
}

impl HeykubeConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from TOML; missing keys take their defaults
    pub fn from_toml_str(text: &str) -> Result<Self, HeykubeBleError> {
        let config: Self =
            toml::from_str(text).map_err(|e| HeykubeBleError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HeykubeBleError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            HeykubeBleError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, HeykubeBleError> {
        toml::to_string(self).map_err(|e| HeykubeBleError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), HeykubeBleError> {
        if self.max_connect_attempts == 0 {
            return Err(HeykubeBleError::Config(
                "max_connect_attempts must be at least 1".to_string(),
            ));
        }
        if self.command_queue_size == 0 || self.notification_queue_size == 0 {
            return Err(HeykubeBleError::Config(
                "queue sizes must be non-zero".to_string(),
            ));
        }
        for (name, value) in [
            ("scan_timeout", self.scan_timeout),
            ("connection_timeout", self.connection_timeout),
            ("command_timeout", self.command_timeout),
            ("notify_timeout", self.notify_timeout),
        ] {
            if value.is_zero() {
                return Err(HeykubeBleError::Config(format!("{} must be non-zero", name)));
            }
        }
        Ok(())
    }

    /// Set scan timeout
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Set connection timeout
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set command timeout
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set notification wait timeout
    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    /// Set the number of consecutive connect failures tolerated
    pub fn with_max_connect_attempts(mut self, attempts: u32) -> Self {
        self.max_connect_attempts = attempts;
        self
    }

    /// Set the pause between connect attempts
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set device name prefix
    pub fn with_device_name_prefix(mut self, prefix: String) -> Self {
        self.device_name_prefix = prefix;
        self
    }

    /// Set command and notification queue capacities
    pub fn with_queue_sizes(mut self, commands: usize, notifications: usize) -> Self {
        self.command_queue_size = commands;
        self.notification_queue_size = notifications;
        self
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
