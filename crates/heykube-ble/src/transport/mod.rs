//! Transport abstraction over a GATT client
//!
//! The session owns exactly one [`CubeTransport`] and is the only code that
//! calls it. Link loss and notifications reach the session as
//! [`TransportEvent`]s on the receiver handed out by
//! [`CubeTransport::take_event_receiver`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::TransportError;

pub mod btle;
#[cfg(any(test, feature = "testing"))]
pub mod mock;

pub use btle::BtleTransport;
#[cfg(any(test, feature = "testing"))]
pub use mock::{MockHandle, MockTransport};

// ----------------------------------------------------------------------------
// Transport Types
// ----------------------------------------------------------------------------

/// An advertising cube found by a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub address: String,
    /// Signal strength in dBm, when the adapter reports it
    pub rssi: Option<i16>,
}

impl DeviceInfo {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            rssi: None,
        }
    }

    pub fn with_rssi(mut self, rssi: i16) -> Self {
        self.rssi = Some(rssi);
        self
    }
}

/// Asynchronous events raised by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A subscribed characteristic pushed a value
    Notification { uuid: Uuid, data: Vec<u8> },
    /// The link to the device dropped
    Disconnected,
}

// ----------------------------------------------------------------------------
// Transport Trait
// ----------------------------------------------------------------------------

#[async_trait]
pub trait CubeTransport: Send + 'static {
    /// Lists advertising devices whose name starts with `name_prefix`
    async fn scan(
        &mut self,
        name_prefix: &str,
        timeout: Duration,
    ) -> Result<Vec<DeviceInfo>, TransportError>;

    async fn connect(&mut self, device: &DeviceInfo) -> Result<(), TransportError>;

    async fn disconnect(&mut self) -> Result<(), TransportError>;

    async fn read_characteristic(&mut self, uuid: Uuid) -> Result<Vec<u8>, TransportError>;

    async fn write_characteristic(
        &mut self,
        uuid: Uuid,
        data: &[u8],
        with_response: bool,
    ) -> Result<(), TransportError>;

    async fn subscribe(&mut self, uuid: Uuid) -> Result<(), TransportError>;

    async fn unsubscribe(&mut self, uuid: Uuid) -> Result<(), TransportError>;

    /// Hands out the event stream; only the first call returns `Some`
    fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<TransportEvent>>;
}
