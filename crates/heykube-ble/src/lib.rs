//! Bluetooth Low Energy client for the HEYKUBE smart cube
//!
//! ## Architecture
//!
//! A connected [`HeyKube`] runs two tasks:
//!
//! - the connection task ([`session`]) owns the transport, retries the
//!   connect a bounded number of times and reconnects after link loss
//! - the command task ([`dispatcher`]) executes queued commands one at a
//!   time and forwards device pushes to the notification queue, replaying
//!   subscriptions whenever the link is replaced
//!
//! The caller talks to both only through those two queues.
//!
//! - [`config`] - Client configuration and TOML loading
//! - [`error`] - Error types
//! - [`protocol`] - GATT service and characteristic UUIDs
//! - [`transport`] - Transport trait, `btleplug` backend and test mock
//!
//! ## Usage
//!
//! ```rust,no_run
//! use heykube_ble::{BtleTransport, HeyKube, HeykubeConfig, NotifyOn};
//! use heykube_core::NotifyFlags;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut cube = HeyKube::new(BtleTransport::new(), HeykubeConfig::default())?;
//! let device = cube.connect_first().await?;
//! println!("Connected to {}", device.name);
//!
//! cube.read_cube_state().await?;
//! println!("{}", cube.cube().state());
//!
//! cube.enable_notifications(NotifyOn::Status(NotifyFlags::MOVE)).await?;
//! let report = cube.wait_for_notify(None, None).await?;
//! println!("seq {} at {}", report.seq_num, report.timestamp);
//!
//! cube.disconnect().await?;
//! # Ok(())
//! # }
//! ```

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use client::{CubeEvent, HeyKube, NotifyOn, NotifyReport};
pub use config::HeykubeConfig;
pub use dispatcher::Notification;
pub use error::{HeykubeBleError, Result, TransportError};
pub use session::{LinkSession, SessionState, SessionStatus};
pub use transport::{BtleTransport, CubeTransport, DeviceInfo, TransportEvent};

#[cfg(any(test, feature = "testing"))]
pub use transport::{MockHandle, MockTransport};
