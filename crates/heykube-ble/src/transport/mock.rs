//! In-memory transport for deterministic tests
//!
//! [`MockTransport`] is handed to the client while a cloned [`MockHandle`]
//! stays with the test to script connect failures, serve reads, push
//! notifications and drop the link.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use heykube_core::codec::STATE_BYTES;
use heykube_core::WireField;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use super::{CubeTransport, DeviceInfo, TransportEvent};
use crate::error::TransportError;
use crate::protocol::{characteristic_uuid, matches_device_name, CUBE_STATE_CHARACTERISTIC_UUID};

// ----------------------------------------------------------------------------
// Mock State
// ----------------------------------------------------------------------------

/// A write observed by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub uuid: Uuid,
    pub data: Vec<u8>,
    pub with_response: bool,
}

#[derive(Debug, Default)]
struct MockState {
    devices: Vec<DeviceInfo>,
    /// Connect attempts still scripted to fail
    failures_remaining: u32,
    connect_attempts: u32,
    connected: bool,
    /// Whether the next disconnect reports a radio error
    fail_disconnect: bool,
    values: HashMap<Uuid, Vec<u8>>,
    writes: Vec<RecordedWrite>,
    subscriptions: HashSet<Uuid>,
    subscribe_calls: HashMap<Uuid, usize>,
    read_delay: Option<Duration>,
    event_tx: Option<mpsc::UnboundedSender<TransportEvent>>,
}

// ----------------------------------------------------------------------------
// Mock Transport
// ----------------------------------------------------------------------------

pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    event_rx: Option<mpsc::UnboundedReceiver<TransportEvent>>,
}

impl MockTransport {
    /// A transport advertising one cube, plus the handle that controls it
    pub fn new() -> (Self, MockHandle) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let state = MockState {
            devices: vec![DeviceInfo::new("HEYKUBE-MOCK", "00:11:22:33:44:55").with_rssi(-42)],
            event_tx: Some(event_tx),
            ..MockState::default()
        };
        let state = Arc::new(Mutex::new(state));
        (
            Self {
                state: state.clone(),
                event_rx: Some(event_rx),
            },
            MockHandle { state },
        )
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        lock(&self.state)
    }

    fn require_connected(&self) -> Result<(), TransportError> {
        if self.lock().connected {
            Ok(())
        } else {
            Err(TransportError::NotConnected)
        }
    }
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    // A panicking test thread must not hide the state from the others
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl CubeTransport for MockTransport {
    async fn scan(
        &mut self,
        name_prefix: &str,
        _timeout: Duration,
    ) -> Result<Vec<DeviceInfo>, TransportError> {
        Ok(self
            .lock()
            .devices
            .iter()
            .filter(|d| matches_device_name(&d.name, name_prefix))
            .cloned()
            .collect())
    }

    async fn connect(&mut self, device: &DeviceInfo) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.connect_attempts += 1;
        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            return Err(TransportError::ConnectionFailed(format!(
                "scripted failure connecting to {}",
                device.address
            )));
        }
        state.connected = true;
        debug!("Mock connected to {}", device.name);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let mut state = self.lock();
        if std::mem::take(&mut state.fail_disconnect) {
            return Err(TransportError::Backend("scripted disconnect failure".to_string()));
        }
        state.connected = false;
        state.subscriptions.clear();
        Ok(())
    }

    async fn read_characteristic(&mut self, uuid: Uuid) -> Result<Vec<u8>, TransportError> {
        self.require_connected()?;
        let delay = self.lock().read_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.lock()
            .values
            .get(&uuid)
            .cloned()
            .ok_or(TransportError::CharacteristicNotFound(uuid))
    }

    async fn write_characteristic(
        &mut self,
        uuid: Uuid,
        data: &[u8],
        with_response: bool,
    ) -> Result<(), TransportError> {
        self.require_connected()?;
        let mut state = self.lock();
        state.writes.push(RecordedWrite {
            uuid,
            data: data.to_vec(),
            with_response,
        });

        // A written state replaces the state bytes of the frame, like the device
        if uuid == CUBE_STATE_CHARACTERISTIC_UUID && data.len() == STATE_BYTES {
            if let Some(frame) = state.values.get_mut(&uuid) {
                if frame.len() >= STATE_BYTES {
                    frame[..STATE_BYTES].copy_from_slice(data);
                }
            }
        }
        Ok(())
    }

    async fn subscribe(&mut self, uuid: Uuid) -> Result<(), TransportError> {
        self.require_connected()?;
        let mut state = self.lock();
        *state.subscribe_calls.entry(uuid).or_default() += 1;
        state.subscriptions.insert(uuid);
        Ok(())
    }

    async fn unsubscribe(&mut self, uuid: Uuid) -> Result<(), TransportError> {
        self.require_connected()?;
        self.lock().subscriptions.remove(&uuid);
        Ok(())
    }

    fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<TransportEvent>> {
        self.event_rx.take()
    }
}

// ----------------------------------------------------------------------------
// Mock Handle
// ----------------------------------------------------------------------------

/// Test-side control of a [`MockTransport`]
#[derive(Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        lock(&self.state)
    }

    /// Makes the next `count` connect attempts fail
    pub fn fail_next_connects(&self, count: u32) {
        self.lock().failures_remaining = count;
    }

    /// Makes the next disconnect fail
    pub fn fail_next_disconnect(&self) {
        self.lock().fail_disconnect = true;
    }

    pub fn connect_attempts(&self) -> u32 {
        self.lock().connect_attempts
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    pub fn set_devices(&self, devices: Vec<DeviceInfo>) {
        self.lock().devices = devices;
    }

    /// Value returned by reads of `field`
    pub fn set_value(&self, field: WireField, data: impl Into<Vec<u8>>) {
        self.lock()
            .values
            .insert(characteristic_uuid(field), data.into());
    }

    pub fn value(&self, field: WireField) -> Option<Vec<u8>> {
        self.lock().values.get(&characteristic_uuid(field)).cloned()
    }

    /// Delays every read, to exercise command timeouts
    pub fn set_read_delay(&self, delay: Option<Duration>) {
        self.lock().read_delay = delay;
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.lock().writes.clone()
    }

    /// Payloads written to `field`, oldest first
    pub fn writes_to(&self, field: WireField) -> Vec<Vec<u8>> {
        let uuid = characteristic_uuid(field);
        self.lock()
            .writes
            .iter()
            .filter(|w| w.uuid == uuid)
            .map(|w| w.data.clone())
            .collect()
    }

    pub fn is_subscribed(&self, field: WireField) -> bool {
        self.lock()
            .subscriptions
            .contains(&characteristic_uuid(field))
    }

    /// How many times the transport was asked to subscribe to `field`
    pub fn subscribe_calls(&self, field: WireField) -> usize {
        self.lock()
            .subscribe_calls
            .get(&characteristic_uuid(field))
            .copied()
            .unwrap_or(0)
    }

    /// Pushes a notification as if the device sent it
    pub fn push_notification(&self, field: WireField, data: impl Into<Vec<u8>>) {
        let state = self.lock();
        if let Some(tx) = &state.event_tx {
            let _ = tx.send(TransportEvent::Notification {
                uuid: characteristic_uuid(field),
                data: data.into(),
            });
        }
    }

    /// Drops the link as the radio would; subscriptions are lost with it
    pub fn drop_link(&self) {
        let mut state = self.lock();
        state.connected = false;
        state.subscriptions.clear();
        if let Some(tx) = &state.event_tx {
            let _ = tx.send(TransportEvent::Disconnected);
        }
    }
}
