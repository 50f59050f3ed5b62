//! `btleplug` transport

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{CubeTransport, DeviceInfo, TransportEvent};
use crate::error::TransportError;
use crate::protocol::matches_device_name;

// ----------------------------------------------------------------------------
// BLE Transport
// ----------------------------------------------------------------------------

/// GATT client backed by the platform Bluetooth stack
pub struct BtleTransport {
    adapter: Option<Adapter>,
    /// Peripherals seen by the last scan, keyed by address
    discovered: HashMap<String, Peripheral>,
    peripheral: Option<Peripheral>,
    characteristics: HashMap<Uuid, Characteristic>,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    /// Notification forwarder and disconnect watcher of the current link
    link_tasks: Vec<JoinHandle<()>>,
}

impl Default for BtleTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl BtleTransport {
    pub fn new() -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            adapter: None,
            discovered: HashMap::new(),
            peripheral: None,
            characteristics: HashMap::new(),
            event_tx,
            event_rx: Some(event_rx),
            link_tasks: Vec::new(),
        }
    }

    /// Initialize the first BLE adapter
    async fn adapter(&mut self) -> Result<Adapter, TransportError> {
        if let Some(adapter) = &self.adapter {
            return Ok(adapter.clone());
        }

        let manager = Manager::new()
            .await
            .map_err(|e| TransportError::Backend(format!("Failed to create BLE manager: {}", e)))?;
        let adapters = manager
            .adapters()
            .await
            .map_err(|e| TransportError::Backend(format!("Failed to get BLE adapters: {}", e)))?;
        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(TransportError::AdapterNotAvailable)?;

        info!("BLE adapter initialized");
        self.adapter = Some(adapter.clone());
        Ok(adapter)
    }

    async fn find_peripheral(&mut self, address: &str) -> Result<Peripheral, TransportError> {
        if let Some(peripheral) = self.discovered.get(address) {
            return Ok(peripheral.clone());
        }

        // Reconnects after a restart of the scan cache still find known devices
        let adapter = self.adapter().await?;
        let peripherals = adapter
            .peripherals()
            .await
            .map_err(|e| TransportError::Backend(e.to_string()))?;
        peripherals
            .into_iter()
            .find(|p| p.address().to_string() == address)
            .ok_or_else(|| TransportError::DeviceNotFound(address.to_string()))
    }

    fn characteristic(&self, uuid: Uuid) -> Result<(&Peripheral, &Characteristic), TransportError> {
        let peripheral = self.peripheral.as_ref().ok_or(TransportError::NotConnected)?;
        let characteristic = self
            .characteristics
            .get(&uuid)
            .ok_or(TransportError::CharacteristicNotFound(uuid))?;
        Ok((peripheral, characteristic))
    }

    /// Discovers services and starts forwarding events of a freshly connected peripheral
    async fn prepare_link(
        &mut self,
        adapter: &Adapter,
        peripheral: &Peripheral,
    ) -> Result<(), TransportError> {
        peripheral.discover_services().await.map_err(|e| {
            TransportError::ConnectionFailed(format!("Failed to discover services: {}", e))
        })?;

        self.characteristics = peripheral
            .characteristics()
            .into_iter()
            .map(|c| (c.uuid, c))
            .collect();
        self.start_link_tasks(adapter, peripheral).await
    }

    fn stop_link_tasks(&mut self) {
        for task in self.link_tasks.drain(..) {
            task.abort();
        }
    }

    /// Forward notifications and link loss of `peripheral` to the event channel
    async fn start_link_tasks(
        &mut self,
        adapter: &Adapter,
        peripheral: &Peripheral,
    ) -> Result<(), TransportError> {
        let mut notifications = peripheral
            .notifications()
            .await
            .map_err(|e| TransportError::NotificationStreamFailed(e.to_string()))?;
        let event_tx = self.event_tx.clone();
        self.link_tasks.push(tokio::spawn(async move {
            while let Some(data) = notifications.next().await {
                let event = TransportEvent::Notification {
                    uuid: data.uuid,
                    data: data.value,
                };
                if event_tx.send(event).is_err() {
                    break;
                }
            }
            debug!("Notification forwarder ended");
        }));

        let mut central_events = adapter
            .events()
            .await
            .map_err(|e| TransportError::Backend(format!("Failed to get adapter events: {}", e)))?;
        let event_tx = self.event_tx.clone();
        let peripheral_id = peripheral.id();
        self.link_tasks.push(tokio::spawn(async move {
            while let Some(event) = central_events.next().await {
                if let CentralEvent::DeviceDisconnected(id) = event {
                    if id == peripheral_id {
                        let _ = event_tx.send(TransportEvent::Disconnected);
                        break;
                    }
                }
            }
        }));
        Ok(())
    }
}

#[async_trait]
impl CubeTransport for BtleTransport {
    async fn scan(
        &mut self,
        name_prefix: &str,
        timeout: Duration,
    ) -> Result<Vec<DeviceInfo>, TransportError> {
        let adapter = self.adapter().await?;
        adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| TransportError::Backend(format!("Failed to start BLE scan: {}", e)))?;
        tokio::time::sleep(timeout).await;
        if let Err(e) = adapter.stop_scan().await {
            warn!("Failed to stop BLE scan: {}", e);
        }

        let peripherals = adapter
            .peripherals()
            .await
            .map_err(|e| TransportError::Backend(e.to_string()))?;

        let mut devices = Vec::new();
        for peripheral in peripherals {
            let Ok(Some(properties)) = peripheral.properties().await else {
                continue;
            };
            let Some(name) = properties.local_name else {
                continue;
            };
            if !matches_device_name(&name, name_prefix) {
                continue;
            }

            let address = peripheral.address().to_string();
            debug!("Found {} ({}) at {:?} dB RSSI", name, address, properties.rssi);
            devices.push(DeviceInfo {
                name,
                address: address.clone(),
                rssi: properties.rssi,
            });
            self.discovered.insert(address, peripheral);
        }

        info!("Scan found {} device(s)", devices.len());
        Ok(devices)
    }

    async fn connect(&mut self, device: &DeviceInfo) -> Result<(), TransportError> {
        self.stop_link_tasks();
        let adapter = self.adapter().await?;
        let peripheral = self.find_peripheral(&device.address).await?;

        peripheral
            .connect()
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        if let Err(e) = self.prepare_link(&adapter, &peripheral).await {
            self.stop_link_tasks();
            self.characteristics.clear();
            if let Err(release) = peripheral.disconnect().await {
                warn!("Failed to release half-connected {}: {}", device.name, release);
            }
            return Err(e);
        }

        debug!(
            "Connected to {} with {} characteristics",
            device.name,
            self.characteristics.len()
        );
        self.peripheral = Some(peripheral);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        // Stop the watcher first so a requested disconnect is not reported as link loss
        self.stop_link_tasks();
        self.characteristics.clear();
        if let Some(peripheral) = self.peripheral.take() {
            peripheral
                .disconnect()
                .await
                .map_err(|e| TransportError::Backend(format!("Failed to disconnect: {}", e)))?;
        }
        Ok(())
    }

    async fn read_characteristic(&mut self, uuid: Uuid) -> Result<Vec<u8>, TransportError> {
        let (peripheral, characteristic) = self.characteristic(uuid)?;
        peripheral
            .read(characteristic)
            .await
            .map_err(|e| TransportError::ReadFailed(e.to_string()))
    }

    async fn write_characteristic(
        &mut self,
        uuid: Uuid,
        data: &[u8],
        with_response: bool,
    ) -> Result<(), TransportError> {
        let (peripheral, characteristic) = self.characteristic(uuid)?;
        let write_type = if with_response {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };
        peripheral
            .write(characteristic, data, write_type)
            .await
            .map_err(|e| TransportError::WriteFailed(e.to_string()))
    }

    async fn subscribe(&mut self, uuid: Uuid) -> Result<(), TransportError> {
        let (peripheral, characteristic) = self.characteristic(uuid)?;
        peripheral
            .subscribe(characteristic)
            .await
            .map_err(|e| TransportError::SubscriptionFailed(e.to_string()))
    }

    async fn unsubscribe(&mut self, uuid: Uuid) -> Result<(), TransportError> {
        let (peripheral, characteristic) = self.characteristic(uuid)?;
        peripheral
            .unsubscribe(characteristic)
            .await
            .map_err(|e| TransportError::SubscriptionFailed(e.to_string()))
    }

    fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<TransportEvent>> {
        self.event_rx.take()
    }
}

impl Drop for BtleTransport {
    fn drop(&mut self) {
        self.stop_link_tasks();
    }
}
