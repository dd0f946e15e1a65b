//! btleplug-backed implementation of the BLE capability seam.

use super::client::{BleCentral, BleConnection, BleError, NotificationStream};
use super::protocol::CharacteristicId;
use btleplug::api::{Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub struct BtleplugCentral {
    adapter: Adapter,
}

impl BtleplugCentral {
    /// Grab the first Bluetooth adapter on the host.
    pub async fn new() -> Result<Self, BleError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(BleError::NoAdapter)?;
        Ok(Self { adapter })
    }
}

impl BleCentral for BtleplugCentral {
    type Device = Peripheral;
    type Connection = BtleplugConnection;

    async fn find_by_name(
        &self,
        name: &str,
        timeout: Duration,
    ) -> Result<Option<Peripheral>, BleError> {
        let mut events = self.adapter.events().await?;
        self.adapter.start_scan(ScanFilter::default()).await?;
        info!("scanning for '{name}'");

        let found = tokio::time::timeout(timeout, async {
            while let Some(event) = events.next().await {
                let id = match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                    _ => continue,
                };
                let Ok(peripheral) = self.adapter.peripheral(&id).await else {
                    continue;
                };
                let local_name = peripheral
                    .properties()
                    .await
                    .ok()
                    .flatten()
                    .and_then(|p| p.local_name);
                match local_name {
                    Some(n) if n == name => return Some(peripheral),
                    Some(n) => debug!("ignoring advertisement from '{n}'"),
                    None => {}
                }
            }
            None
        })
        .await
        .unwrap_or(None);

        if let Err(e) = self.adapter.stop_scan().await {
            warn!("failed to stop scan: {e}");
        }
        Ok(found)
    }

    async fn connect(&self, device: Peripheral) -> Result<BtleplugConnection, BleError> {
        device.connect().await?;
        device.discover_services().await?;
        Ok(BtleplugConnection { peripheral: device })
    }
}

pub struct BtleplugConnection {
    peripheral: Peripheral,
}

impl BtleplugConnection {
    fn characteristic(&self, id: CharacteristicId) -> Result<Characteristic, BleError> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == id.uuid)
            .ok_or(BleError::MissingCharacteristic(id.handle))
    }
}

impl BleConnection for BtleplugConnection {
    async fn read_characteristic(&self, id: CharacteristicId) -> Result<Vec<u8>, BleError> {
        let characteristic = self.characteristic(id)?;
        Ok(self.peripheral.read(&characteristic).await?)
    }

    async fn subscribe(&mut self, id: CharacteristicId) -> Result<NotificationStream, BleError> {
        let characteristic = self.characteristic(id)?;
        self.peripheral.subscribe(&characteristic).await?;

        let mut notifications = self.peripheral.notifications().await?;
        let (tx, rx) = mpsc::unbounded_channel();
        let uuid = id.uuid;
        tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                if notification.uuid != uuid {
                    continue;
                }
                if tx.send(notification.value).is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }

    async fn unsubscribe(&mut self, id: CharacteristicId) -> Result<(), BleError> {
        let characteristic = self.characteristic(id)?;
        Ok(self.peripheral.unsubscribe(&characteristic).await?)
    }

    async fn disconnect(&mut self) -> Result<(), BleError> {
        Ok(self.peripheral.disconnect().await?)
    }
}
