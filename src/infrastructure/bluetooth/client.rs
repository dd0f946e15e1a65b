//! Capability seam over the platform BLE stack.
//!
//! The session driver only ever talks to these traits. In production they
//! are backed by btleplug ([`super::adapter`]); the session tests drive
//! the same seam with a scripted fake.

use super::protocol::CharacteristicId;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Raw notification payloads, delivered in arrival order to a single
/// consumer.
pub type NotificationStream = mpsc::UnboundedReceiver<Vec<u8>>;

#[derive(Debug, Error)]
pub enum BleError {
    #[error("no usable Bluetooth adapter")]
    NoAdapter,
    #[error("characteristic with handle {0} not present on the device")]
    MissingCharacteristic(u16),
    #[error(transparent)]
    Backend(#[from] btleplug::Error),
}

/// Device discovery and connection establishment.
#[allow(async_fn_in_trait)]
pub trait BleCentral {
    type Device;
    type Connection: BleConnection;

    /// Scan until a device advertising `name` shows up, or `timeout`
    /// elapses.
    async fn find_by_name(
        &self,
        name: &str,
        timeout: Duration,
    ) -> Result<Option<Self::Device>, BleError>;

    async fn connect(&self, device: Self::Device) -> Result<Self::Connection, BleError>;
}

/// An established connection. Owned exclusively by the session for its
/// lifetime.
#[allow(async_fn_in_trait)]
pub trait BleConnection {
    async fn read_characteristic(&self, id: CharacteristicId) -> Result<Vec<u8>, BleError>;

    /// Subscribe to notifications on `id`. Payloads are pushed into the
    /// returned channel as they arrive.
    async fn subscribe(&mut self, id: CharacteristicId) -> Result<NotificationStream, BleError>;

    async fn unsubscribe(&mut self, id: CharacteristicId) -> Result<(), BleError>;

    async fn disconnect(&mut self) -> Result<(), BleError>;
}
