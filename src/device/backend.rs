use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::device::types::{DiscoveredDevice, GattCharacteristic, GattService, ValueRecord};
use crate::error::DeviceError;

/// Every advertisement seen while scanning, duplicates included.
pub type ScanStream = BoxStream<'static, Result<DiscoveredDevice, DeviceError>>;

/// Value changes of one characteristic. An `Err` item is a failed delivery, the stream goes on.
pub type NotificationStream = BoxStream<'static, Result<ValueRecord, DeviceError>>;

/// The platform BLE capability the session is driven through.
#[async_trait]
pub trait BleBackend: Send + Sync + 'static {
    type Connection: BleConnection;

    /// Starts an unfiltered discovery.
    async fn start_scan(&self) -> Result<ScanStream, DeviceError>;

    async fn stop_scan(&self) -> Result<(), DeviceError>;

    async fn connect(&self, id: &str) -> Result<Self::Connection, DeviceError>;

    /// Frees the radio; the backend must not be used afterwards.
    async fn release(&self);
}

#[async_trait]
pub trait BleConnection: Send + Sync + 'static {
    fn id(&self) -> String;

    async fn discover_services(&self) -> Result<(), DeviceError>;

    /// Services found by the last `discover_services` call.
    fn services(&self) -> Vec<GattService>;

    async fn monitor(&self, characteristic: &GattCharacteristic) -> Result<NotificationStream, DeviceError>;
}
