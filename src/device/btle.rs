use std::sync::{Mutex, PoisonError};
use async_trait::async_trait;
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use btleplug::api::{Central, CentralEvent, CharPropFlags, Characteristic, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::channel::mpsc::channel;
use futures::{future, SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::spawn;
use tokio_util::sync::CancellationToken;

use crate::device::backend::{BleBackend, BleConnection, NotificationStream, ScanStream};
use crate::device::constants::EVENT_CHANNEL_SIZE;
use crate::device::types::{DiscoveredDevice, GattCharacteristic, GattService, ValueRecord};
use crate::error::DeviceError;

// CoreBluetooth hides the hardware address and hands out a stable UUID instead; the other
// platforms expose the address, which is what users copy around.
#[cfg(target_vendor = "apple")]
fn peripheral_key(peripheral: &Peripheral) -> String {
    peripheral.id().to_string()
}

#[cfg(not(target_vendor = "apple"))]
fn peripheral_key(peripheral: &Peripheral) -> String {
    peripheral.address().to_string()
}

async fn select_adapter(manager: &Manager, filter: Option<&str>) -> Result<Adapter, DeviceError> {
    let adapters = manager.adapters().await?;

    for adapter in &adapters {
        let adapter_info = adapter.adapter_info().await.unwrap_or("UNKNOWN".to_string());

        match filter {
            Some(filter) if !adapter_info.contains(filter) => {
                debug!("Skipping adapter {}", adapter_info);
            },
            _ => {
                info!("Using adapter {}", adapter_info);
                return Ok(adapter.clone());
            },
        }
    }

    Err(DeviceError::NoAdapter)
}

async fn describe_peripheral(adapter: &Adapter, id: &PeripheralId) -> Result<DiscoveredDevice, DeviceError> {
    let peripheral = adapter.peripheral(id).await?;
    let properties = peripheral.properties().await?;

    Ok(DiscoveredDevice {
        id: peripheral_key(&peripheral),
        name: properties.and_then(|properties| properties.local_name),
    })
}

async fn find_peripheral(adapter: &Adapter, id: &str) -> Result<Peripheral, DeviceError> {
    let peripherals = adapter.peripherals().await?;

    peripherals
        .into_iter()
        .find(|peripheral| peripheral_key(peripheral).eq_ignore_ascii_case(id))
        .ok_or_else(|| DeviceError::UnknownPeripheral { id: id.to_string() })
}

struct Bluetooth {
    manager: Manager,
    adapter: Adapter,
}

/// Bluetooth access through btleplug. One instance owns the platform manager for the whole
/// process.
pub struct BtleBackend {
    // taken by release()
    bluetooth: Mutex<Option<Bluetooth>>,
    released: CancellationToken,
}

impl BtleBackend {
    pub async fn new(adapter_filter: Option<&str>) -> Result<Self, DeviceError> {
        let manager = Manager::new().await?;
        let adapter = select_adapter(&manager, adapter_filter).await?;

        Ok(BtleBackend {
            bluetooth: Mutex::new(Some(Bluetooth { manager, adapter })),
            released: CancellationToken::new(),
        })
    }

    fn adapter(&self) -> Result<Adapter, DeviceError> {
        let bluetooth = self.bluetooth.lock().unwrap_or_else(PoisonError::into_inner);
        bluetooth
            .as_ref()
            .map(|bluetooth| bluetooth.adapter.clone())
            .ok_or(DeviceError::Released)
    }
}

#[async_trait]
impl BleBackend for BtleBackend {
    type Connection = BtleConnection;

    async fn start_scan(&self) -> Result<ScanStream, DeviceError> {
        let adapter = self.adapter()?;
        let cancel = self.released.clone();
        let mut events = adapter.events().await?;

        adapter.start_scan(ScanFilter::default()).await?;

        let (mut sender, receiver) = channel(EVENT_CHANNEL_SIZE);

        spawn(async move {
            'mainloop: loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        break 'mainloop;
                    },
                    event = events.next() => match event {
                        Some(CentralEvent::DeviceDiscovered(id)) | Some(CentralEvent::DeviceUpdated(id)) => {
                            match describe_peripheral(&adapter, &id).await {
                                Ok(device) => {
                                    if sender.send(Ok(device)).await.is_err() {
                                        // the scan session is over
                                        break 'mainloop;
                                    }
                                },
                                Err(err) => warn!("Could not query peripheral {:?}: {}", id, err),
                            }
                        },
                        Some(_) => {},
                        None => {
                            let _ = sender.send(Err(DeviceError::ScanInterrupted)).await;
                            break 'mainloop;
                        },
                    },
                }
            }
            debug!("Scan event forwarding stopped");
        });

        Ok(receiver.boxed())
    }

    async fn stop_scan(&self) -> Result<(), DeviceError> {
        self.adapter()?.stop_scan().await?;
        Ok(())
    }

    async fn connect(&self, id: &str) -> Result<BtleConnection, DeviceError> {
        let adapter = self.adapter()?;
        let peripheral = find_peripheral(&adapter, id).await?;

        info!("Connecting to peripheral {}...", id);
        peripheral.connect().await?;

        Ok(BtleConnection {
            id: peripheral_key(&peripheral),
            peripheral,
            released: self.released.clone(),
        })
    }

    async fn release(&self) {
        // ends scan forwarding and notification streams, which drops their adapter and
        // peripheral handles
        self.released.cancel();

        let bluetooth = self.bluetooth.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(Bluetooth { manager, adapter }) = bluetooth else {
            debug!("Bluetooth already released");
            return;
        };

        if let Err(err) = adapter.stop_scan().await {
            debug!("Stopping scan during release failed: {}", err);
        }

        drop(adapter);
        drop(manager);
        info!("Bluetooth adapter and manager released");
    }
}

pub struct BtleConnection {
    id: String,
    peripheral: Peripheral,
    released: CancellationToken,
}

impl BtleConnection {
    fn find_characteristic(&self, wanted: &GattCharacteristic) -> Option<Characteristic> {
        self.peripheral
            .services()
            .into_iter()
            .flat_map(|service| service.characteristics.into_iter())
            .find(|characteristic| {
                characteristic.uuid == wanted.uuid && characteristic.service_uuid == wanted.service_uuid
            })
    }
}

#[async_trait]
impl BleConnection for BtleConnection {
    fn id(&self) -> String {
        self.id.clone()
    }

    async fn discover_services(&self) -> Result<(), DeviceError> {
        info!("Connected; Discovering services...");
        self.peripheral.discover_services().await?;
        Ok(())
    }

    fn services(&self) -> Vec<GattService> {
        self.peripheral
            .services()
            .into_iter()
            .map(|service| GattService {
                uuid: service.uuid,
                characteristics: service.characteristics
                    .iter()
                    .map(|characteristic| GattCharacteristic {
                        uuid: characteristic.uuid,
                        service_uuid: characteristic.service_uuid,
                        is_notifiable: characteristic.properties.contains(CharPropFlags::NOTIFY),
                    })
                    .collect(),
            })
            .collect()
    }

    async fn monitor(&self, wanted: &GattCharacteristic) -> Result<NotificationStream, DeviceError> {
        let characteristic = self.find_characteristic(wanted)
            .ok_or(DeviceError::UnknownCharacteristic { uuid: wanted.uuid })?;

        // obtain the stream before subscribing, so that the first value is not missed
        let notifications = self.peripheral.notifications().await?;
        self.peripheral.subscribe(&characteristic).await?;

        let uuid = characteristic.uuid;
        let stream = notifications
            .filter(move |notification| future::ready(notification.uuid == uuid))
            .map(|notification| {
                let value = if notification.value.is_empty() {
                    None
                } else {
                    Some(BASE64_STANDARD.encode(&notification.value))
                };

                Ok(ValueRecord { characteristic: notification.uuid, value })
            })
            .take_until(self.released.clone().cancelled_owned());

        Ok(stream.boxed())
    }
}
