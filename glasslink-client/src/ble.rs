//! Bluetooth LE transport on top of btleplug.
//!
//! Lenses expose the Nordic UART service: frames are written to the TX
//! characteristic and responses arrive as notifications on RX.

use async_trait::async_trait;
use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use glasslink_core::transport::{Advertisement, Transport, TransportError};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Characteristic frames are written to
pub const UART_TX_UUID: Uuid = Uuid::from_u128(0x6E400002_B5A3_F393_E0A9_E50E24DCCA9E);

/// Characteristic notifications arrive on
pub const UART_RX_UUID: Uuid = Uuid::from_u128(0x6E400003_B5A3_F393_E0A9_E50E24DCCA9E);

const NOTIFICATION_QUEUE: usize = 32;

fn backend(e: btleplug::Error) -> TransportError {
    TransportError::Backend(Box::new(e))
}

/// Transport using the first Bluetooth adapter of the host
pub struct BleTransport {
    adapter: Adapter,
    scanning: AtomicBool,
}

impl BleTransport {
    /// Open the first adapter.
    pub async fn new() -> Result<Self, TransportError> {
        let manager = Manager::new().await.map_err(backend)?;
        let adapter = manager
            .adapters()
            .await
            .map_err(backend)?
            .into_iter()
            .next()
            .ok_or(TransportError::NoAdapter)?;
        if let Ok(info) = adapter.adapter_info().await {
            info!("Using Bluetooth adapter {info}");
        }
        Ok(Self {
            adapter,
            scanning: AtomicBool::new(false),
        })
    }

    fn characteristic(
        peripheral: &Peripheral,
        uuid: Uuid,
    ) -> Result<Characteristic, TransportError> {
        peripheral
            .characteristics()
            .into_iter()
            .find(|ch| ch.uuid == uuid)
            .ok_or_else(|| TransportError::MissingCharacteristic(uuid.to_string()))
    }
}

#[async_trait]
impl Transport for BleTransport {
    type Handle = Peripheral;

    async fn scan(&self) -> Result<Vec<Advertisement<Peripheral>>, TransportError> {
        if !self.scanning.swap(true, Ordering::AcqRel) {
            debug!("Starting BLE scan");
            if let Err(e) = self.adapter.start_scan(ScanFilter::default()).await {
                self.scanning.store(false, Ordering::Release);
                return Err(backend(e));
            }
        }

        let mut found = Vec::new();
        for peripheral in self.adapter.peripherals().await.map_err(backend)? {
            let name = match peripheral.properties().await {
                Ok(Some(props)) => props.local_name,
                Ok(None) => None,
                Err(e) => {
                    debug!("Skipping peripheral: {e}");
                    None
                }
            };
            if let Some(name) = name {
                found.push(Advertisement {
                    name,
                    handle: peripheral,
                });
            }
        }
        Ok(found)
    }

    async fn connect(&self, peripheral: &Peripheral) -> Result<(), TransportError> {
        if self.scanning.swap(false, Ordering::AcqRel) {
            if let Err(e) = self.adapter.stop_scan().await {
                warn!("Failed to stop scan: {e}");
            }
        }
        if !peripheral.is_connected().await.map_err(backend)? {
            peripheral.connect().await.map_err(backend)?;
        }
        peripheral.discover_services().await.map_err(backend)?;
        Ok(())
    }

    async fn disconnect(&self, peripheral: &Peripheral) -> Result<(), TransportError> {
        peripheral.disconnect().await.map_err(backend)
    }

    async fn write(&self, peripheral: &Peripheral, data: &[u8]) -> Result<(), TransportError> {
        let tx = Self::characteristic(peripheral, UART_TX_UUID)?;
        peripheral
            .write(&tx, data, WriteType::WithoutResponse)
            .await
            .map_err(backend)
    }

    async fn subscribe(
        &self,
        peripheral: &Peripheral,
    ) -> Result<mpsc::Receiver<Vec<u8>>, TransportError> {
        let rx_char = Self::characteristic(peripheral, UART_RX_UUID)?;
        peripheral.subscribe(&rx_char).await.map_err(backend)?;
        let mut stream = peripheral.notifications().await.map_err(backend)?;

        let (tx, rx) = mpsc::channel(NOTIFICATION_QUEUE);
        tokio::spawn(async move {
            while let Some(notification) = stream.next().await {
                if notification.uuid != UART_RX_UUID {
                    continue;
                }
                if tx.send(notification.value).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}
