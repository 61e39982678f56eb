//! BLE Scanner Module
//!
//! Finds the robot by address on the first available adapter.

use crate::domain::errors::ControlError;
use crate::infrastructure::bluetooth::protocol::DeviceAddress;
use crate::session::Interrupt;
use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::StreamExt;
use std::time::Duration;
use tracing::{debug, info};

pub struct BleScanner {
    adapter: Adapter,
}

impl BleScanner {
    /// Use the first Bluetooth adapter the platform reports.
    pub async fn first_adapter() -> Result<Self, ControlError> {
        let manager = Manager::new()
            .await
            .map_err(|e| ControlError::Adapter(e.to_string()))?;
        let adapter = manager
            .adapters()
            .await
            .map_err(|e| ControlError::Adapter(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| ControlError::Adapter("no Bluetooth adapters found".to_string()))?;

        if let Ok(info) = adapter.adapter_info().await {
            info!("Using Bluetooth adapter: {}", info);
        }
        Ok(Self { adapter })
    }

    /// Scan until `address` shows up, `timeout` elapses or `interrupt` fires.
    /// The scan is stopped on every path.
    pub async fn find(
        &self,
        address: &DeviceAddress,
        timeout: Duration,
        interrupt: &Interrupt,
    ) -> Result<Peripheral, ControlError> {
        info!("Starting BLE scan for {}", address);
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| ControlError::Adapter(e.to_string()))?;

        let result = tokio::select! {
            found = tokio::time::timeout(timeout, self.wait_for(address)) => match found {
                Ok(found) => found,
                Err(_) => Err(ControlError::ConnectionTimeout {
                    address: address.to_string(),
                    timeout,
                }),
            },
            _ = interrupt.wait() => Err(ControlError::Cancelled(address.to_string())),
        };

        if let Err(e) = self.adapter.stop_scan().await {
            debug!("Failed to stop scan: {}", e);
        }
        result
    }

    async fn wait_for(&self, address: &DeviceAddress) -> Result<Peripheral, ControlError> {
        // Subscribe before listing so a discovery between the two is not missed.
        let mut events = self
            .adapter
            .events()
            .await
            .map_err(|e| ControlError::Adapter(e.to_string()))?;

        if let Some(peripheral) = self.known_peripheral(address).await {
            return Ok(peripheral);
        }

        while let Some(event) = events.next().await {
            if let CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) = event {
                let Ok(peripheral) = self.adapter.peripheral(&id).await else {
                    continue;
                };
                if address.matches(peripheral.address(), &format!("{:?}", id)) {
                    debug!("Found {} via discovery event", address);
                    return Ok(peripheral);
                }
            }
        }

        Err(ControlError::DeviceNotFound(address.to_string()))
    }

    async fn known_peripheral(&self, address: &DeviceAddress) -> Option<Peripheral> {
        let peripherals = self.adapter.peripherals().await.ok()?;
        peripherals
            .into_iter()
            .find(|p| address.matches(p.address(), &format!("{:?}", p.id())))
    }
}
