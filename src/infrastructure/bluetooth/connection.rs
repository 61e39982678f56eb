//! BLE Connection Module
//!
//! Connects to the robot, checks the drive characteristic is there and
//! exposes the session as a [`DriveLink`].

use crate::domain::errors::ControlError;
use crate::infrastructure::bluetooth::scanner::BleScanner;
use crate::session::Interrupt;
use crate::transport::{ConnectTarget, DriveLink, DriveTransport};
use async_trait::async_trait;
use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Map btleplug failures that happen once a session is up.
fn session_error(e: btleplug::Error) -> ControlError {
    match e {
        btleplug::Error::PermissionDenied => ControlError::Adapter(e.to_string()),
        btleplug::Error::DeviceNotFound => ControlError::ConnectionLost("device went away".into()),
        btleplug::Error::NotConnected => ControlError::ConnectionLost("not connected".into()),
        other => ControlError::ConnectionLost(other.to_string()),
    }
}

/// btleplug-backed transport on the first local adapter.
pub struct BleTransport {
    scanner: BleScanner,
}

impl BleTransport {
    pub async fn new() -> Result<Self, ControlError> {
        Ok(Self {
            scanner: BleScanner::first_adapter().await?,
        })
    }

    async fn open(
        &self,
        peripheral: &Peripheral,
        target: &ConnectTarget,
    ) -> Result<Characteristic, ControlError> {
        peripheral.discover_services().await.map_err(session_error)?;

        if !peripheral.services().iter().any(|s| s.uuid == target.service) {
            warn!(
                "Service {} not reported by {}, looking for the drive characteristic anyway",
                target.service, target.address
            );
        }

        let drive = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == target.drive_characteristic)
            .ok_or(ControlError::CharacteristicNotFound(
                target.drive_characteristic,
            ))?;
        info!("Found drive characteristic");
        Ok(drive)
    }
}

#[async_trait]
impl DriveTransport for BleTransport {
    async fn connect(
        &self,
        target: &ConnectTarget,
        interrupt: &Interrupt,
    ) -> Result<Box<dyn DriveLink>, ControlError> {
        let started = Instant::now();
        let peripheral = self
            .scanner
            .find(&target.address, target.timeout, interrupt)
            .await?;

        let remaining = target.timeout.saturating_sub(started.elapsed());
        let setup = async {
            match tokio::time::timeout(remaining, peripheral.connect()).await {
                Ok(Ok(())) => {}
                Ok(Err(btleplug::Error::DeviceNotFound)) => {
                    return Err(ControlError::DeviceNotFound(target.address.to_string()));
                }
                Ok(Err(e)) => return Err(session_error(e)),
                Err(_) => {
                    return Err(ControlError::ConnectionTimeout {
                        address: target.address.to_string(),
                        timeout: target.timeout,
                    });
                }
            }
            self.open(&peripheral, target).await
        };

        let outcome = tokio::select! {
            outcome = setup => outcome,
            _ = interrupt.wait() => Err(ControlError::Cancelled(target.address.to_string())),
        };

        let drive = match outcome {
            Ok(drive) => drive,
            Err(e) => {
                // The connect may be pending or half done; never leave it open.
                if let Err(disconnect_err) = peripheral.disconnect().await {
                    debug!("Disconnect after failed setup: {}", disconnect_err);
                }
                return Err(e);
            }
        };

        let write_type = if target.write_with_response {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };

        Ok(Box::new(BleLink {
            peripheral,
            drive,
            write_type,
            disconnected: AtomicBool::new(false),
        }))
    }
}

pub struct BleLink {
    peripheral: Peripheral,
    drive: Characteristic,
    write_type: WriteType,
    disconnected: AtomicBool,
}

impl BleLink {
    fn characteristic(&self, uuid: Uuid) -> Result<Characteristic, ControlError> {
        if uuid == self.drive.uuid {
            return Ok(self.drive.clone());
        }
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or(ControlError::CharacteristicNotFound(uuid))
    }
}

#[async_trait]
impl DriveLink for BleLink {
    async fn write_characteristic(
        &self,
        characteristic: Uuid,
        bytes: &[u8],
    ) -> Result<(), ControlError> {
        if self.disconnected.load(Ordering::Acquire) {
            return Err(ControlError::NotConnected);
        }
        let characteristic = self.characteristic(characteristic)?;
        self.peripheral
            .write(&characteristic, bytes, self.write_type)
            .await
            .map_err(session_error)
    }

    async fn disconnect(&self) -> Result<(), ControlError> {
        if self.disconnected.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.peripheral.disconnect().await.map_err(session_error)
    }
}
