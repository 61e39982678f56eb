//! Boundary to the wireless collaborator.
//!
//! The dispatcher only talks to these traits; `infrastructure::bluetooth`
//! provides the btleplug implementation and tests provide fakes.

use crate::domain::errors::ControlError;
use crate::domain::settings::Settings;
use crate::infrastructure::bluetooth::protocol::DeviceAddress;
use crate::session::Interrupt;
use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

/// Everything needed to open a drive session with one robot.
#[derive(Debug, Clone)]
pub struct ConnectTarget {
    pub address: DeviceAddress,
    pub timeout: Duration,
    pub service: Uuid,
    pub drive_characteristic: Uuid,
    pub write_with_response: bool,
}

impl ConnectTarget {
    pub fn from_settings(address: DeviceAddress, settings: &Settings) -> anyhow::Result<Self> {
        Ok(Self {
            address,
            timeout: settings.connect_timeout(),
            service: Uuid::parse_str(&settings.ble_service_uuid)?,
            drive_characteristic: Uuid::parse_str(&settings.ble_drive_char_uuid)?,
            write_with_response: settings.write_with_response,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
pub trait DriveTransport: Send + Sync {
    /// Find and connect to the target. Fails with `ConnectionTimeout` or
    /// `DeviceNotFound` when the robot is not around.
    ///
    /// Once `interrupt` fires the attempt stops with `Cancelled`, after the
    /// scan is stopped and any half-made connection is torn down.
    async fn connect(
        &self,
        target: &ConnectTarget,
        interrupt: &Interrupt,
    ) -> Result<Box<dyn DriveLink>, ControlError>;
}

/// An open session with the robot.
#[async_trait]
pub trait DriveLink: Send + Sync {
    async fn write_characteristic(
        &self,
        characteristic: Uuid,
        bytes: &[u8],
    ) -> Result<(), ControlError>;

    /// Safe to call more than once.
    async fn disconnect(&self) -> Result<(), ControlError>;
}
