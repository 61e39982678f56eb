//! Romi BLE Protocol
//!
//! UUIDs exposed by the robot firmware and the address forms accepted on the
//! command line.

use btleplug::api::BDAddr;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Romi service UUID
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x85e43f4d_b4a7_4c6f_ba86_2db3c40a2c83);

/// Drive characteristic - receives the 4-byte direction frame
pub const DRIVE_CHAR_UUID: Uuid = Uuid::from_u128(0x85e47182_b4a7_4c6f_ba86_2db3c40a2c83);

const MAC_LEN: usize = 17;
const UUID_LEN: usize = 36;

#[derive(Debug, thiserror::Error)]
#[error("invalid address {0:?}, expected XX:XX:XX:XX:XX:XX or a 36-character peripheral UUID")]
pub struct InvalidAddress(pub String);

/// A validated, lower-cased device address.
///
/// Linux and Windows identify peripherals by MAC address. CoreBluetooth
/// hides the MAC and hands out a per-host UUID instead, so both forms are
/// accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceAddress {
    Mac(String),
    PeripheralUuid(String),
}

impl DeviceAddress {
    pub fn parse(input: &str) -> Result<Self, InvalidAddress> {
        let lowered = input.trim().to_lowercase();
        match lowered.len() {
            MAC_LEN if BDAddr::from_str(&lowered).is_ok() && lowered.contains(':') => {
                Ok(Self::Mac(lowered))
            }
            UUID_LEN if Uuid::parse_str(&lowered).is_ok() => Ok(Self::PeripheralUuid(lowered)),
            _ => Err(InvalidAddress(input.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Mac(s) | Self::PeripheralUuid(s) => s,
        }
    }

    /// Whether a discovered peripheral is the one we are looking for.
    ///
    /// `id_debug` is the platform peripheral id rendered with `{:?}`, which
    /// carries the UUID on macOS.
    pub fn matches(&self, address: BDAddr, id_debug: &str) -> bool {
        match self {
            Self::Mac(mac) => address.to_string().eq_ignore_ascii_case(mac),
            Self::PeripheralUuid(uuid) => id_debug.to_lowercase().contains(uuid.as_str()),
        }
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
