use std::time::Duration;
use uuid::Uuid;

/// Failures of the wireless side of a session.
///
/// Key filtering (unknown keys, repeated presses) never produces an error.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("device {address} not found within {timeout:?}")]
    ConnectionTimeout { address: String, timeout: Duration },

    #[error("device {0} not found")]
    DeviceNotFound(String),

    #[error("characteristic {0} not found on device")]
    CharacteristicNotFound(Uuid),

    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("dispatcher is disconnected")]
    NotConnected,

    #[error("bluetooth adapter unavailable: {0}")]
    Adapter(String),

    #[error("keyboard input unavailable: {0}")]
    Input(String),

    #[error("connect to {0} cancelled")]
    Cancelled(String),
}

impl ControlError {
    /// Whether the outer loop should start a fresh session after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Adapter(_) | Self::Input(_) | Self::Cancelled(_))
    }
}
