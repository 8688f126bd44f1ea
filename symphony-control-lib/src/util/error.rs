use std::io;
use std::time::Duration;

/// Errors surfaced by the controller transport.
///
/// Every request made through [`crate::control_interface::ControlInterface`]
/// resolves to exactly one of these (or success). Nothing here is retried by
/// the library.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// Area number outside the range the controller accepts.
    #[error("Area number {area} is invalid, must be between 1 and {max}")]
    InvalidArea { area: u8, max: u8 },

    /// Intensity level outside the range the controller accepts.
    #[error("Intensity value {intensity} is invalid, must be between 1 and {max}")]
    InvalidIntensity { intensity: u8, max: u8 },

    /// No controller answered the discovery probe in time.
    #[error("controller discovery timed out after {0:?}")]
    DiscoveryTimeout(Duration),

    /// Socket failure while discovering the controller.
    #[error("controller discovery failed: {0}")]
    DiscoverySocket(#[source] io::Error),

    /// Socket failure while sending a command datagram.
    #[error("failed to send command: {0}")]
    Send(#[source] io::Error),

    /// The dispatcher worker is no longer running.
    #[error("command queue closed")]
    QueueClosed,
}

impl ControlError {
    /// True for parameter validation failures, which never reach the network.
    pub fn is_invalid_parameter(&self) -> bool {
        matches!(
            self,
            ControlError::InvalidArea { .. } | ControlError::InvalidIntensity { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ControlError>;
