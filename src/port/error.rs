//! Port-specific error types.
//!
//! Kept apart from [`RelayError`](crate::error::RelayError) so device
//! implementations do not depend on the relay itself.

use thiserror::Error;

/// Errors that can occur while opening or talking to a serial device.
#[derive(Debug, Error)]
pub enum PortError {
    /// The specified serial port was not found on the system.
    #[error("Serial port not found: {0}")]
    NotFound(String),

    /// An I/O error occurred during port operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Port configuration was rejected by the driver.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    /// Create a NotFound error from a port name.
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    /// Create a Config error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether the main loop should simply read again.
    ///
    /// Timeouts, `WouldBlock` and `EINTR` carry no data and are not failures
    /// for a relay that blocks on the device indefinitely.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}
