use crate::activity::Activity;
use crate::config::ConfigError;
use crate::port::PortError;
use std::io;
use thiserror::Error;

/// Error type returned by [`LineHandler`](crate::handler::LineHandler)s.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A specialized `Result` type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;

/// Unified error type for the relay.
///
/// Device, handler and local-input failures are kept apart so the log line
/// and the caller can tell an I/O problem from a failure in user code.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The device could not be acquired. Nothing was started.
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: PortError,
    },

    /// `run` was called while a device from a previous run is still held.
    #[error("device is already open; close the hook before running it again")]
    AlreadyOpen,

    /// A write handle onto the device could not be obtained.
    #[error("failed to obtain a device writer: {0}")]
    Writer(#[source] PortError),

    /// Reading from the device failed in the main loop.
    #[error("device read failed: {0}")]
    Read(#[source] PortError),

    /// The device returned end-of-stream.
    #[error("device {port} disconnected")]
    Disconnected { port: String },

    /// The line handler returned an error.
    #[error("line handler failed: {0}")]
    Handler(#[source] HandlerError),

    /// The local terminal could not be switched to raw mode.
    #[error("failed to put local terminal in raw mode: {0}")]
    RawMode(#[source] io::Error),

    /// Reading local input failed.
    #[error("local input read failed: {0}")]
    InputRead(#[source] io::Error),

    /// A forwarding activity could not write to the device.
    #[error("device write failed: {0}")]
    DeviceWrite(#[source] io::Error),

    /// Subscribing to process signals failed.
    #[error("failed to subscribe to interrupt signals: {0}")]
    Signal(#[source] io::Error),

    /// Releasing the device failed.
    #[error("failed to close {port}: {source}")]
    Close {
        port: String,
        #[source]
        source: PortError,
    },

    /// A forwarding activity could not be started.
    #[error("failed to start {activity} activity: {source}")]
    Spawn {
        activity: Activity,
        #[source]
        source: io::Error,
    },

    /// A forwarding activity panicked.
    #[error("{0} activity panicked")]
    ActivityPanicked(Activity),

    /// Configuration was invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RelayError {
    /// Whether the error came out of user code rather than I/O.
    pub fn is_handler_error(&self) -> bool {
        matches!(self, Self::Handler(_))
    }
}
