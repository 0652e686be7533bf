//! termhook library
//!
//! A raw relay between a serial device and the local terminal. Device output
//! is handed chunk by chunk to a [`LineHandler`] (by default echoed to
//! stdout), Ctrl-C is forwarded to the device as a `0x03` byte instead of
//! killing the process, and local keystrokes can optionally be forwarded to
//! the device with the terminal in raw mode.
//!
//! # Modules
//!
//! - `hook`: the relay (`Hook::run` / `Hook::close`) and its configuration
//! - `handler`: the line-handler contract plus stock handlers
//! - `activity`: signal-forwarding and input-forwarding activities
//! - `signal`: interrupt subscriptions
//! - `terminal`: local input and raw mode
//! - `port`: serial device abstraction, real and mock
//! - `config`: TOML configuration with environment overrides
//! - `logging`: tracing subscriber setup for the binary
//! - `error`: unified error type

pub mod activity;
pub mod config;
pub mod error;
pub mod handler;
pub mod hook;
pub mod logging;
pub mod port;
pub mod signal;
pub mod terminal;

// Re-export commonly used types for convenience
pub use activity::{Activity, CTRL_C};
pub use error::{HandlerError, RelayError, RelayResult};
pub use handler::{ConsoleEcho, LineControl, LineHandler, StopOnPattern};
pub use hook::{Hook, HookConfig, DEFAULT_CHUNK_SIZE, DEFAULT_INPUT_GRACE};
pub use port::{
    DataBits, DeviceOpener, FlowControl, MockSerialPort, Parity, PortConfiguration, PortError,
    SerialDevice, StopBits,
};
pub use signal::{ManualInterrupts, SignalEvent, SignalSource, Subscription};
pub use terminal::{LocalInput, RawModeController};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
