//! Device abstraction layer.
//!
//! Provides the [`SerialDevice`] trait the relay reads from, the
//! `serialport`-backed implementation, a scripted mock, and the shared
//! [`DeviceWriter`] used by every thread that writes to the device.

pub mod error;
pub mod mock;
pub mod sync_port;
pub mod traits;
pub mod writer;

pub use error::PortError;
pub use mock::{MockOpener, MockSerialPort};
pub use sync_port::{SerialPortOpener, SyncSerialPort};
pub use traits::*;
pub use writer::DeviceWriter;
