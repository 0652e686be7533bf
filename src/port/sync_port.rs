//! Serial device backed by the `serialport` crate.
//!
//! On Unix `serialport` configures the tty in raw mode when it opens it, so
//! no extra termios work is needed on the device side.

use super::error::PortError;
use super::traits::{DeviceOpener, PortConfiguration, SerialDevice};
use std::io::{Read, Write};
use tracing::debug;

/// Blocking serial port wrapping `serialport::SerialPort`.
pub struct SyncSerialPort {
    port: Box<dyn serialport::SerialPort>,
    name: String,
}

impl SyncSerialPort {
    /// Open a serial port with the given line parameters.
    ///
    /// # Example
    /// ```no_run
    /// use termhook::port::{PortConfiguration, SyncSerialPort};
    ///
    /// let port = SyncSerialPort::open("/dev/ttyUSB0", &PortConfiguration::with_baud(115_200))?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(port_name: &str, config: &PortConfiguration) -> Result<Self, PortError> {
        let port = serialport::new(port_name, config.baud_rate)
            .data_bits(config.data_bits.into())
            .flow_control(config.flow_control.into())
            .parity(config.parity.into())
            .stop_bits(config.stop_bits.into())
            .timeout(config.read_timeout)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => PortError::not_found(port_name),
                serialport::ErrorKind::InvalidInput => PortError::config(e.to_string()),
                serialport::ErrorKind::Io(kind) if kind == std::io::ErrorKind::NotFound => {
                    PortError::not_found(port_name)
                }
                _ => PortError::Serial(e),
            })?;

        debug!(port = port_name, baud = config.baud_rate, "serial port opened");
        Ok(Self {
            port,
            name: port_name.to_string(),
        })
    }
}

impl SerialDevice for SyncSerialPort {
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        self.port.read(buffer).map_err(PortError::Io)
    }

    fn writer(&self) -> Result<Box<dyn Write + Send>, PortError> {
        let clone = self.port.try_clone().map_err(PortError::Serial)?;
        Ok(Box::new(clone))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn close(&mut self) -> Result<(), PortError> {
        // The fd itself is released when the box drops; push out anything the
        // driver still holds first.
        self.port.flush().map_err(PortError::Io)
    }
}

impl std::fmt::Debug for SyncSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSerialPort")
            .field("name", &self.name)
            .field("baud_rate", &self.port.baud_rate().ok())
            .finish()
    }
}

/// The production [`DeviceOpener`]: real serial ports through `serialport`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialPortOpener;

impl DeviceOpener for SerialPortOpener {
    fn open(
        &self,
        port: &str,
        config: &PortConfiguration,
    ) -> Result<Box<dyn SerialDevice>, PortError> {
        Ok(Box::new(SyncSerialPort::open(port, config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_not_found_error() {
        let result = SyncSerialPort::open(
            "/dev/nonexistent_port_12345",
            &PortConfiguration::default(),
        );

        match result {
            Err(PortError::NotFound(name)) => assert!(name.contains("nonexistent")),
            Err(PortError::Serial(_)) => {}
            Err(e) => panic!("Expected NotFound error, got: {:?}", e),
            Ok(_) => panic!("opening a nonexistent port succeeded"),
        }
    }

    #[test]
    fn test_opener_reports_open_failure() {
        let result = SerialPortOpener.open("/dev/nonexistent_port_12345", &PortConfiguration::default());
        assert!(result.is_err());
    }
}
