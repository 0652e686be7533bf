//! Core traits for the device side of the relay.
//!
//! [`SerialDevice`] is the blocking byte stream the main loop reads from, and
//! [`DeviceOpener`] is how a [`Hook`](crate::Hook) acquires one. Both real
//! serial ports and the mock implementation plug in here.

use super::error::PortError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::time::Duration;

/// Line parameters for a serial device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortConfiguration {
    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Number of data bits (5, 6, 7, or 8).
    pub data_bits: DataBits,

    /// Flow control mode.
    pub flow_control: FlowControl,

    /// Parity checking mode.
    pub parity: Parity,

    /// Number of stop bits.
    pub stop_bits: StopBits,

    /// How long a single read may block before it reports a timeout.
    ///
    /// The relay retries timed-out reads, so this only bounds how often the
    /// main loop wakes up while the device is silent.
    pub read_timeout: Duration,
}

impl PortConfiguration {
    /// 8N1, no flow control, at the given speed.
    pub fn with_baud(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            ..Self::default()
        }
    }
}

impl Default for PortConfiguration {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            data_bits: DataBits::Eight,
            flow_control: FlowControl::None,
            parity: Parity::None,
            stop_bits: StopBits::One,
            read_timeout: Duration::from_secs(1),
        }
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    #[default]
    Eight,
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

/// Flow control modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControl {
    #[default]
    None,
    Software,
    Hardware,
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::Software => serialport::FlowControl::Software,
            FlowControl::Hardware => serialport::FlowControl::Hardware,
        }
    }
}

/// Parity checking modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopBits {
    #[default]
    One,
    Two,
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// An open, raw-mode serial device.
///
/// Reads happen on the owning handle from a single thread. Writes go through
/// an independent handle obtained from [`SerialDevice::writer`] so that a
/// blocked read never holds up outbound bytes.
pub trait SerialDevice: Send + fmt::Debug {
    /// Read bytes from the device into the provided buffer.
    ///
    /// Returns the number of bytes actually read. Zero means the device hung
    /// up.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Get an independent write handle onto the same device.
    fn writer(&self) -> Result<Box<dyn Write + Send>, PortError>;

    /// Get the name/path of this device.
    fn name(&self) -> &str;

    /// Release the device.
    ///
    /// Dropping the device releases it too; this hook exists so that
    /// implementations can report failures.
    fn close(&mut self) -> Result<(), PortError> {
        Ok(())
    }
}

/// Opens devices for a [`Hook`](crate::Hook).
pub trait DeviceOpener: Send {
    /// Open `port` in raw mode with the given line parameters.
    fn open(
        &self,
        port: &str,
        config: &PortConfiguration,
    ) -> Result<Box<dyn SerialDevice>, PortError>;
}

impl<F> DeviceOpener for F
where
    F: Fn(&str, &PortConfiguration) -> Result<Box<dyn SerialDevice>, PortError> + Send,
{
    fn open(
        &self,
        port: &str,
        config: &PortConfiguration,
    ) -> Result<Box<dyn SerialDevice>, PortError> {
        self(port, config)
    }
}
