//! Configuration schema definitions.
//!
//! Every section is `#[serde(default)]`, so a config file only needs the keys
//! it changes.

use super::error::{ConfigError, ConfigResult};
use crate::hook::{HookConfig, DEFAULT_CHUNK_SIZE, DEFAULT_INPUT_GRACE};
use crate::port::{DataBits, FlowControl, Parity, PortConfiguration, StopBits};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial device configuration
    pub serial: SerialConfig,
    /// Relay behaviour
    pub relay: RelayConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Check the values a [`Hook`](crate::Hook) cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.serial.port.trim().is_empty() {
            return Err(ConfigError::validation("serial.port", "device path must not be empty"));
        }
        if self.serial.baud == 0 {
            return Err(ConfigError::validation("serial.baud", "baud rate must be positive"));
        }
        if self.relay.chunk_size == 0 {
            return Err(ConfigError::validation(
                "relay.chunk_size",
                "chunk size must be positive",
            ));
        }
        if matches!(self.relay.stop_on.as_deref(), Some("")) {
            return Err(ConfigError::validation("relay.stop_on", "stop pattern must not be empty"));
        }
        Ok(())
    }

    /// Build the hook configuration, resolving port aliases.
    pub fn hook_config(&self) -> HookConfig {
        HookConfig {
            port: self.serial.resolve_port(&self.serial.port),
            serial: self.serial.port_configuration(),
            forward_stdin: self.relay.forward_stdin,
            chunk_size: self.relay.chunk_size,
            input_grace: self.relay.input_grace(),
        }
    }
}

/// Serial device section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path or alias
    pub port: String,
    /// Baud rate
    pub baud: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
    /// Read timeout in milliseconds; silent reads are retried
    pub read_timeout_ms: u64,
    /// Short names for device paths, e.g. `console = "/dev/ttyUSB0"`
    #[serde(default)]
    pub port_aliases: HashMap<String, String>,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud: 115_200,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            read_timeout_ms: 1000,
            port_aliases: HashMap::new(),
        }
    }
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Resolve a port name through aliases
    pub fn resolve_port(&self, name: &str) -> String {
        self.port_aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    pub fn port_configuration(&self) -> PortConfiguration {
        PortConfiguration {
            baud_rate: self.baud,
            data_bits: self.data_bits,
            flow_control: self.flow_control,
            parity: self.parity,
            stop_bits: self.stop_bits,
            read_timeout: self.read_timeout(),
        }
    }
}

/// Relay section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Forward local keystrokes to the device
    pub forward_stdin: bool,
    /// Bytes per device read
    pub chunk_size: usize,
    /// How long shutdown waits for the input forwarder, in milliseconds
    pub input_grace_ms: u64,
    /// Stop relaying once this text is seen on the device
    pub stop_on: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            forward_stdin: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            input_grace_ms: DEFAULT_INPUT_GRACE.as_millis() as u64,
            stop_on: None,
        }
    }
}

impl RelayConfig {
    pub fn input_grace(&self) -> Duration {
        Duration::from_millis(self.input_grace_ms)
    }
}

/// Logging section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. "warn" or "termhook=debug"
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
    /// Append logs to this file instead of stderr
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Compact,
            file: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Multi-line human-readable format
    Pretty,
    /// Single-line format
    #[default]
    Compact,
}
