//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or checking configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    /// Failed to read config file
    #[error("Failed to read configuration file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to render the effective configuration
    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    /// Environment variable parse error
    #[error("Failed to parse environment variable '{var}': {message}")]
    EnvParseError { var: String, message: String },
}

impl ConfigError {
    pub fn validation<K: Into<String>, M: Into<String>>(key: K, message: M) -> Self {
        Self::ValidationError {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn env_parse<V: Into<String>, M: Into<String>>(var: V, message: M) -> Self {
        Self::EnvParseError {
            var: var.into(),
            message: message.into(),
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
