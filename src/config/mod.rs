//! Configuration module for termhook.
//!
//! TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! 1. `TERMHOOK_CONFIG` environment variable (explicit path)
//! 2. `./termhook.toml` (current directory)
//! 3. `config.toml` in the platform config directory
//!    (`~/.config/termhook/config.toml` on Linux)
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is `TERMHOOK_<SECTION>_<KEY>`, for example:
//! - `TERMHOOK_SERIAL_PORT=/dev/ttyACM0`
//! - `TERMHOOK_SERIAL_BAUD=9600`
//! - `TERMHOOK_RELAY_FORWARD_STDIN=true`
//! - `TERMHOOK_LOGGING_LEVEL=termhook=debug`
//!
//! # Example
//!
//! ```rust,no_run
//! use termhook::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! let config = loader.config();
//! config.validate()?;
//! println!("Relaying {} at {} baud", config.serial.port, config.serial.baud);
//! # Ok::<(), termhook::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{default_config_path, resolve_config_path, ConfigLoader};
pub use schema::{Config, LogFormat, LoggingConfig, RelayConfig, SerialConfig};
