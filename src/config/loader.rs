//! Configuration loader with file resolution and environment overrides.

use super::error::{ConfigError, ConfigResult};
use super::schema::{Config, LogFormat};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "TERMHOOK";

/// Config file name inside the platform config directory
const CONFIG_FILE_NAME: &str = "config.toml";

/// Config file name looked up in the working directory
const LOCAL_CONFIG_FILE_NAME: &str = "termhook.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "TERMHOOK_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `TERMHOOK_CONFIG` environment variable (explicit path)
    /// 2. `./termhook.toml`
    /// 3. `config.toml` in the platform config directory
    ///    (`~/.config/termhook/` on Linux)
    /// 4. Built-in defaults
    ///
    /// Environment variables override file values either way.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = match config_path {
            Some(ref path) => load_from_file(path)?,
            None => Config::default(),
        };
        apply_env_overrides(&mut config)?;

        Ok(Self { config_path, config })
    }

    /// Load configuration from a specific file path, which must exist.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(&self.config)?)
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let cwd_config = PathBuf::from(LOCAL_CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    default_config_path().filter(|path| path.exists())
}

/// Platform config file location, whether or not it exists.
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "termhook").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(ConfigError::ParseError)
}

/// Apply `TERMHOOK_<SECTION>_<KEY>` overrides from the process environment.
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    apply_overrides_from(config, |key| std::env::var(key).ok())
}

/// Apply overrides from any variable lookup.
pub(crate) fn apply_overrides_from(
    config: &mut Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> ConfigResult<()> {
    let var = |key: &str| {
        let name = format!("{ENV_PREFIX}_{key}");
        lookup(&name).map(|value| (name, value))
    };

    // Serial overrides
    if let Some((_, val)) = var("SERIAL_PORT") {
        config.serial.port = val;
    }
    if let Some((name, val)) = var("SERIAL_BAUD") {
        config.serial.baud = parse(&name, &val, "Invalid baud rate")?;
    }
    if let Some((name, val)) = var("SERIAL_READ_TIMEOUT_MS") {
        config.serial.read_timeout_ms = parse(&name, &val, "Invalid timeout")?;
    }

    // Relay overrides
    if let Some((name, val)) = var("RELAY_FORWARD_STDIN") {
        config.relay.forward_stdin = parse_flag(&name, &val)?;
    }
    if let Some((name, val)) = var("RELAY_CHUNK_SIZE") {
        config.relay.chunk_size = parse(&name, &val, "Invalid chunk size")?;
    }
    if let Some((name, val)) = var("RELAY_INPUT_GRACE_MS") {
        config.relay.input_grace_ms = parse(&name, &val, "Invalid grace period")?;
    }
    if let Some((_, val)) = var("RELAY_STOP_ON") {
        config.relay.stop_on = Some(val);
    }

    // Logging overrides
    if let Some((_, val)) = var("LOGGING_LEVEL") {
        config.logging.level = val;
    }
    if let Some((name, val)) = var("LOGGING_FORMAT") {
        config.logging.format = match val.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            _ => return Err(ConfigError::env_parse(name, "Expected json, pretty or compact")),
        };
    }
    if let Some((_, val)) = var("LOGGING_FILE") {
        config.logging.file = Some(PathBuf::from(val));
    }

    Ok(())
}

fn parse<T: FromStr>(name: &str, value: &str, message: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse(name, message))
}

fn parse_flag(name: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::env_parse(name, "Expected a boolean")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;
    use std::env;
    use std::io::Write as _;

    fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_overrides_apply_per_section() {
        let mut config = Config::default();
        apply_overrides_from(
            &mut config,
            overrides(&[
                ("TERMHOOK_SERIAL_PORT", "/dev/ttyS4"),
                ("TERMHOOK_SERIAL_BAUD", "57600"),
                ("TERMHOOK_RELAY_FORWARD_STDIN", "yes"),
                ("TERMHOOK_RELAY_STOP_ON", "login:"),
                ("TERMHOOK_LOGGING_FORMAT", "JSON"),
            ]),
        )
        .unwrap();

        assert_eq!(config.serial.port, "/dev/ttyS4");
        assert_eq!(config.serial.baud, 57600);
        assert!(config.relay.forward_stdin);
        assert_eq!(config.relay.stop_on.as_deref(), Some("login:"));
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_bad_override_names_the_variable() {
        let mut config = Config::default();
        let err = apply_overrides_from(&mut config, overrides(&[("TERMHOOK_SERIAL_BAUD", "fast")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::EnvParseError { ref var, .. } if var == "TERMHOOK_SERIAL_BAUD"
        ));

        let err = apply_overrides_from(
            &mut config,
            overrides(&[("TERMHOOK_RELAY_FORWARD_STDIN", "maybe")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::EnvParseError { .. }));
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = ConfigLoader::load_from("/nonexistent/termhook.toml").unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_from_rejects_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[serial\nbaud = ").unwrap();
        let err = ConfigLoader::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    #[serial]
    fn test_explicit_config_path_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[serial]\nport = \"/dev/ttyAMA0\"\nbaud = 921600").unwrap();

        env::set_var(CONFIG_PATH_ENV, file.path());
        let loader = ConfigLoader::load();
        env::remove_var(CONFIG_PATH_ENV);

        let loader = loader.unwrap();
        assert_eq!(loader.config_path.as_deref(), Some(file.path()));
        assert_eq!(loader.config().serial.port, "/dev/ttyAMA0");
        assert_eq!(loader.config().serial.baud, 921_600);
    }

    #[test]
    #[serial]
    fn test_env_override_beats_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[serial]\nbaud = 57600").unwrap();

        env::set_var("TERMHOOK_SERIAL_BAUD", "9600");
        let loader = ConfigLoader::load_from(file.path());
        env::remove_var("TERMHOOK_SERIAL_BAUD");

        let loader = loader.unwrap();
        assert_eq!(loader.config().serial.baud, 9600);
        assert!(loader.to_toml().unwrap().contains("baud = 9600"));
    }
}
