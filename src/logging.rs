//! Tracing subscriber setup for the `termhook` binary.
//!
//! Logs never go to stdout, which carries the device output. They go to
//! stderr by default, or are appended to `logging.file`.

use crate::config::{LogFormat, LoggingConfig};
use std::fs::OpenOptions;
use std::io::{self, IsTerminal};
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Filter directive for the given configuration and `-v` count.
///
/// Each `-v` raises the crate's own level one step above `warn` while other
/// crates stay at `warn`; with no `-v` the configured level is used as is.
pub fn filter_directive(config: &LoggingConfig, verbosity: u8) -> String {
    match verbosity {
        0 => config.level.clone(),
        1 => "warn,termhook=info".to_string(),
        2 => "warn,termhook=debug".to_string(),
        _ => "warn,termhook=trace".to_string(),
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over both the
/// config file and `-v`.
pub fn init(config: &LoggingConfig, verbosity: u8) -> io::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directive(config, verbosity)))
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let (writer, ansi) = match config.file {
        Some(ref path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(io::stderr), io::stderr().is_terminal()),
    };

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_ansi(ansi)
            .with_thread_names(true)
            .with_writer(writer)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_ansi(ansi)
            .with_target(false)
            .with_writer(writer)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e))
}
