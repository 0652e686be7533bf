//! The relay itself.
//!
//! A [`Hook`] owns the device for the duration of a run. `run` opens it,
//! starts the signal-forwarding and (optionally) input-forwarding activities,
//! and then blocks in the read/dispatch loop on the calling thread. When the
//! loop ends it tears the activities down and reports one error at most:
//! the loop's own, or else the first one an activity reported.
//!
//! # Joining the input activity
//!
//! A blocking read on stdin cannot be cancelled. After the loop ends, `run`
//! waits at most [`HookConfig::input_grace`] for the input activity to
//! report; if it is still parked in a read it is left detached until stdin
//! yields or the process exits. `run` never blocks on local input beyond that
//! grace period. [`Hook::close`] shuts the shared device writer, so anything
//! a detached activity reads afterwards fails to reach the device.

use crate::activity::{
    forward_input, forward_signals, spawn_activity, Activity, ActivityReport, ReportCollector,
};
use crate::config::{ConfigError, ConfigResult};
use crate::error::{RelayError, RelayResult};
use crate::handler::{ConsoleEcho, LineControl, LineHandler};
use crate::port::{DeviceOpener, DeviceWriter, PortConfiguration, SerialDevice, SerialPortOpener};
use crate::signal::SignalSource;
use crate::terminal::LocalInput;
use std::fmt;
use std::sync::mpsc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Reference read size for the main loop.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// How long shutdown waits for the input activity to report.
pub const DEFAULT_INPUT_GRACE: Duration = Duration::from_millis(100);

/// What a [`Hook`] connects to and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookConfig {
    /// Device path, e.g. `/dev/ttyUSB0`.
    pub port: String,
    /// Speed and line parameters.
    pub serial: PortConfiguration,
    /// Forward local stdin to the device. `false` is read-only mode.
    pub forward_stdin: bool,
    /// Upper bound on bytes per device read.
    pub chunk_size: usize,
    /// See the module docs on joining the input activity.
    pub input_grace: Duration,
}

impl HookConfig {
    /// Read-only relay on `port` at `baud_rate`, 8N1.
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            serial: PortConfiguration::with_baud(baud_rate),
            forward_stdin: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            input_grace: DEFAULT_INPUT_GRACE,
        }
    }

    pub fn forward_stdin(mut self, forward: bool) -> Self {
        self.forward_stdin = forward;
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.port.trim().is_empty() {
            return Err(ConfigError::validation("port", "device path must not be empty"));
        }
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::validation("baud", "baud rate must be positive"));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::validation("chunk_size", "chunk size must be positive"));
        }
        Ok(())
    }
}

/// Serial-terminal relay.
///
/// # Example
/// ```no_run
/// use termhook::{Hook, HookConfig};
///
/// let mut hook = Hook::new(HookConfig::new("/dev/ttyUSB0", 115_200).forward_stdin(true))?;
/// let result = hook.run();
/// hook.close()?;
/// result?;
/// # Ok::<(), termhook::RelayError>(())
/// ```
pub struct Hook {
    config: HookConfig,
    line_handler: Box<dyn LineHandler>,
    opener: Box<dyn DeviceOpener>,
    signals: Box<dyn SignalSource>,
    local_input: Option<LocalInput>,
    device: Option<Box<dyn SerialDevice>>,
    writer: Option<DeviceWriter>,
}

impl Hook {
    /// Build a hook. Validates the configuration; performs no I/O.
    ///
    /// Defaults: [`ConsoleEcho`] on stdout, real serial ports, SIGINT, and
    /// stdin as local input.
    pub fn new(config: HookConfig) -> RelayResult<Self> {
        config.validate()?;
        Ok(Self {
            local_input: config.forward_stdin.then(LocalInput::stdin),
            config,
            line_handler: Box::new(ConsoleEcho::stdout()),
            opener: Box::new(SerialPortOpener),
            signals: default_signal_source(),
            device: None,
            writer: None,
        })
    }

    pub fn with_line_handler(mut self, handler: impl LineHandler + 'static) -> Self {
        self.line_handler = Box::new(handler);
        self
    }

    pub fn with_device_opener(mut self, opener: impl DeviceOpener + 'static) -> Self {
        self.opener = Box::new(opener);
        self
    }

    pub fn with_signal_source(mut self, signals: impl SignalSource + 'static) -> Self {
        self.signals = Box::new(signals);
        self
    }

    /// Replace the local input. Only used when `forward_stdin` is set.
    pub fn with_local_input(mut self, input: LocalInput) -> Self {
        self.local_input = Some(input);
        self
    }

    pub fn config(&self) -> &HookConfig {
        &self.config
    }

    /// Whether a device is currently held.
    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    /// Open the device and relay until the line handler stops or something
    /// fails. Blocks the calling thread.
    ///
    /// The device stays held after `run` returns; call [`Hook::close`] on
    /// every path.
    pub fn run(&mut self) -> RelayResult<()> {
        if self.device.is_some() {
            return Err(RelayError::AlreadyOpen);
        }

        let port = self.config.port.clone();
        let device = self
            .opener
            .open(&port, &self.config.serial)
            .map_err(|source| RelayError::Open {
                port: port.clone(),
                source,
            })?;
        info!(port = %port, baud = self.config.serial.baud_rate, "device opened");
        let device = self.device.insert(device);
        let writer = DeviceWriter::new(device.writer().map_err(RelayError::Writer)?);
        self.writer = Some(writer.clone());

        let (report_tx, report_rx) = mpsc::channel();

        let mut subscription = self.signals.subscribe()?;
        let events = subscription.take_events().unwrap_or_else(|| {
            // Already consumed: hand the activity a closed channel.
            let (_, rx) = mpsc::channel();
            rx
        });
        let signal_thread = {
            let writer = writer.clone();
            spawn_activity(Activity::Signals, report_tx.clone(), move || {
                forward_signals(events, writer)
            })
            .map_err(|source| RelayError::Spawn {
                activity: Activity::Signals,
                source,
            })?
        };

        let mut input_thread = None;
        let mut main_result = Ok(());
        if self.config.forward_stdin {
            match self.local_input.take() {
                Some(input) => {
                    let writer = writer.clone();
                    match spawn_activity(Activity::Input, report_tx.clone(), move || {
                        forward_input(input, writer)
                    }) {
                        Ok(handle) => input_thread = Some(handle),
                        Err(source) => {
                            main_result = Err(RelayError::Spawn {
                                activity: Activity::Input,
                                source,
                            })
                        }
                    }
                }
                None => warn!("local input was consumed by an earlier run; relaying read-only"),
            }
        }
        drop(report_tx);

        if main_result.is_ok() {
            main_result = read_loop(
                device.as_mut(),
                self.line_handler.as_mut(),
                writer,
                self.config.chunk_size,
            );
        }

        // Shutdown: stop signal delivery, hard-join the signal activity,
        // best-effort join the input activity.
        subscription.stop();
        let mut collector = ReportCollector::new(report_rx);
        if signal_thread.join().is_err() {
            collector.record(ActivityReport {
                activity: Activity::Signals,
                outcome: Err(RelayError::ActivityPanicked(Activity::Signals)),
            });
        }
        if let Some(handle) = input_thread {
            if !collector.wait_for(Activity::Input, self.config.input_grace) {
                if handle.is_finished() {
                    if handle.join().is_err() {
                        collector.record(ActivityReport {
                            activity: Activity::Input,
                            outcome: Err(RelayError::ActivityPanicked(Activity::Input)),
                        });
                    }
                } else {
                    info!("input forwarding still waiting on local input; leaving it detached");
                }
            }
        }

        match (main_result, collector.into_first_error()) {
            (Err(e), Some(superseded)) => {
                debug!(error = %superseded, "activity error superseded by main loop error");
                Err(e)
            }
            (Err(e), None) | (Ok(()), Some(e)) => Err(e),
            (Ok(()), None) => Ok(()),
        }
    }

    /// Release the device. A no-op when nothing is held, so it is safe
    /// before `run`, after a failed `run`, and when called twice.
    ///
    /// The shared device writer is shut first: a detached input activity
    /// gets a write error for anything typed after this point.
    pub fn close(&mut self) -> RelayResult<()> {
        if let Some(writer) = self.writer.take() {
            writer.close();
        }
        let Some(mut device) = self.device.take() else {
            return Ok(());
        };
        let port = device.name().to_string();
        device
            .close()
            .map_err(|source| RelayError::Close { port: port.clone(), source })?;
        info!(port = %port, "device closed");
        Ok(())
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("config", &self.config)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

#[cfg(unix)]
fn default_signal_source() -> Box<dyn SignalSource> {
    Box::new(crate::signal::InterruptSignals)
}

#[cfg(not(unix))]
fn default_signal_source() -> Box<dyn SignalSource> {
    Box::new(crate::signal::NoSignals)
}

/// The main loop: read a chunk, hand exactly that chunk to the handler.
fn read_loop(
    device: &mut dyn SerialDevice,
    handler: &mut dyn LineHandler,
    mut writer: DeviceWriter,
    chunk_size: usize,
) -> RelayResult<()> {
    let mut buf = vec![0u8; chunk_size];
    loop {
        let n = match device.read_bytes(&mut buf) {
            Ok(0) => {
                warn!(port = device.name(), "device returned end of stream");
                return Err(RelayError::Disconnected {
                    port: device.name().to_string(),
                });
            }
            Ok(n) => n,
            Err(e) if e.is_transient() => continue,
            Err(e) => {
                error!(port = device.name(), error = %e, "device read failed");
                return Err(RelayError::Read(e));
            }
        };
        trace!(bytes = n, "device chunk");

        match handler.handle(&mut writer, &buf[..n]) {
            Ok(LineControl::Continue) => {}
            Ok(LineControl::Stop) => {
                info!("line handler requested stop");
                return Ok(());
            }
            Err(e) => {
                error!(error = %e, "line handler failed");
                return Err(RelayError::Handler(e));
            }
        }
    }
}
