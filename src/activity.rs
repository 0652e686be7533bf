//! Forwarding activities and the collector for their outcomes.
//!
//! Each activity runs on its own thread, writes into the device through a
//! [`DeviceWriter`], and sends exactly one [`ActivityReport`] when it ends.
//! The orchestrator drains those reports through a [`ReportCollector`],
//! which keeps the first error in arrival order and drops the rest.

use crate::error::RelayError;
use crate::port::DeviceWriter;
use crate::signal::SignalEvent;
use crate::terminal::LocalInput;
use std::fmt;
use std::io::{self, Read};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Byte written to the device for each translated interrupt (ASCII ETX).
pub const CTRL_C: u8 = 0x03;

/// Largest chunk the input activity forwards per write.
const INPUT_CHUNK: usize = 64;

/// The concurrently running forwarding activities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Activity {
    Signals,
    Input,
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signals => f.write_str("signal forwarding"),
            Self::Input => f.write_str("input forwarding"),
        }
    }
}

/// Final outcome of one activity.
#[derive(Debug)]
pub struct ActivityReport {
    pub activity: Activity,
    pub outcome: Result<(), RelayError>,
}

/// Translate interrupts into [`CTRL_C`] on the device.
///
/// One-shot: returns after the first interrupt has been written. Returns
/// without writing on [`SignalEvent::Stop`] or when the channel closes.
pub fn forward_signals(
    events: Receiver<SignalEvent>,
    device: DeviceWriter,
) -> Result<(), RelayError> {
    for event in events {
        match event {
            SignalEvent::Interrupt => {
                device.send(&[CTRL_C]).map_err(RelayError::DeviceWrite)?;
                info!("interrupt forwarded to device as Ctrl-C");
                return Ok(());
            }
            SignalEvent::Stop => break,
        }
    }
    debug!("signal forwarding stopped");
    Ok(())
}

/// Put the local terminal in raw mode, then copy local input to the device.
///
/// Fail-fast: the first raw-mode, read or write error ends the activity.
/// End of input ends it cleanly.
pub fn forward_input(input: LocalInput, device: DeviceWriter) -> Result<(), RelayError> {
    let LocalInput {
        mut raw_mode,
        mut reader,
    } = input;

    raw_mode.make_raw().map_err(RelayError::RawMode)?;

    let mut buf = [0u8; INPUT_CHUNK];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => {
                debug!("local input reached end of stream");
                return Ok(());
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(RelayError::InputRead(e)),
        };
        device.send(&buf[..n]).map_err(RelayError::DeviceWrite)?;
    }
}

/// Run `body` on a named thread that reports its outcome on `reports`.
pub(crate) fn spawn_activity<F>(
    activity: Activity,
    reports: Sender<ActivityReport>,
    body: F,
) -> io::Result<JoinHandle<()>>
where
    F: FnOnce() -> Result<(), RelayError> + Send + 'static,
{
    let name = match activity {
        Activity::Signals => "termhook-signals",
        Activity::Input => "termhook-input",
    };
    thread::Builder::new().name(name.into()).spawn(move || {
        let outcome = body();
        if let Err(e) = &outcome {
            warn!(%activity, error = %e, "activity failed");
        }
        // The orchestrator may have stopped listening already.
        let _ = reports.send(ActivityReport { activity, outcome });
    })
}

/// Keeps the first activity error, in the order reports arrive.
#[derive(Debug)]
pub struct ReportCollector {
    reports: Receiver<ActivityReport>,
    first_error: Option<RelayError>,
    finished: Vec<Activity>,
}

impl ReportCollector {
    pub fn new(reports: Receiver<ActivityReport>) -> Self {
        Self {
            reports,
            first_error: None,
            finished: Vec::new(),
        }
    }

    /// Record an outcome that did not come through the channel, such as a
    /// panic observed on join.
    pub fn record(&mut self, report: ActivityReport) {
        self.finished.push(report.activity);
        if let Err(e) = report.outcome {
            if self.first_error.is_none() {
                self.first_error = Some(e);
            } else {
                debug!(activity = %report.activity, error = %e, "dropping later activity error");
            }
        }
    }

    /// Record every report already waiting in the channel.
    pub fn drain(&mut self) {
        while let Ok(report) = self.reports.try_recv() {
            self.record(report);
        }
    }

    /// Wait up to `grace` for `activity` to report.
    ///
    /// Returns whether it did. Other reports arriving meanwhile are recorded
    /// in order.
    pub fn wait_for(&mut self, activity: Activity, grace: Duration) -> bool {
        let deadline = Instant::now() + grace;
        while !self.has_finished(activity) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.reports.recv_timeout(remaining) {
                Ok(report) => self.record(report),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return false;
                }
            }
        }
        true
    }

    pub fn has_finished(&self, activity: Activity) -> bool {
        self.finished.contains(&activity)
    }

    /// The first recorded error, if any.
    pub fn into_first_error(mut self) -> Option<RelayError> {
        self.drain();
        self.first_error
    }
}
