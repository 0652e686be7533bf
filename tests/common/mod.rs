//! Shared test utilities for termhook integration tests.
//!
//! - Mock device creation with pre-programmed reads
//! - Hook builders wired to mocks instead of real ports and signals
//! - A shared console buffer and scripted local input

#![allow(dead_code)]

use parking_lot::Mutex;
use std::fmt;
use std::io::{self, Cursor, Write};
use std::sync::Arc;
use std::time::Duration;
use termhook::error::HandlerError;
use termhook::signal::InterruptTrigger;
use termhook::{
    ConsoleEcho, Hook, HookConfig, LineControl, LocalInput, ManualInterrupts, MockSerialPort,
};

pub const MOCK_PORT: &str = "MOCK0";

/// Create a mock device with pre-programmed reads.
///
/// # Example
/// ```ignore
/// let mock = create_mock_port_with_reads(vec![b"login: ", b"Password: "]);
/// ```
pub fn create_mock_port_with_reads(reads: Vec<&[u8]>) -> MockSerialPort {
    let mut mock = MockSerialPort::new(MOCK_PORT);
    for chunk in reads {
        mock.enqueue_read(chunk);
    }
    mock
}

/// A console sink whose contents stay readable after the hook takes it.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().clone()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Error type whose identity survives the trip through `RelayError`.
#[derive(Debug, PartialEq, Eq)]
pub struct HandlerBoom(pub &'static str);

impl fmt::Display for HandlerBoom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler boom: {}", self.0)
    }
}

impl std::error::Error for HandlerBoom {}

/// Everything a test needs to drive and inspect one hook.
pub struct TestHarness {
    pub hook: Hook,
    pub port: MockSerialPort,
    pub trigger: InterruptTrigger,
    pub console: SharedBuffer,
}

impl TestHarness {
    /// Read-only hook on `port`, echoing into a shared buffer.
    pub fn new(port: MockSerialPort) -> Self {
        Self::with_config(port, HookConfig::new(MOCK_PORT, 115_200))
    }

    pub fn with_config(port: MockSerialPort, config: HookConfig) -> Self {
        let signals = ManualInterrupts::new();
        let trigger = signals.trigger();
        let console = SharedBuffer::default();
        let hook = Hook::new(config)
            .expect("valid hook config")
            .with_device_opener(port.opener())
            .with_signal_source(signals)
            .with_line_handler(ConsoleEcho::new(console.clone()));

        Self {
            hook,
            port,
            trigger,
            console,
        }
    }

    /// Forward `input` as local stdin, with raw mode faked by `raw_mode`.
    pub fn interactive(
        port: MockSerialPort,
        raw_mode: impl FnMut() -> io::Result<()> + Send + 'static,
        input: impl io::Read + Send + 'static,
    ) -> Self {
        Self::interactive_with_grace(port, raw_mode, input, Duration::from_secs(2))
    }

    /// Like [`TestHarness::interactive`], with an explicit input grace period.
    pub fn interactive_with_grace(
        port: MockSerialPort,
        raw_mode: impl FnMut() -> io::Result<()> + Send + 'static,
        input: impl io::Read + Send + 'static,
        grace: Duration,
    ) -> Self {
        let mut config = HookConfig::new(MOCK_PORT, 115_200).forward_stdin(true);
        config.input_grace = grace;
        let mut harness = Self::with_config(port, config);
        harness.hook = harness.hook.with_local_input(LocalInput::new(raw_mode, input));
        harness
    }
}

pub fn raw_mode_ok() -> io::Result<()> {
    Ok(())
}

pub fn raw_mode_fails() -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "not a terminal"))
}

/// Local input that yields `bytes` and then end of stream.
pub fn scripted_input(bytes: &[u8]) -> Cursor<Vec<u8>> {
    Cursor::new(bytes.to_vec())
}

/// Handler that stops on the first chunk.
pub fn stop_immediately(
    _: &mut dyn Write,
    _: &[u8],
) -> Result<LineControl, HandlerError> {
    Ok(LineControl::Stop)
}
