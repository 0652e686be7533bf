//! Mock serial device for testing.
//!
//! [`MockSerialPort`] plays back a script of read results and records every
//! write made through its writers. Clones share state, so a test can keep one
//! clone for inspection while the hook owns another.

use super::error::PortError;
use super::traits::{DeviceOpener, PortConfiguration, SerialDevice};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// One scripted outcome of a `read_bytes` call.
#[derive(Debug)]
enum ReadStep {
    Data(Vec<u8>),
    Fail(io::ErrorKind),
    Pause(Duration),
}

#[derive(Debug, Default)]
struct MockPortState {
    script: VecDeque<ReadStep>,
    /// Number of `read_bytes` calls made.
    reads: usize,
    /// Log of every write, one entry per `write` call.
    write_log: Vec<Vec<u8>>,
    /// Error kind returned by writers instead of accepting data.
    fail_writes: Option<io::ErrorKind>,
    opens: usize,
    closes: usize,
    last_config: Option<PortConfiguration>,
}

/// Scripted serial device.
///
/// Reads consume the script front to back. A `Data` step larger than the
/// caller's buffer is split, the remainder staying at the front. Once the
/// script is exhausted every read fails with `UnexpectedEof`.
///
/// # Example
/// ```
/// use std::io::Write;
/// use termhook::port::{MockSerialPort, SerialDevice};
///
/// let mut port = MockSerialPort::new("MOCK0");
/// port.enqueue_read(b"Hello");
///
/// let mut buffer = [0u8; 16];
/// let n = port.read_bytes(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], b"Hello");
///
/// port.writer().unwrap().write_all(b"Response").unwrap();
/// assert_eq!(port.get_write_log(), vec![b"Response".to_vec()]);
/// ```
#[derive(Clone)]
pub struct MockSerialPort {
    name: String,
    state: Arc<Mutex<MockPortState>>,
}

impl MockSerialPort {
    /// Create a new mock device with an empty script.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockPortState::default())),
        }
    }

    /// Queue a chunk to be returned by a later read.
    pub fn enqueue_read(&mut self, data: &[u8]) {
        self.state
            .lock()
            .script
            .push_back(ReadStep::Data(data.to_vec()));
    }

    /// Queue a read failure of the given kind.
    pub fn enqueue_error(&mut self, kind: io::ErrorKind) {
        self.state.lock().script.push_back(ReadStep::Fail(kind));
    }

    /// Queue a pause: the next read sleeps for `duration` before moving on
    /// to the following step.
    pub fn enqueue_pause(&mut self, duration: Duration) {
        self.state.lock().script.push_back(ReadStep::Pause(duration));
    }

    /// Make every write fail with `kind`.
    pub fn fail_writes(&mut self, kind: io::ErrorKind) {
        self.state.lock().fail_writes = Some(kind);
    }

    /// Copy of all data written to the device.
    pub fn get_write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// All written bytes, concatenated.
    pub fn written_bytes(&self) -> Vec<u8> {
        self.state.lock().write_log.concat()
    }

    /// Number of `read_bytes` calls made so far.
    pub fn read_count(&self) -> usize {
        self.state.lock().reads
    }

    /// Number of times this device was handed out by [`MockSerialPort::opener`].
    pub fn open_count(&self) -> usize {
        self.state.lock().opens
    }

    /// Number of `close` calls made so far.
    pub fn close_count(&self) -> usize {
        self.state.lock().closes
    }

    /// Line parameters passed to the most recent open.
    pub fn last_config(&self) -> Option<PortConfiguration> {
        self.state.lock().last_config.clone()
    }

    /// A [`DeviceOpener`] that hands out clones of this device.
    pub fn opener(&self) -> MockOpener {
        MockOpener {
            port: self.clone(),
            fail_with: None,
        }
    }
}

impl SerialDevice for MockSerialPort {
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        loop {
            let mut state = self.state.lock();
            state.reads += 1;

            match state.script.pop_front() {
                Some(ReadStep::Data(mut data)) => {
                    let n = data.len().min(buffer.len());
                    buffer[..n].copy_from_slice(&data[..n]);
                    if n < data.len() {
                        let rest = data.split_off(n);
                        state.script.push_front(ReadStep::Data(rest));
                    }
                    return Ok(n);
                }
                Some(ReadStep::Fail(kind)) => {
                    return Err(PortError::Io(io::Error::new(kind, "scripted read failure")));
                }
                Some(ReadStep::Pause(duration)) => {
                    // A pause is not a read of its own.
                    state.reads -= 1;
                    drop(state);
                    thread::sleep(duration);
                }
                None => {
                    return Err(PortError::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "mock script exhausted",
                    )));
                }
            }
        }
    }

    fn writer(&self) -> Result<Box<dyn Write + Send>, PortError> {
        Ok(Box::new(MockWriter {
            state: Arc::clone(&self.state),
        }))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn close(&mut self) -> Result<(), PortError> {
        self.state.lock().closes += 1;
        Ok(())
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("pending_steps", &self.state.lock().script.len())
            .finish()
    }
}

struct MockWriter {
    state: Arc<Mutex<MockPortState>>,
}

impl Write for MockWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        if let Some(kind) = state.fail_writes {
            return Err(io::Error::new(kind, "scripted write failure"));
        }
        state.write_log.push(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Opener handing out a shared [`MockSerialPort`], or failing on demand.
#[derive(Debug, Clone)]
pub struct MockOpener {
    port: MockSerialPort,
    fail_with: Option<io::ErrorKind>,
}

impl MockOpener {
    /// Make every open fail with `kind`.
    pub fn failing(mut self, kind: io::ErrorKind) -> Self {
        self.fail_with = Some(kind);
        self
    }
}

impl DeviceOpener for MockOpener {
    fn open(
        &self,
        port: &str,
        config: &PortConfiguration,
    ) -> Result<Box<dyn SerialDevice>, PortError> {
        if let Some(kind) = self.fail_with {
            return Err(PortError::Io(io::Error::new(
                kind,
                format!("cannot open {port}"),
            )));
        }
        {
            let mut state = self.port.state.lock();
            state.opens += 1;
            state.last_config = Some(config.clone());
        }
        Ok(Box::new(self.port.clone()))
    }
}
