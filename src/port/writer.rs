//! Serialized write access to a device shared by several threads.

use parking_lot::Mutex;
use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

/// Cloneable writer onto a device.
///
/// The main loop (through the line handler) and both forwarding activities
/// write to the device concurrently. Each `write`/`flush` holds the lock for
/// the whole call, and [`DeviceWriter::send`] holds it across the write and
/// the flush, so one caller's bytes never interleave with another's.
///
/// [`DeviceWriter::close`] drops the underlying handle for every clone at
/// once; later writes fail with `BrokenPipe`.
#[derive(Clone)]
pub struct DeviceWriter {
    inner: Arc<Mutex<Option<Box<dyn Write + Send>>>>,
}

impl DeviceWriter {
    pub fn new(inner: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(inner))),
        }
    }

    /// Write the whole buffer and flush under a single lock.
    pub fn send(&self, bytes: &[u8]) -> io::Result<()> {
        let mut guard = self.inner.lock();
        let inner = guard.as_mut().ok_or_else(closed)?;
        inner.write_all(bytes)?;
        inner.flush()
    }

    /// Release the device handle. Idempotent.
    pub fn close(&self) {
        self.inner.lock().take();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().is_none()
    }
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "device writer closed")
}

impl Write for DeviceWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().as_mut().ok_or_else(closed)?.write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.lock().as_mut().ok_or_else(closed)?.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().as_mut().ok_or_else(closed)?.flush()
    }
}

impl fmt::Debug for DeviceWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceWriter")
            .field("handles", &Arc::strong_count(&self.inner))
            .field("closed", &self.is_closed())
            .finish()
    }
}
