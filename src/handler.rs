//! Line handlers: what the main loop does with each chunk read from the device.
//!
//! A handler is called once per successful device read, with a writer onto
//! the device and exactly the bytes that read returned. The loop is serial:
//! the next read does not start until the handler returns, so handlers must
//! be quick and must never read from the device themselves.

use crate::error::HandlerError;
use memchr::memmem;
use std::io::{self, Write};
use tracing::{debug, warn};

/// Whether the main loop keeps reading after a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineControl {
    Continue,
    Stop,
}

/// Consumes device output.
pub trait LineHandler: Send {
    fn handle(&mut self, device: &mut dyn Write, chunk: &[u8])
        -> Result<LineControl, HandlerError>;
}

impl<F> LineHandler for F
where
    F: FnMut(&mut dyn Write, &[u8]) -> Result<LineControl, HandlerError> + Send,
{
    fn handle(
        &mut self,
        device: &mut dyn Write,
        chunk: &[u8],
    ) -> Result<LineControl, HandlerError> {
        self(device, chunk)
    }
}

/// The default handler: copies every chunk verbatim to a console sink.
///
/// No framing or newline translation is applied. Console write failures are
/// logged and otherwise ignored; this handler never stops the loop.
#[derive(Debug)]
pub struct ConsoleEcho<W> {
    sink: W,
}

impl ConsoleEcho<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleEcho<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

impl<W: Write + Send> LineHandler for ConsoleEcho<W> {
    fn handle(
        &mut self,
        _device: &mut dyn Write,
        chunk: &[u8],
    ) -> Result<LineControl, HandlerError> {
        if let Err(e) = self.sink.write_all(chunk).and_then(|_| self.sink.flush()) {
            warn!(error = %e, bytes = chunk.len(), "console echo failed");
        }
        Ok(LineControl::Continue)
    }
}

/// Stops the loop once `pattern` has appeared in the device output.
///
/// Every chunk is first passed to the inner handler. Matches spanning two
/// reads are found by carrying the last `pattern.len() - 1` bytes over.
#[derive(Debug)]
pub struct StopOnPattern<H> {
    inner: H,
    finder: memmem::Finder<'static>,
    carry: Vec<u8>,
}

impl<H: LineHandler> StopOnPattern<H> {
    /// # Panics
    ///
    /// Panics if `pattern` is empty.
    pub fn new(pattern: impl AsRef<[u8]>, inner: H) -> Self {
        let pattern = pattern.as_ref();
        assert!(!pattern.is_empty(), "stop pattern must not be empty");
        Self {
            inner,
            finder: memmem::Finder::new(pattern).into_owned(),
            carry: Vec::with_capacity(pattern.len()),
        }
    }

    pub fn pattern(&self) -> &[u8] {
        self.finder.needle()
    }

    pub fn into_inner(self) -> H {
        self.inner
    }
}

impl<H: LineHandler> LineHandler for StopOnPattern<H> {
    fn handle(
        &mut self,
        device: &mut dyn Write,
        chunk: &[u8],
    ) -> Result<LineControl, HandlerError> {
        if self.inner.handle(device, chunk)? == LineControl::Stop {
            return Ok(LineControl::Stop);
        }

        self.carry.extend_from_slice(chunk);
        if self.finder.find(&self.carry).is_some() {
            debug!(pattern = %String::from_utf8_lossy(self.pattern()), "stop pattern seen");
            self.carry.clear();
            return Ok(LineControl::Stop);
        }

        let keep = self.finder.needle().len() - 1;
        if self.carry.len() > keep {
            self.carry.drain(..self.carry.len() - keep);
        }
        Ok(LineControl::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run_chunks<H: LineHandler>(handler: &mut H, chunks: &[&[u8]]) -> Vec<LineControl> {
        let mut device = Vec::new();
        chunks
            .iter()
            .map(|chunk| handler.handle(&mut device, chunk).unwrap())
            .collect()
    }

    #[test]
    fn test_console_echo_is_verbatim() {
        let mut echo = ConsoleEcho::new(Vec::new());
        let controls = run_chunks(&mut echo, &[b"hello\r\n", b"\x1b[0m", b"no newline"]);

        assert!(controls.iter().all(|c| *c == LineControl::Continue));
        assert_eq!(echo.into_inner(), b"hello\r\n\x1b[0mno newline".to_vec());
    }

    #[test]
    fn test_console_echo_swallows_sink_errors() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::from(io::ErrorKind::BrokenPipe))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut echo = ConsoleEcho::new(Broken);
        let mut device = Vec::new();
        assert_eq!(echo.handle(&mut device, b"x").unwrap(), LineControl::Continue);
    }

    #[test]
    fn test_stop_on_pattern_within_chunk() {
        let mut handler = StopOnPattern::new("STOP", ConsoleEcho::new(Vec::new()));
        let controls = run_chunks(&mut handler, &[b"abcSTOPxyz"]);
        assert_eq!(controls, vec![LineControl::Stop]);
        // The chunk that carried the pattern is still echoed in full.
        assert_eq!(handler.into_inner().into_inner(), b"abcSTOPxyz".to_vec());
    }

    #[test]
    fn test_stop_on_pattern_across_chunks() {
        let mut handler = StopOnPattern::new("login:", ConsoleEcho::new(Vec::new()));
        let controls = run_chunks(&mut handler, &[b"board lo", b"g", b"in: "]);
        assert_eq!(
            controls,
            vec![LineControl::Continue, LineControl::Continue, LineControl::Stop]
        );
    }

    #[test]
    fn test_stop_on_pattern_ignores_near_misses() {
        let mut handler = StopOnPattern::new("STOP", ConsoleEcho::new(Vec::new()));
        let controls = run_chunks(&mut handler, &[b"STO", b"xP", b"ST", b"OOP"]);
        assert!(controls.iter().all(|c| *c == LineControl::Continue));
    }

    #[test]
    fn test_closure_handler_and_error() {
        let mut seen = Vec::new();
        {
            let mut handler = |_: &mut dyn Write, chunk: &[u8]| -> Result<LineControl, HandlerError> {
                seen.extend_from_slice(chunk);
                Ok(LineControl::Continue)
            };
            run_chunks(&mut handler, &[b"ab", b"cd"]);
        }
        assert_eq!(seen, b"abcd".to_vec());

        let mut failing =
            |_: &mut dyn Write, _: &[u8]| -> Result<LineControl, HandlerError> { Err("nope".into()) };
        let mut device = Vec::new();
        let err = failing.handle(&mut device, b"x").unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }

    #[test]
    fn test_closure_can_reply_on_device() {
        let mut handler = |device: &mut dyn Write, chunk: &[u8]| -> Result<LineControl, HandlerError> {
            if chunk.ends_with(b"? ") {
                device.write_all(b"y\r")?;
            }
            Ok(LineControl::Continue)
        };
        let mut device = Vec::new();
        handler.handle(&mut device, b"Continue? ").unwrap();
        assert_eq!(device, b"y\r".to_vec());
    }
}
