//! The local side: the operator's terminal on stdin.

use std::fmt;
use std::io::{self, Read};
use tracing::debug;

/// Switches the local terminal into raw mode.
///
/// Raw mode disables echo, canonical line editing and signal-generating
/// control characters, so every keystroke (Ctrl-C included) reaches the
/// reader as a plain byte.
pub trait RawModeController: Send {
    fn make_raw(&mut self) -> io::Result<()>;
}

impl<F> RawModeController for F
where
    F: FnMut() -> io::Result<()> + Send,
{
    fn make_raw(&mut self) -> io::Result<()> {
        self()
    }
}

/// Raw mode through `crossterm`.
///
/// The change is left in place for the rest of the process: the relay never
/// restores the previous terminal attributes.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrosstermRawMode;

impl RawModeController for CrosstermRawMode {
    fn make_raw(&mut self) -> io::Result<()> {
        crossterm::terminal::enable_raw_mode()?;
        debug!("local terminal switched to raw mode");
        Ok(())
    }
}

/// Local input handed to the input-forwarding activity: a byte source and
/// the controller that prepares the terminal behind it.
pub struct LocalInput {
    pub(crate) raw_mode: Box<dyn RawModeController>,
    pub(crate) reader: Box<dyn Read + Send>,
}

impl LocalInput {
    pub fn new(
        raw_mode: impl RawModeController + 'static,
        reader: impl Read + Send + 'static,
    ) -> Self {
        Self {
            raw_mode: Box::new(raw_mode),
            reader: Box::new(reader),
        }
    }

    /// The process's stdin, switched to raw mode with `crossterm`.
    pub fn stdin() -> Self {
        Self::new(CrosstermRawMode, io::stdin())
    }
}

impl fmt::Debug for LocalInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalInput").finish_non_exhaustive()
    }
}
