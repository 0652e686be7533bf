//! Interrupt delivery, scoped to a single run.
//!
//! A [`SignalSource`] hands out a [`Subscription`]: a channel of
//! [`SignalEvent`]s plus the release action for whatever was registered with
//! the OS. The subscription is stopped exactly once, either explicitly during
//! shutdown or when it is dropped, so process-wide signal handling never
//! outlives the run that installed it.

use crate::error::RelayError;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use tracing::debug;

/// A message for the signal-forwarding activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    /// The process received an interrupt.
    Interrupt,
    /// The orchestrator is shutting down.
    Stop,
}

/// Something that can deliver interrupt notifications.
pub trait SignalSource: Send {
    fn subscribe(&mut self) -> Result<Subscription, RelayError>;
}

/// Live interrupt subscription.
pub struct Subscription {
    events: Option<Receiver<SignalEvent>>,
    stop_tx: Sender<SignalEvent>,
    release: Option<Box<dyn FnOnce() + Send>>,
    stopped: bool,
}

impl Subscription {
    /// Build a subscription around a channel. `release` runs once on stop.
    pub fn new(
        events: Receiver<SignalEvent>,
        stop_tx: Sender<SignalEvent>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            events: Some(events),
            stop_tx,
            release: Some(Box::new(release)),
            stopped: false,
        }
    }

    /// Take the event receiver. Only the first call returns `Some`.
    pub fn take_events(&mut self) -> Option<Receiver<SignalEvent>> {
        self.events.take()
    }

    /// Stop delivery: unregister from the OS and wake the consumer.
    ///
    /// Idempotent.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        if let Some(release) = self.release.take() {
            release();
        }
        // The consumer may already be gone.
        let _ = self.stop_tx.send(SignalEvent::Stop);
        debug!("interrupt subscription stopped");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}

/// SIGINT delivered through `signal-hook`.
///
/// While subscribed, Ctrl-C no longer terminates the process; it is turned
/// into an in-band byte instead. Releasing the subscription puts SIGINT back
/// on its default action, so a Ctrl-C after the run ends the process again.
#[cfg(unix)]
#[derive(Debug, Default)]
pub struct InterruptSignals;

/// The conditional-default action installed by the latest subscription.
#[cfg(unix)]
static RESTORE_DEFAULT: Mutex<Option<signal_hook::SigId>> = parking_lot::const_mutex(None);

#[cfg(unix)]
impl SignalSource for InterruptSignals {
    fn subscribe(&mut self) -> Result<Subscription, RelayError> {
        use signal_hook::consts::SIGINT;
        use signal_hook::iterator::Signals;
        use std::sync::atomic::AtomicBool;

        let mut signals = Signals::new([SIGINT]).map_err(RelayError::Signal)?;
        let handle = signals.handle();
        let (tx, rx) = mpsc::channel();
        let forward_tx = tx.clone();

        std::thread::Builder::new()
            .name("termhook-sigint".into())
            .spawn(move || {
                for signal in signals.forever() {
                    debug!(signal, "interrupt received");
                    if forward_tx.send(SignalEvent::Interrupt).is_err() {
                        break;
                    }
                }
            })
            .map_err(RelayError::Signal)?;

        // Disarmed for the whole run. An action armed by an earlier run would
        // end the process on the first Ctrl-C, so it is unregistered here.
        let armed = Arc::new(AtomicBool::new(false));
        let restore = signal_hook::flag::register_conditional_default(SIGINT, Arc::clone(&armed))
            .map_err(|e| {
                handle.close();
                RelayError::Signal(e)
            })?;
        if let Some(previous) = RESTORE_DEFAULT.lock().replace(restore) {
            signal_hook::low_level::unregister(previous);
        }

        Ok(Subscription::new(rx, tx, move || {
            handle.close();
            armed.store(true, Ordering::SeqCst);
            debug!("default SIGINT action restored");
        }))
    }
}

/// A source that never delivers anything.
#[derive(Debug, Default)]
pub struct NoSignals;

impl SignalSource for NoSignals {
    fn subscribe(&mut self) -> Result<Subscription, RelayError> {
        let (tx, rx) = mpsc::channel();
        Ok(Subscription::new(rx, tx, || {}))
    }
}

/// Interrupts raised by hand through an [`InterruptTrigger`].
///
/// Useful when embedding the relay behind something other than process
/// signals, and in tests.
#[derive(Debug, Default)]
pub struct ManualInterrupts {
    current: Arc<Mutex<Option<Sender<SignalEvent>>>>,
    subscriptions: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
}

impl ManualInterrupts {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle for raising interrupts on the active subscription.
    pub fn trigger(&self) -> InterruptTrigger {
        InterruptTrigger {
            current: Arc::clone(&self.current),
            subscriptions: Arc::clone(&self.subscriptions),
            releases: Arc::clone(&self.releases),
        }
    }
}

impl SignalSource for ManualInterrupts {
    fn subscribe(&mut self) -> Result<Subscription, RelayError> {
        let (tx, rx) = mpsc::channel();
        *self.current.lock() = Some(tx.clone());
        self.subscriptions.fetch_add(1, Ordering::SeqCst);

        let current = Arc::clone(&self.current);
        let releases = Arc::clone(&self.releases);
        Ok(Subscription::new(rx, tx, move || {
            current.lock().take();
            releases.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

/// Raises interrupts for a [`ManualInterrupts`] source.
#[derive(Debug, Clone)]
pub struct InterruptTrigger {
    current: Arc<Mutex<Option<Sender<SignalEvent>>>>,
    subscriptions: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
}

impl InterruptTrigger {
    /// Deliver one interrupt. Returns `false` when nobody is subscribed.
    pub fn interrupt(&self) -> bool {
        match self.current.lock().as_ref() {
            Some(tx) => tx.send(SignalEvent::Interrupt).is_ok(),
            None => false,
        }
    }

    /// Whether a subscription is currently active.
    pub fn is_subscribed(&self) -> bool {
        self.current.lock().is_some()
    }

    /// Number of subscriptions handed out.
    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    /// Number of subscriptions released.
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}
