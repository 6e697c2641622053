//! One-shot "session should end" signal.
//!
//! Any number of producers (render callback, input loop, signal handler) may raise it; the
//! first reason wins and later raises are no-ops. Raising never blocks beyond a short mutex
//! section, and waiters can use a timed wait to stay responsive.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Why a playback session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// Stream exhausted with no repeat left.
    Finished,
    /// Quit key.
    Quit,
    /// SIGINT/SIGTERM or Ctrl-C typed in raw mode.
    Interrupted,
    /// Input read error or end of input.
    InputClosed,
    /// The output stream reported an error.
    OutputError,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::Finished => "finished",
            StopReason::Quit => "quit",
            StopReason::Interrupted => "interrupted",
            StopReason::InputClosed => "input closed",
            StopReason::OutputError => "output error",
        };
        f.write_str(s)
    }
}

/// Cloneable handle to a shared one-shot event.
#[derive(Clone, Default)]
pub struct DoneSignal {
    inner: Arc<DoneInner>,
}

#[derive(Default)]
struct DoneInner {
    reason: Mutex<Option<StopReason>>,
    cv: Condvar,
}

impl DoneSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal. Returns `true` only for the call that actually set it.
    pub fn raise(&self, reason: StopReason) -> bool {
        let mut g = self.lock();
        if g.is_some() {
            tracing::debug!(%reason, "done signal already raised");
            return false;
        }
        *g = Some(reason);
        drop(g);
        self.inner.cv.notify_all();
        tracing::debug!(%reason, "done signal raised");
        true
    }

    /// First reason raised, if any.
    pub fn reason(&self) -> Option<StopReason> {
        *self.lock()
    }

    pub fn is_raised(&self) -> bool {
        self.reason().is_some()
    }

    /// Block until raised.
    pub fn wait(&self) -> StopReason {
        let mut g = self.lock();
        loop {
            if let Some(reason) = *g {
                return reason;
            }
            g = match self.inner.cv.wait(g) {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }

    /// Block until raised or `timeout` elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<StopReason> {
        let deadline = Instant::now() + timeout;
        let mut g = self.lock();
        loop {
            if let Some(reason) = *g {
                return Some(reason);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            g = match self.inner.cv.wait_timeout(g, deadline - now) {
                Ok((g, _)) => g,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<StopReason>> {
        match self.inner.reason.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
